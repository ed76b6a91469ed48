//! Terminal rendering.
//!
//! Converts the flattened blocks of a page fragment into styled ratatui
//! [`Text`] for the pager. Code samples are highlighted with syntect.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};
use syntect::{
    easy::HighlightLines,
    highlighting::{Theme, ThemeSet},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};

use crate::outline::{BlockKind, ContentBlock};

/// Theme used for code samples; part of syntect's bundled themes.
const CODE_THEME: &str = "base16-ocean.dark";

/// A rendered page plus the line index of every heading, for `n`/`p`
/// navigation and the status bar.
pub struct RenderedPage {
    pub text: Text<'static>,
    pub heading_lines: Vec<HeadingPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingPosition {
    pub level: u8,
    pub text: String,
    /// 0-based line in `RenderedPage::text`.
    pub rendered_line: usize,
}

/// Syntax highlighter for code blocks.
///
/// Loading syntect's syntax and theme sets is expensive, so one instance is
/// built per pager session and reused for every page.
pub struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Option<Theme>,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        let mut themes = ThemeSet::load_defaults();
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme: themes.themes.remove(CODE_THEME),
        }
    }

    /// Highlight `code`, one ratatui line per source line (without borders).
    ///
    /// Falls back to uniform styling when the theme is unavailable or
    /// highlighting fails.
    pub fn highlight(&self, code: &str) -> Vec<Line<'static>> {
        let plain = || -> Vec<Line<'static>> {
            let style = Style::default().fg(Color::Green);
            code.lines()
                .map(|l| Line::from(Span::styled(l.to_owned(), style)))
                .collect()
        };
        let Some(theme) = &self.theme else {
            return plain();
        };

        let syntax = self
            .syntaxes
            .find_syntax_by_extension(guess_extension(code))
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut lines = Vec::new();
        for source_line in LinesWithEndings::from(code) {
            let ranges = match highlighter.highlight_line(source_line, &self.syntaxes) {
                Ok(r) => r,
                Err(_) => return plain(),
            };
            let spans: Vec<Span<'static>> = ranges
                .into_iter()
                .map(|(style, piece)| {
                    let fg = style.foreground;
                    Span::styled(
                        piece.trim_end_matches(|c: char| c == '\n' || c == '\r').to_owned(),
                        Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
                    )
                })
                .collect();
            lines.push(Line::from(spans));
        }
        lines
    }
}

/// Guess a file extension for a code sample so syntect can pick a grammar.
///
/// Samples carry no language tag. Syntect has no Solidity grammar, so
/// Solidity falls through to JavaScript, which highlights its C-like syntax
/// reasonably.
pub fn guess_extension(code: &str) -> &'static str {
    let first = code.trim_start();
    if first.starts_with('{') && code.contains("\":") {
        return "json";
    }
    if first.starts_with('<') {
        return "html";
    }
    let shell_prefixes = [
        "npm ", "npx ", "yarn ", "cargo ", "solana ", "anchor ", "spl-token ", "curl ", "sh ",
        "$ ", "rustup ", "sudo ", "git ", "mkdir ", "cd ", "truffle ", "brew ",
    ];
    if code
        .lines()
        .map(str::trim_start)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .all(|l| shell_prefixes.iter().any(|p| l.starts_with(p)))
        && !first.is_empty()
    {
        return "sh";
    }
    let rust_markers = ["fn ", "let mut ", "use ", "pub struct ", "impl ", "#[derive", "-> Result"];
    if rust_markers.iter().filter(|m| code.contains(*m)).count() >= 2 {
        return "rs";
    }
    "js"
}

pub fn heading_style(level: u8) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        1 => base.fg(Color::Magenta),
        2 => base.fg(Color::Cyan),
        3 => base.fg(Color::Green),
        4 => base.fg(Color::Yellow),
        _ => base.fg(Color::White),
    }
}

fn heading_prefix(level: u8) -> &'static str {
    match level {
        1 => "# ",
        2 => "## ",
        3 => "### ",
        4 => "#### ",
        5 => "##### ",
        _ => "###### ",
    }
}

/// Convert the blocks of a page into styled [`Text`].
///
/// The caller is responsible for clipping to the viewport height.
pub fn render_blocks(blocks: &[ContentBlock], highlighter: &Highlighter) -> RenderedPage {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut heading_lines = Vec::new();
    let mut prev_kind: Option<&BlockKind> = None;

    for block in blocks {
        // Consecutive list items and table rows stay together.
        let tight = matches!(
            (prev_kind, &block.kind),
            (Some(BlockKind::ListItem(_)), BlockKind::ListItem(_))
                | (Some(BlockKind::TableRow { .. }), BlockKind::TableRow { .. })
        );
        if prev_kind.is_some() && !tight {
            lines.push(Line::default());
        }

        match &block.kind {
            BlockKind::Heading(level) => {
                heading_lines.push(HeadingPosition {
                    level: *level,
                    text: block.content.clone(),
                    rendered_line: lines.len(),
                });
                lines.push(Line::from(Span::styled(
                    format!("{}{}", heading_prefix(*level), block.content),
                    heading_style(*level),
                )));
            }
            BlockKind::Paragraph => {
                lines.push(Line::from(Span::raw(block.content.clone())));
            }
            BlockKind::CodeBlock => render_code_block(&block.content, highlighter, &mut lines),
            BlockKind::ListItem(depth) => {
                let bullet_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
                let indent = "  ".repeat(usize::from(*depth));
                let bullet = if *depth > 1 { "◦ " } else { "• " };
                lines.push(Line::from(vec![
                    Span::styled(format!("{indent}{bullet}"), bullet_style),
                    Span::raw(block.content.clone()),
                ]));
            }
            BlockKind::TableRow { header } => {
                let mut style = Style::default().fg(Color::White);
                if *header {
                    style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                }
                lines.push(Line::from(Span::styled(
                    format!("  {}", block.content),
                    style,
                )));
            }
        }
        prev_kind = Some(&block.kind);
    }

    RenderedPage {
        text: Text::from(lines),
        heading_lines,
    }
}

fn render_code_block(content: &str, highlighter: &Highlighter, lines: &mut Vec<Line<'static>>) {
    let border_style = Style::default().fg(Color::DarkGray);

    lines.push(Line::from(Span::styled("┌───", border_style)));
    for code_line in highlighter.highlight(content) {
        let mut spans = vec![Span::styled("│ ", border_style)];
        spans.extend(code_line.spans);
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled("└───", border_style)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline;

    fn render(html: &str) -> RenderedPage {
        render_blocks(&outline::blocks(html), &Highlighter::new())
    }

    fn joined(page: &RenderedPage) -> String {
        page.text
            .lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn heading_levels_styled() {
        let page = render("<h1>H1</h1><h2>H2</h2><h3>H3</h3>");
        assert!(page.text.lines[0].to_string().contains("# H1"));
        assert_eq!(page.heading_lines.len(), 3);
        assert_eq!(page.heading_lines[0].rendered_line, 0);
        // Headings are separated by a blank line.
        assert_eq!(page.heading_lines[1].rendered_line, 2);
    }

    #[test]
    fn code_block_has_borders() {
        let page = render("<pre><code>const x = 1;\nconsole.log(x);</code></pre>");
        let text = joined(&page);
        assert!(text.contains("┌"));
        assert!(text.contains("│ const x = 1;"));
        assert!(text.contains("│ console.log(x);"));
        assert!(text.contains("└"));
    }

    #[test]
    fn list_has_bullets_and_stays_tight() {
        let page = render("<ul><li>alpha</li><li>beta<ul><li>gamma</li></ul></li></ul>");
        let text = joined(&page);
        assert_eq!(text, "  • alpha\n  • beta\n    ◦ gamma");
    }

    #[test]
    fn table_rows_render() {
        let page = render("<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>");
        assert_eq!(joined(&page), "  A | B\n  1 | 2");
    }

    #[test]
    fn empty_fragment_renders_nothing() {
        let page = render("");
        assert!(page.text.lines.is_empty());
        assert!(page.heading_lines.is_empty());
    }

    #[test]
    fn guess_extension_heuristics() {
        assert_eq!(guess_extension("npm install web3\nnpx hardhat compile"), "sh");
        assert_eq!(guess_extension("use anchor_lang::prelude::*;\nfn main() {}"), "rs");
        assert_eq!(guess_extension("{\n  \"name\": \"dapp\"\n}"), "json");
        assert_eq!(guess_extension("<div>hi</div>"), "html");
        assert_eq!(guess_extension("pragma solidity ^0.8.0;\ncontract A {}"), "js");
        assert_eq!(guess_extension(""), "js");
    }

    #[test]
    fn builtin_pages_render() {
        let highlighter = Highlighter::new();
        for (key, fragment) in crate::catalog::BUILTIN {
            let page = render_blocks(&outline::blocks(fragment), &highlighter);
            assert!(!page.heading_lines.is_empty(), "page {key} rendered no headings");
        }
    }
}
