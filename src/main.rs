mod catalog;
mod html;
mod manifest;
mod outline;
mod registry;
mod render;
mod serve;
mod web_assets;

use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::PathBuf,
    process,
};

use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    DefaultTerminal, Frame,
};
use thiserror::Error;

use catalog::CatalogError;
use manifest::{Manifest, ManifestError};
use registry::{ContentRegistry, DuplicatePolicy};
use render::{HeadingPosition, Highlighter, RenderedPage};

/// Where pages and the manifest come from. Shared by every subcommand.
#[derive(Args, Debug)]
struct SourceArgs {
    /// Directory of `*.html` pages loaded on top of the embedded pages
    #[arg(long, global = true, value_name = "DIR")]
    content_dir: Option<PathBuf>,
    /// Skip the embedded pages (requires --content-dir)
    #[arg(long, global = true)]
    no_builtin: bool,
    /// Navigation manifest (YAML) replacing the embedded one
    #[arg(long, global = true, value_name = "FILE")]
    manifest: Option<PathBuf>,
    /// Treat a page key found twice in --content-dir as an error
    #[arg(long, global = true)]
    strict: bool,
}

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List page keys and titles in reading order
    List {
        /// Print a JSON array of {key, title, section}
        #[arg(long)]
        json: bool,
    },
    /// Print the HTML fragment registered under a key
    Show {
        /// Page key, e.g. advanceEth
        key: String,
    },
    /// Read a page in the terminal
    View {
        /// Page key (defaults to the home page)
        key: Option<String>,
    },
    /// Validate the pages against the navigation manifest
    Check,
    /// Serve every page over HTTP
    Serve {
        /// Interface address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Starting port number for the HTTP server
        #[arg(long, default_value = "3333")]
        port: u16,
    },
}

#[derive(Parser)]
#[command(
    name = "chaindocs",
    version,
    about = "Blockchain development tutorial pages: list, read and serve",
    after_help = "EXAMPLES:\n  chaindocs list                       Keys and titles\n  chaindocs show advanceEth            Print a page fragment\n  chaindocs view solana                Read a page in the terminal\n  chaindocs serve --port 8080          Serve the site over HTTP"
)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Error)]
enum LoadError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("--no-builtin requires --content-dir")]
    NoContent,
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let (registry, manifest) = load_content(&cli.source).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    match cli.command {
        Commands::List { json } => run_list(&registry, &manifest, json),
        Commands::Show { key } => run_show(&registry, &key),
        Commands::View { key } => {
            let key = match key.or_else(|| manifest.home_key(&registry).map(str::to_owned)) {
                Some(k) => k,
                None => {
                    eprintln!("Error: no pages registered");
                    process::exit(1);
                }
            };
            if let Err(e) = registry.get(&key) {
                eprintln!("Error: {e}");
                process::exit(1);
            }
            log::info!("[view] pager dispatched for: {key}");
            ratatui::run(|terminal| run_pager(terminal, &registry, &manifest, &key))
        }
        Commands::Check => run_check(&registry, &manifest),
        Commands::Serve { bind, port } => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let config = serve::AppConfig {
                bind_addr: bind,
                start_port: port,
            };
            rt.block_on(serve::run_serve(registry, manifest, config))
        }
    }
}

/// Build the registry and manifest from the command-line sources.
fn load_content(args: &SourceArgs) -> Result<(ContentRegistry, Manifest), LoadError> {
    let policy = if args.strict {
        DuplicatePolicy::Reject
    } else {
        DuplicatePolicy::Overwrite
    };

    let registry = match (&args.content_dir, args.no_builtin) {
        (Some(dir), true) => catalog::load_dir(dir, policy)?,
        (Some(dir), false) => catalog::overlay(catalog::builtin_registry(), dir, policy)?,
        (None, true) => return Err(LoadError::NoContent),
        (None, false) => catalog::builtin_registry(),
    };

    let manifest = match &args.manifest {
        Some(path) => Manifest::load(path)?,
        None => Manifest::builtin()?,
    };

    log::debug!(
        "[load] pages={} sections={}",
        registry.len(),
        manifest.sections.len()
    );
    Ok((registry, manifest))
}

fn run_list(registry: &ContentRegistry, manifest: &Manifest, json: bool) -> io::Result<()> {
    let index = html::page_index(registry, manifest);
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &index)?;
        writeln!(out)?;
    } else {
        let width = index.iter().map(|p| p.key.len()).max().unwrap_or(0);
        for page in &index {
            writeln!(out, "{:width$}  {}", page.key, page.title)?;
        }
    }
    Ok(())
}

fn run_show(registry: &ContentRegistry, key: &str) -> io::Result<()> {
    match registry.get(key) {
        Ok(fragment) => io::stdout().lock().write_all(fragment.as_bytes()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_check(registry: &ContentRegistry, manifest: &Manifest) -> io::Result<()> {
    let mut problems: Vec<String> = manifest
        .validate(registry)
        .iter()
        .map(ToString::to_string)
        .collect();
    for (key, fragment) in registry.iter() {
        if outline::title(fragment).is_none() {
            problems.push(format!("page '{key}' has no <h1> title"));
        }
    }

    if problems.is_empty() {
        println!(
            "ok: {} pages, {} sections",
            registry.len(),
            manifest.sections.len()
        );
        return Ok(());
    }
    for problem in &problems {
        eprintln!("error: {problem}");
    }
    eprintln!("{} problem(s) found", problems.len());
    process::exit(1);
}

// ---------------------------------------------------------------------------
// Terminal pager
// ---------------------------------------------------------------------------

/// State for the outline modal overlay.
struct OutlineState {
    /// Index into `heading_lines` of the currently selected heading.
    selected: usize,
    /// Scroll offset saved when the outline was opened (for Esc restore).
    saved_scroll: usize,
}

/// A single search match position in the rendered output.
struct SearchMatch {
    rendered_line: usize,
    /// Byte offsets within the line text.
    column_start: usize,
    column_end: usize,
}

/// State for vim-like `/` search.
struct SearchState {
    query: String,
    /// Whether the user is still typing (true) or has confirmed with Enter (false).
    typing: bool,
    matches: Vec<SearchMatch>,
    current_match: Option<usize>,
    /// Scroll offset saved when search was initiated (for Esc restore).
    saved_scroll: usize,
}

/// The page currently shown, with its place in reading order.
struct PagerPage {
    key: String,
    title: String,
    position: usize,
    rendered: RenderedPage,
}

fn load_page(
    registry: &ContentRegistry,
    titles: &BTreeMap<&str, String>,
    order: &[&str],
    key: &str,
    highlighter: &Highlighter,
) -> Option<PagerPage> {
    let fragment = registry.get(key).ok()?;
    let rendered = render::render_blocks(&outline::blocks(fragment), highlighter);
    Some(PagerPage {
        key: key.to_owned(),
        title: titles.get(key).cloned().unwrap_or_else(|| key.to_owned()),
        position: order.iter().position(|k| *k == key).unwrap_or(0),
        rendered,
    })
}

fn run_pager(
    terminal: &mut DefaultTerminal,
    registry: &ContentRegistry,
    manifest: &Manifest,
    initial_key: &str,
) -> io::Result<()> {
    let highlighter = Highlighter::new();
    let titles = html::page_titles(registry);
    let order = manifest.reading_order(registry);

    let Some(mut page) = load_page(registry, &titles, &order, initial_key, &highlighter) else {
        return Ok(());
    };
    let mut scroll_offset: usize = 0;
    let mut outline: Option<OutlineState> = None;
    let mut search: Option<SearchState> = None;

    loop {
        terminal.draw(|frame| {
            ui(
                frame,
                &page,
                order.len(),
                scroll_offset,
                outline.as_ref().map(|o| o.selected),
                search.as_ref(),
            );
        })?;

        let event = event::read()?;

        // Clamp on every event, including resize.
        let total_lines = page.rendered.text.lines.len();
        let viewport_height = terminal.size()?.height.saturating_sub(1) as usize;
        let max_scroll = total_lines.saturating_sub(viewport_height);
        scroll_offset = scroll_offset.min(max_scroll);

        let Event::Key(key) = event else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(ref mut ol) = outline {
            let headings = &page.rendered.heading_lines;
            let num_headings = headings.len();
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    if num_headings > 0 {
                        ol.selected = (ol.selected + 1).min(num_headings - 1);
                        scroll_offset = headings[ol.selected].rendered_line.min(max_scroll);
                    }
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    ol.selected = ol.selected.saturating_sub(1);
                    if let Some(h) = headings.get(ol.selected) {
                        scroll_offset = h.rendered_line.min(max_scroll);
                    }
                }
                KeyCode::Enter => outline = None,
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('o') => {
                    scroll_offset = ol.saved_scroll;
                    outline = None;
                }
                _ => {}
            }
            continue;
        }

        if search.as_ref().is_some_and(|s| s.typing) {
            let mut cancel = false;
            if let Some(ref mut s) = search {
                match key.code {
                    KeyCode::Enter => {
                        if s.matches.is_empty() {
                            cancel = true;
                        } else {
                            s.typing = false;
                        }
                    }
                    KeyCode::Esc => {
                        scroll_offset = s.saved_scroll;
                        cancel = true;
                    }
                    KeyCode::Backspace => {
                        s.query.pop();
                        s.matches = find_matches(&page.rendered, &s.query);
                        s.current_match = nearest_match_from(&s.matches, s.saved_scroll);
                    }
                    KeyCode::Char(c) => {
                        s.query.push(c);
                        s.matches = find_matches(&page.rendered, &s.query);
                        s.current_match = nearest_match_from(&s.matches, s.saved_scroll);
                    }
                    _ => {}
                }
            }
            if cancel {
                search = None;
            }
            scroll_offset = scroll_to_match(search.as_ref(), scroll_offset, viewport_height, max_scroll);
            continue;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let half = viewport_height / 2;
        match key.code {
            KeyCode::Char('q') => return Ok(()),
            KeyCode::Esc => {
                if search.is_some() {
                    search = None;
                } else {
                    return Ok(());
                }
            }

            KeyCode::Char('j') | KeyCode::Down => {
                scroll_offset = (scroll_offset + 1).min(max_scroll);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                scroll_offset = scroll_offset.saturating_sub(1);
            }
            KeyCode::Char('d') if ctrl => scroll_offset = (scroll_offset + half).min(max_scroll),
            KeyCode::PageDown | KeyCode::Char(' ') => {
                scroll_offset = (scroll_offset + half).min(max_scroll);
            }
            KeyCode::Char('u') if ctrl => scroll_offset = scroll_offset.saturating_sub(half),
            KeyCode::PageUp => scroll_offset = scroll_offset.saturating_sub(half),
            KeyCode::Char('g') | KeyCode::Home => scroll_offset = 0,
            KeyCode::Char('G') | KeyCode::End => scroll_offset = max_scroll,

            KeyCode::Char('n') if ctrl && search.is_some() => {
                advance_search_match(&mut search, true);
                scroll_offset =
                    scroll_to_match(search.as_ref(), scroll_offset, viewport_height, max_scroll);
            }
            KeyCode::Char('p') if ctrl && search.is_some() => {
                advance_search_match(&mut search, false);
                scroll_offset =
                    scroll_to_match(search.as_ref(), scroll_offset, viewport_height, max_scroll);
            }

            // Next / previous heading
            KeyCode::Char('n') => {
                if let Some(pos) = page
                    .rendered
                    .heading_lines
                    .iter()
                    .find(|h| h.rendered_line > scroll_offset)
                {
                    scroll_offset = pos.rendered_line.min(max_scroll);
                }
            }
            KeyCode::Char('p') => {
                if let Some(pos) = page
                    .rendered
                    .heading_lines
                    .iter()
                    .rev()
                    .find(|h| h.rendered_line < scroll_offset)
                {
                    scroll_offset = pos.rendered_line.min(max_scroll);
                }
            }

            // Next / previous page in reading order
            KeyCode::Char(']') | KeyCode::Char('[') => {
                let target = if key.code == KeyCode::Char(']') {
                    order.get(page.position + 1)
                } else {
                    page.position.checked_sub(1).and_then(|i| order.get(i))
                };
                if let Some(next) =
                    target.and_then(|k| load_page(registry, &titles, &order, k, &highlighter))
                {
                    log::debug!("[view] page {} -> {}", page.key, next.key);
                    page = next;
                    scroll_offset = 0;
                    search = None;
                }
            }

            KeyCode::Char('o') => {
                if !page.rendered.heading_lines.is_empty() {
                    let current_idx = page
                        .rendered
                        .heading_lines
                        .iter()
                        .rposition(|h| h.rendered_line <= scroll_offset)
                        .unwrap_or(0);
                    outline = Some(OutlineState {
                        selected: current_idx,
                        saved_scroll: scroll_offset,
                    });
                }
            }

            KeyCode::Char('/') => {
                search = Some(SearchState {
                    query: String::new(),
                    typing: true,
                    matches: Vec::new(),
                    current_match: None,
                    saved_scroll: scroll_offset,
                });
            }

            _ => {}
        }
    }
}

/// Scroll so the current search match is visible, leaving the offset alone
/// when it already is.
fn scroll_to_match(
    search: Option<&SearchState>,
    scroll_offset: usize,
    viewport_height: usize,
    max_scroll: usize,
) -> usize {
    let Some(line) = search
        .and_then(|s| s.current_match.map(|idx| s.matches[idx].rendered_line))
    else {
        return scroll_offset;
    };
    if line < scroll_offset || line >= scroll_offset + viewport_height {
        line.saturating_sub(viewport_height / 3).min(max_scroll)
    } else {
        scroll_offset
    }
}

/// Find the heading context for the current scroll position.
fn current_heading_context(
    heading_lines: &[HeadingPosition],
    scroll_offset: usize,
) -> Option<&HeadingPosition> {
    heading_lines
        .iter()
        .rev()
        .find(|h| h.rendered_line <= scroll_offset)
}

/// Find all case-insensitive occurrences of `query` in the rendered text.
fn find_matches(rendered: &RenderedPage, query: &str) -> Vec<SearchMatch> {
    if query.is_empty() {
        return Vec::new();
    }
    let query_lower = query.to_lowercase();
    let mut matches = Vec::new();
    for (line_idx, line) in rendered.text.lines.iter().enumerate() {
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        let text_lower = text.to_lowercase();
        let mut pos = 0;
        while let Some(rel) = text_lower.get(pos..).and_then(|rest| rest.find(&query_lower)) {
            let start = pos + rel;
            matches.push(SearchMatch {
                rendered_line: line_idx,
                column_start: start,
                column_end: start + query_lower.len(),
            });
            pos = start + query_lower.len();
        }
    }
    matches
}

/// Nearest match at or after `scroll_offset`, wrapping to the first.
fn nearest_match_from(matches: &[SearchMatch], scroll_offset: usize) -> Option<usize> {
    if matches.is_empty() {
        return None;
    }
    matches
        .iter()
        .position(|m| m.rendered_line >= scroll_offset)
        .or(Some(0))
}

fn advance_search_match(search: &mut Option<SearchState>, forward: bool) {
    let Some(s) = search else {
        return;
    };
    let count = s.matches.len();
    if count == 0 {
        return;
    }
    s.current_match = Some(match (s.current_match, forward) {
        (Some(idx), true) => (idx + 1) % count,
        (None, true) => 0,
        (Some(0), false) | (None, false) => count - 1,
        (Some(idx), false) => idx - 1,
    });
}

fn ui(
    frame: &mut Frame,
    page: &PagerPage,
    page_count: usize,
    scroll_offset: usize,
    outline_selected: Option<usize>,
    search: Option<&SearchState>,
) {
    let area = frame.area();

    const MIN_WIDTH: u16 = 20;
    const MIN_HEIGHT: u16 = 5;
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = "Terminal too small";
        let msg_len = msg.len() as u16;
        let x = area.x + area.width.saturating_sub(msg_len) / 2;
        let y = area.y + area.height / 2;
        let w = msg_len.min(area.width);
        if w > 0 && area.height > 0 {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    msg,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Rect::new(x, y, w, 1),
            );
        }
        return;
    }

    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let viewport_height = chunks[0].height as usize;
    let rendered = &page.rendered;
    let total_lines = rendered.text.lines.len();

    let widget = Paragraph::new(rendered.text.clone()).scroll((scroll_offset as u16, 0));
    frame.render_widget(widget, chunks[0]);

    if let Some(s) = search.filter(|s| !s.query.is_empty()) {
        let match_style = Style::default().bg(Color::Yellow).fg(Color::Black);
        let current_style = Style::default()
            .bg(Color::LightGreen)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD);

        for (idx, m) in s.matches.iter().enumerate() {
            let Some(rel_line) = m.rendered_line.checked_sub(scroll_offset) else {
                continue;
            };
            if rel_line >= viewport_height {
                continue;
            }
            let row = chunks[0].y + rel_line as u16;
            let style = if s.current_match == Some(idx) {
                current_style
            } else {
                match_style
            };
            for col in m.column_start..m.column_end {
                let pos = Position::new(chunks[0].x + col as u16, row);
                if let Some(cell) = frame.buffer_mut().cell_mut(pos) {
                    cell.set_style(style);
                }
            }
        }
    }

    if let Some(selected) = outline_selected {
        render_outline(frame, &rendered.heading_lines, selected, chunks[0]);
    }

    if let Some(s) = search.filter(|s| s.typing) {
        let match_info = if s.matches.is_empty() && !s.query.is_empty() {
            " [No matches]".to_owned()
        } else if !s.matches.is_empty() {
            let current = s.current_match.map(|i| i + 1).unwrap_or(0);
            format!(" [{}/{}]", current, s.matches.len())
        } else {
            String::new()
        };
        let bar = Paragraph::new(Span::styled(
            format!("/{}|{}", s.query, match_info),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        ))
        .style(Style::default().bg(Color::DarkGray));
        frame.render_widget(bar, chunks[1]);
        return;
    }

    let position = if total_lines == 0 {
        "Empty".to_owned()
    } else if total_lines <= viewport_height {
        "All".to_owned()
    } else if scroll_offset == 0 {
        "Top".to_owned()
    } else if scroll_offset >= total_lines.saturating_sub(viewport_height) {
        "Bot".to_owned()
    } else {
        format!("{}%", (scroll_offset * 100) / total_lines)
    };

    let heading_ctx = current_heading_context(&rendered.heading_lines, scroll_offset)
        .map(|h| format!(" \u{00A7} {}", h.text))
        .unwrap_or_default();

    let search_info = search
        .map(|s| {
            if s.matches.is_empty() {
                format!("  /{} [No matches]", s.query)
            } else {
                let current = s.current_match.map(|i| i + 1).unwrap_or(0);
                format!("  /{} [{}/{}]", s.query, current, s.matches.len())
            }
        })
        .unwrap_or_default();

    let status = format!(
        " {} [{}/{}] {} | Line {}/{} {}{}{}",
        page.key,
        page.position + 1,
        page_count,
        page.title,
        scroll_offset + 1,
        total_lines,
        position,
        heading_ctx,
        search_info,
    );
    let status_bar = Paragraph::new(Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::White),
    ))
    .style(Style::default().bg(Color::White));
    frame.render_widget(status_bar, chunks[1]);
}

/// Compute a centered rectangle within `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = (area.width * percent_x / 100).max(30).min(area.width);
    let height = (area.height * percent_y / 100).max(5).min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Outline modal listing every heading of the page.
fn render_outline(
    frame: &mut Frame,
    heading_lines: &[HeadingPosition],
    selected: usize,
    viewport_area: Rect,
) {
    let popup = centered_rect(60, 70, viewport_area);
    frame.render_widget(Clear, popup);

    let lines: Vec<Line<'static>> = heading_lines
        .iter()
        .map(|h| {
            let indent = "  ".repeat((h.level as usize).saturating_sub(1));
            Line::from(Span::styled(
                format!("{indent}{}", h.text),
                render::heading_style(h.level),
            ))
        })
        .collect();

    // Keep the selected entry roughly centred.
    let inner_height = popup.height.saturating_sub(2) as usize;
    let scroll = if heading_lines.is_empty() || inner_height == 0 {
        0
    } else {
        let max_scroll = heading_lines.len().saturating_sub(inner_height);
        selected.saturating_sub(inner_height / 2).min(max_scroll)
    };

    let block = Block::bordered()
        .title(" Outline ")
        .style(Style::default().fg(Color::White));
    frame.render_widget(
        Paragraph::new(lines).block(block).scroll((scroll as u16, 0)),
        popup,
    );

    if heading_lines.is_empty() || inner_height == 0 {
        return;
    }
    let Some(rel_line) = selected.checked_sub(scroll) else {
        return;
    };
    if rel_line < inner_height {
        let row = popup.y + 1 + rel_line as u16; // +1 for top border
        let highlight = Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        for col in (popup.x + 1)..(popup.x + popup.width.saturating_sub(1)) {
            if let Some(cell) = frame.buffer_mut().cell_mut(Position::new(col, row)) {
                cell.set_style(highlight);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> RenderedPage {
        render::render_blocks(&outline::blocks(html), &Highlighter::new())
    }

    #[test]
    fn find_matches_is_case_insensitive() {
        let rendered = page("<p>Solana and solana and SOLANA</p>");
        let matches = find_matches(&rendered, "solana");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].column_start, 0);
        assert_eq!(matches[1].column_start, 11);
        assert!(find_matches(&rendered, "").is_empty());
    }

    #[test]
    fn search_match_cycles() {
        let rendered = page("<p>a</p><p>a</p><p>a</p>");
        let matches = find_matches(&rendered, "a");
        let mut search = Some(SearchState {
            query: "a".into(),
            typing: false,
            current_match: nearest_match_from(&matches, 0),
            matches,
            saved_scroll: 0,
        });
        advance_search_match(&mut search, false);
        assert_eq!(search.as_ref().unwrap().current_match, Some(2));
        advance_search_match(&mut search, true);
        assert_eq!(search.as_ref().unwrap().current_match, Some(0));
    }

    #[test]
    fn heading_context_tracks_scroll() {
        let rendered = page("<h1>One</h1><p>x</p><h2>Two</h2><p>y</p>");
        let ctx = current_heading_context(&rendered.heading_lines, 0).unwrap();
        assert_eq!(ctx.text, "One");
        let ctx = current_heading_context(&rendered.heading_lines, 5).unwrap();
        assert_eq!(ctx.text, "Two");
    }

    #[test]
    fn load_page_records_reading_position() {
        let registry = catalog::builtin_registry();
        let manifest = Manifest::builtin().unwrap();
        let titles = html::page_titles(&registry);
        let order = manifest.reading_order(&registry);
        let highlighter = Highlighter::new();

        let home = load_page(&registry, &titles, &order, "home", &highlighter).unwrap();
        assert_eq!(home.position, 0);
        assert_eq!(home.title, "What is Blockchain?");
        assert!(load_page(&registry, &titles, &order, "doesNotExist", &highlighter).is_none());
    }

    #[test]
    fn no_builtin_without_dir_is_rejected() {
        let args = SourceArgs {
            content_dir: None,
            no_builtin: true,
            manifest: None,
            strict: false,
        };
        assert!(matches!(load_content(&args), Err(LoadError::NoContent)));
    }

    #[test]
    fn cli_parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "chaindocs",
            "serve",
            "--port",
            "4000",
            "--strict",
            "--content-dir",
            "pages",
        ])
        .unwrap();
        assert!(cli.source.strict);
        assert_eq!(cli.source.content_dir, Some(PathBuf::from("pages")));
        assert!(matches!(cli.command, Commands::Serve { port: 4000, .. }));
    }
}
