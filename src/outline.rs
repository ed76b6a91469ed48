//! Structure of an HTML page fragment.
//!
//! Pages are stored as pre-rendered HTML. This module scans a fragment just
//! far enough to find its headings (page title, anchors, TOC) and to flatten
//! it into text blocks for the terminal pager. It is not a general HTML
//! parser: only the tags used by tutorial pages are recognised, and anything
//! else that looks like a tag (e.g. `Vec<u8>` inside a code sample) is kept
//! as text.

use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading found in a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Heading level (1–6).
    pub level: u8,
    /// Plain-text content with entities decoded and whitespace collapsed.
    pub text: String,
    /// Value of the `class` attribute, if any (`heading`, `subHeading`, ...).
    pub class: Option<String>,
    /// Anchor ID, deduplicated within the fragment.
    ///
    /// An existing `id` attribute is kept as-is. Otherwise the first
    /// occurrence of a slug is bare (`my-heading`) and later ones get a
    /// numeric suffix (`my-heading-1`, `my-heading-2`).
    pub anchor_id: String,
}

/// The kind of a flattened text block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    CodeBlock,
    /// List item with its nesting depth (1 = top-level list).
    ListItem(u8),
    /// Table row; `header` is set when the row holds `<th>` cells.
    TableRow { header: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// Flattened text. Code blocks keep their line structure.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

const KNOWN_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "img", "li", "ol", "p", "pre", "section", "small", "span", "strong", "sub", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// Opening (or self-closing) tag. `start..end` spans `<` to `>` inclusive.
    Open {
        name: String,
        attrs: &'a str,
        start: usize,
        end: usize,
    },
    Close {
        name: String,
    },
    Text(&'a str),
}

fn is_known_tag(name: &str) -> bool {
    KNOWN_TAGS.contains(&name)
}

/// Try to read a tag starting at byte `start` (which holds `<`).
fn read_tag(html: &str, start: usize) -> Option<Token<'_>> {
    let rest = &html[start + 1..];
    let close_at = rest.find('>')?;
    let inner = &rest[..close_at];
    let end = start + 1 + close_at + 1;

    let (closing, body) = match inner.strip_prefix('/') {
        Some(b) => (true, b),
        None => (false, inner),
    };
    let name_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let name = body[..name_len].to_ascii_lowercase();
    if !is_known_tag(&name) {
        return None;
    }
    let attrs = body[name_len..].trim_end_matches('/');
    // `<h1x>` is not `<h1>`: the name must end at whitespace, `/` or `>`.
    if !attrs.is_empty() && !attrs.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }

    Some(if closing {
        Token::Close { name }
    } else {
        Token::Open {
            name,
            attrs,
            start,
            end,
        }
    })
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;
    while let Some(offset) = html[pos..].find('<') {
        let lt = pos + offset;
        match read_tag(html, lt) {
            Some(tag) => {
                if text_start < lt {
                    tokens.push(Token::Text(&html[text_start..lt]));
                }
                pos = match &tag {
                    Token::Open { end, .. } => *end,
                    _ => lt + html[lt..].find('>').map_or(1, |i| i + 1),
                };
                tokens.push(tag);
                text_start = pos;
            }
            None => pos = lt + 1,
        }
    }
    if text_start < html.len() {
        tokens.push(Token::Text(&html[text_start..]));
    }
    tokens
}

/// Extract the value of attribute `name` from a raw attribute string.
fn attr_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = attrs;
    while let Some(idx) = rest.find(name) {
        let before_ok = idx == 0 || rest[..idx].ends_with(|c: char| c.is_whitespace());
        let after = rest[idx + name.len()..].trim_start();
        if before_ok {
            if let Some(value) = after.strip_prefix('=') {
                let value = value.trim_start();
                let quote = value.chars().next()?;
                if quote == '"' || quote == '\'' {
                    let inner = &value[1..];
                    return inner.find(quote).map(|end| &inner[..end]);
                }
                let end = value
                    .find(|c: char| c.is_whitespace())
                    .unwrap_or(value.len());
                return Some(&value[..end]);
            }
        }
        rest = &rest[idx + name.len()..];
    }
    None
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Decode the HTML entities that occur in page content.
///
/// Named entities outside the small set below and malformed references are
/// left untouched.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Append `text` to `buf`, collapsing runs of whitespace into one space.
fn push_collapsed(buf: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() {
            if !buf.is_empty() && !buf.ends_with(' ') {
                buf.push(' ');
            }
        } else {
            buf.push(c);
        }
    }
}

/// Convert heading text to a URL-safe anchor slug.
///
/// Lowercase the text, map spaces/hyphens/underscores to `-`, drop all other
/// non-alphanumeric characters, collapse consecutive hyphens, and trim
/// leading/trailing hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c == ' ' || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_owned()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Plain text of the first `<h1>` in the fragment.
pub fn title(fragment: &str) -> Option<String> {
    let mut buf = String::new();
    let mut inside = false;
    for token in tokenize(fragment) {
        match token {
            Token::Open { ref name, .. } if name == "h1" => inside = true,
            Token::Close { ref name } if name == "h1" && inside => {
                let text = buf.trim().to_owned();
                if !text.is_empty() {
                    return Some(text);
                }
                buf.clear();
                inside = false;
            }
            Token::Text(t) if inside => push_collapsed(&mut buf, &decode_entities(t)),
            _ => {}
        }
    }
    None
}

/// Collect the headings of a fragment and return a copy of the fragment with
/// an `id` attribute on every heading.
///
/// Headings that already carry an `id` keep it and the markup is left alone.
/// Generated ids never repeat an id already present on another heading.
pub fn annotate(fragment: &str) -> (String, Vec<Heading>) {
    struct Pending<'a> {
        level: u8,
        attrs: &'a str,
        insert_at: usize,
        text: String,
    }

    let mut headings: Vec<Heading> = Vec::new();
    // (byte offset, id) pairs to splice into the output.
    let mut inserts: Vec<(usize, String)> = Vec::new();
    let mut slug_counter: HashMap<String, usize> = HashMap::new();
    let mut issued: HashSet<String> = tokenize(fragment)
        .into_iter()
        .filter_map(|token| match token {
            Token::Open { ref name, attrs, .. } if heading_level(name).is_some() => {
                attr_value(attrs, "id").map(str::to_owned)
            }
            _ => None,
        })
        .collect();
    let mut pending: Option<Pending> = None;

    for token in tokenize(fragment) {
        match token {
            Token::Open {
                ref name,
                attrs,
                start,
                ..
            } => {
                if let Some(level) = heading_level(name) {
                    pending = Some(Pending {
                        level,
                        attrs,
                        insert_at: start + 1 + name.len(),
                        text: String::new(),
                    });
                }
            }
            Token::Close { ref name } => {
                let closes_pending = pending
                    .as_ref()
                    .map_or(false, |p| heading_level(name) == Some(p.level));
                if !closes_pending {
                    continue;
                }
                let Some(p) = pending.take() else { continue };
                let text = p.text.trim().to_owned();
                let class = attr_value(p.attrs, "class").map(str::to_owned);

                let anchor_id = match attr_value(p.attrs, "id") {
                    Some(existing) => existing.to_owned(),
                    None => {
                        let mut base = slugify(&text);
                        if base.is_empty() {
                            base = "section".to_owned();
                        }
                        let count = slug_counter.entry(base.clone()).or_insert(0);
                        let id = loop {
                            let candidate = if *count == 0 {
                                base.clone()
                            } else {
                                format!("{}-{}", base, count)
                            };
                            *count += 1;
                            if issued.insert(candidate.clone()) {
                                break candidate;
                            }
                        };
                        inserts.push((p.insert_at, id.clone()));
                        id
                    }
                };

                headings.push(Heading {
                    level: p.level,
                    text,
                    class,
                    anchor_id,
                });
            }
            Token::Text(t) => {
                if let Some(p) = pending.as_mut() {
                    push_collapsed(&mut p.text, &decode_entities(t));
                }
            }
        }
    }

    let mut html = String::with_capacity(fragment.len() + inserts.len() * 24);
    let mut copied = 0;
    for (at, id) in &inserts {
        html.push_str(&fragment[copied..*at]);
        html.push_str(&format!(" id=\"{id}\""));
        copied = *at;
    }
    html.push_str(&fragment[copied..]);

    (html, headings)
}

/// Accumulates text for the block currently being built.
struct BlockBuilder {
    blocks: Vec<ContentBlock>,
    kind: BlockKind,
    buf: String,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            kind: BlockKind::Paragraph,
            buf: String::new(),
        }
    }

    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        if self.kind == BlockKind::CodeBlock {
            self.buf.push_str(&decoded);
        } else {
            push_collapsed(&mut self.buf, &decoded);
        }
    }

    /// Emit the buffered text (if any) as a block of the current kind.
    fn flush(&mut self) {
        let content = if self.kind == BlockKind::CodeBlock {
            self.buf.trim_matches('\n').trim_end().to_owned()
        } else {
            self.buf.trim().to_owned()
        };
        if !content.is_empty() {
            self.blocks.push(ContentBlock {
                kind: self.kind.clone(),
                content,
            });
        }
        self.buf.clear();
    }

    /// Flush, then continue with a block of `kind`.
    fn start(&mut self, kind: BlockKind) {
        self.flush();
        self.kind = kind;
    }
}

/// Flatten a fragment into text blocks, in document order.
pub fn blocks(fragment: &str) -> Vec<ContentBlock> {
    let mut builder = BlockBuilder::new();
    let mut list_depth: u8 = 0;
    let mut in_row = false;
    let mut row_cells = 0usize;

    // Kind to resume once an inline-level block (heading, code) ends.
    let resume = |depth: u8, in_row: bool| {
        if in_row {
            BlockKind::TableRow { header: false }
        } else if depth > 0 {
            BlockKind::ListItem(depth)
        } else {
            BlockKind::Paragraph
        }
    };

    for token in tokenize(fragment) {
        match token {
            Token::Text(t) => builder.text(t),
            Token::Open { ref name, .. } => match name.as_str() {
                "pre" => builder.start(BlockKind::CodeBlock),
                "ul" | "ol" => {
                    builder.flush();
                    list_depth = list_depth.saturating_add(1);
                }
                "li" => builder.start(BlockKind::ListItem(list_depth.max(1))),
                "tr" => {
                    builder.start(BlockKind::TableRow { header: false });
                    in_row = true;
                    row_cells = 0;
                }
                "td" | "th" => {
                    if name == "th" {
                        builder.kind = BlockKind::TableRow { header: true };
                    }
                    if row_cells > 0 {
                        let trimmed = builder.buf.trim_end().len();
                        builder.buf.truncate(trimmed);
                        builder.buf.push_str(" | ");
                    }
                    row_cells += 1;
                }
                "br" if builder.kind == BlockKind::CodeBlock => builder.buf.push('\n'),
                "br" | "p" | "div" | "table" | "blockquote" | "hr" => {
                    if builder.kind == BlockKind::Paragraph {
                        builder.flush();
                    } else if builder.kind != BlockKind::CodeBlock && !in_row {
                        builder.buf.push(' ');
                    }
                }
                other => {
                    if let Some(level) = heading_level(other) {
                        builder.start(BlockKind::Heading(level));
                    }
                }
            },
            Token::Close { ref name } => match name.as_str() {
                "pre" => builder.start(resume(list_depth, in_row)),
                "ul" | "ol" => {
                    builder.flush();
                    list_depth = list_depth.saturating_sub(1);
                    builder.kind = resume(list_depth, in_row);
                }
                "li" => builder.start(resume(list_depth, in_row)),
                "tr" => {
                    in_row = false;
                    builder.start(resume(list_depth, false));
                }
                "p" | "div" | "table" | "blockquote" if builder.kind == BlockKind::Paragraph => {
                    builder.flush()
                }
                other if heading_level(other).is_some() => {
                    builder.start(resume(list_depth, in_row))
                }
                _ => {}
            },
        }
    }
    builder.flush();
    builder.blocks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
