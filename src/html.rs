//! HTML page shell for serve mode.
//!
//! Page fragments are already HTML; this module only wraps them into a full
//! document with a site header, a navigation sidebar built from the
//! manifest, a table of contents and prev/next links.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::manifest::{Manifest, UNLISTED_SECTION};
use crate::outline::{self, Heading};
use crate::registry::ContentRegistry;
use crate::web_assets;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A link to another page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLink<'a> {
    pub key: &'a str,
    pub title: &'a str,
}

/// A titled group of links in the navigation sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavGroup<'a> {
    pub title: &'a str,
    pub pages: Vec<PageLink<'a>>,
}

/// Per-page inputs for [`build_page_shell`].
pub struct PageShellContext<'a> {
    /// Site title from the manifest.
    pub site_title: &'a str,
    /// Key of the page being rendered (marked as current in the sidebar).
    pub key: &'a str,
    /// Key of the page served at `/`, so links to it point at the root.
    pub home: Option<&'a str>,
    pub nav: &'a [NavGroup<'a>],
    pub prev: Option<PageLink<'a>>,
    pub next: Option<PageLink<'a>>,
}

// ---------------------------------------------------------------------------
// Private HTML helpers
// ---------------------------------------------------------------------------

/// Minimal HTML entity escaping for text content and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// URL of a page: `/` for the home page, `/{key}` otherwise.
///
/// Keys are restricted to `[A-Za-z0-9_-]`, so no percent-encoding is needed.
pub fn page_href(key: &str, home: Option<&str>) -> String {
    if home == Some(key) {
        "/".to_owned()
    } else {
        format!("/{key}")
    }
}

/// Build the `<ul>…</ul>` HTML for the TOC sidebar.
///
/// The first `<h1>` is the page title and is left out, as are headings
/// below level 2. Returns an empty string when nothing remains.
fn build_toc_html(headings: &[Heading]) -> String {
    let title_idx = headings.iter().position(|h| h.level == 1);
    let entries: Vec<&Heading> = headings
        .iter()
        .enumerate()
        .filter(|(i, h)| Some(*i) != title_idx && h.level <= 2)
        .map(|(_, h)| h)
        .collect();
    if entries.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul>\n");
    for heading in entries {
        // Page content marks second-level sections as `<h1 class="subHeading">`.
        let depth = if heading.level == 2 || heading.class.as_deref() == Some("subHeading") {
            2
        } else {
            1
        };
        html.push_str(&format!(
            "<li class=\"toc-h{depth}\"><a href=\"#{}\">{}</a></li>\n",
            html_escape(&heading.anchor_id),
            html_escape(&heading.text),
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn build_nav_html(ctx: &PageShellContext) -> String {
    let mut html = String::new();
    for group in ctx.nav {
        html.push_str(&format!("<h2>{}</h2>\n<ul>\n", html_escape(group.title)));
        for link in &group.pages {
            let class = if link.key == ctx.key {
                " class=\"current\""
            } else {
                ""
            };
            html.push_str(&format!(
                "<li{class}><a href=\"{}\">{}</a></li>\n",
                page_href(link.key, ctx.home),
                html_escape(link.title),
            ));
        }
        html.push_str("</ul>\n");
    }
    html
}

fn build_page_nav_html(ctx: &PageShellContext) -> String {
    if ctx.prev.is_none() && ctx.next.is_none() {
        return String::new();
    }
    let link = |l: &PageLink, rel: &str, arrow_before: &str, arrow_after: &str| {
        format!(
            "<a rel=\"{rel}\" href=\"{}\">{arrow_before}{}{arrow_after}</a>",
            page_href(l.key, ctx.home),
            html_escape(l.title)
        )
    };
    let prev = ctx
        .prev
        .as_ref()
        .map(|l| link(l, "prev", "\u{2190} ", ""))
        .unwrap_or_else(|| "<span></span>".to_owned());
    let next = ctx
        .next
        .as_ref()
        .map(|l| link(l, "next", "", " \u{2192}"))
        .unwrap_or_else(|| "<span></span>".to_owned());
    format!("<nav class=\"page-nav\">\n{prev}\n{next}\n</nav>\n")
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the full HTML page: `<!DOCTYPE html>` with header, navigation
/// sidebar, the fragment (with heading anchors injected), TOC sidebar and
/// prev/next links.
///
/// The fragment is trusted site content and is embedded verbatim; every
/// other interpolated string is escaped.
pub fn build_page_shell(fragment: &str, ctx: &PageShellContext) -> String {
    let (content_html, headings) = outline::annotate(fragment);

    let page_title = outline::title(fragment);
    let title = html_escape(page_title.as_deref().unwrap_or(ctx.key));
    let site_title = html_escape(ctx.site_title);
    let toc_html = build_toc_html(&headings);
    let nav_html = build_nav_html(ctx);
    let page_nav_html = build_page_nav_html(ctx);
    let css = web_assets::CSS_PATH;
    let js = web_assets::JS_PATH;
    let key = html_escape(ctx.key);

    // Inline FOUC-prevention script: reads localStorage before CSS paints.
    const THEME_INIT_SCRIPT: &str = "\
<script>(function(){\
var s=localStorage.getItem('chaindocs-theme');\
var dark=s==='dark'||(!s&&window.matchMedia('(prefers-color-scheme:dark)').matches);\
if(dark)document.documentElement.setAttribute('data-theme','dark');\
}());</script>";

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<meta name=\"chaindocs-key\" content=\"{key}\">\n\
<title>{title} · {site_title}</title>\n\
{THEME_INIT_SCRIPT}\n\
<link rel=\"stylesheet\" href=\"{css}\">\n\
</head>\n\
<body>\n\
<header class=\"site-header\">\n\
<a href=\"/\">{site_title}</a>\n\
<button id=\"theme-toggle\" class=\"theme-toggle\" aria-label=\"Toggle dark mode\">\u{25d0}</button>\n\
</header>\n\
<div class=\"layout\">\n\
<nav class=\"site-nav\">\n\
{nav_html}</nav>\n\
<main class=\"content\">\n\
{content_html}\
{page_nav_html}</main>\n\
<nav class=\"toc-sidebar\">\n\
{toc_html}</nav>\n\
</div>\n\
<script src=\"{js}\"></script>\n\
</body>\n\
</html>\n"
    )
}

/// Title of every registered page: its first `<h1>`, else its key.
pub fn page_titles(registry: &ContentRegistry) -> BTreeMap<&str, String> {
    registry
        .iter()
        .map(|(key, fragment)| {
            let title = outline::title(fragment).unwrap_or_else(|| key.to_owned());
            (key, title)
        })
        .collect()
}

/// One row of the page index (`list --json`, `/api/pages`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub key: String,
    pub title: String,
    pub section: String,
}

/// Every registered page in reading order, with its title and the
/// navigation section it appears under.
pub fn page_index(registry: &ContentRegistry, manifest: &Manifest) -> Vec<PageSummary> {
    let titles = page_titles(registry);
    manifest
        .reading_order(registry)
        .into_iter()
        .map(|key| PageSummary {
            key: key.to_owned(),
            title: titles
                .get(key)
                .cloned()
                .unwrap_or_else(|| key.to_owned()),
            section: manifest
                .section_of(key)
                .unwrap_or(UNLISTED_SECTION)
                .to_owned(),
        })
        .collect()
}

fn page_link<'a>(key: &'a str, titles: &'a BTreeMap<&str, String>) -> PageLink<'a> {
    PageLink {
        key,
        title: titles.get(key).map(String::as_str).unwrap_or(key),
    }
}

/// Render every registered page into a full HTML document, keyed by page key.
pub fn render_site(registry: &ContentRegistry, manifest: &Manifest) -> BTreeMap<String, String> {
    let titles = page_titles(registry);
    let home = manifest.home_key(registry);

    let sections = manifest.nav(registry);
    let nav: Vec<NavGroup> = sections
        .iter()
        .map(|section| NavGroup {
            title: section.title,
            pages: section
                .pages
                .iter()
                .map(|&key| page_link(key, &titles))
                .collect(),
        })
        .collect();

    let order = manifest.reading_order(registry);
    let mut pages = BTreeMap::new();
    for (idx, &key) in order.iter().enumerate() {
        let ctx = PageShellContext {
            site_title: &manifest.title,
            key,
            home,
            nav: &nav,
            prev: idx.checked_sub(1).map(|i| page_link(order[i], &titles)),
            next: order.get(idx + 1).map(|&k| page_link(k, &titles)),
        };
        // reading_order only yields registered keys.
        if let Ok(fragment) = registry.get(key) {
            pages.insert(key.to_owned(), build_page_shell(fragment, &ctx));
        }
    }

    log::info!("[render] pages={}", pages.len());
    pages
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(nav: &'a [NavGroup<'a>]) -> PageShellContext<'a> {
        PageShellContext {
            site_title: "Docs",
            key: "coreConcepts",
            home: Some("home"),
            nav,
            prev: Some(PageLink {
                key: "home",
                title: "What is Blockchain?",
            }),
            next: None,
        }
    }

    const FRAGMENT: &str = "<h1 class=\"heading\">Core Concepts</h1>\n\
<h1 class=\"contentHeading\">Blocks</h1>\n\
<h1 class=\"subHeading\">Block Header</h1>\n\
<h3>Deep detail</h3>\n\
<p class=\"contentText\">Text</p>\n";

    #[test]
    fn html_escape_handles_special_chars() {
        assert_eq!(
            html_escape("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn home_links_to_root() {
        assert_eq!(page_href("home", Some("home")), "/");
        assert_eq!(page_href("defi", Some("home")), "/defi");
        assert_eq!(page_href("defi", None), "/defi");
    }

    #[test]
    fn page_shell_title_and_content() {
        let page = build_page_shell(FRAGMENT, &ctx(&[]));
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Core Concepts · Docs</title>"));
        assert!(page.contains("<h1 id=\"core-concepts\" class=\"heading\">Core Concepts</h1>"));
        assert!(page.contains("<p class=\"contentText\">Text</p>"));
    }

    #[test]
    fn page_shell_falls_back_to_key_for_title() {
        let page = build_page_shell("<p>no heading</p>", &ctx(&[]));
        assert!(page.contains("<title>coreConcepts · Docs</title>"));
    }

    #[test]
    fn toc_skips_title_and_deep_headings() {
        let page = build_page_shell(FRAGMENT, &ctx(&[]));
        assert!(page.contains("<nav class=\"toc-sidebar\">\n<ul>"));
        assert!(page.contains("<li class=\"toc-h1\"><a href=\"#blocks\">Blocks</a></li>"));
        assert!(page.contains(
            "<li class=\"toc-h2\"><a href=\"#block-header\">Block Header</a></li>"
        ));
        assert!(!page.contains("href=\"#core-concepts\""));
        assert!(!page.contains("href=\"#deep-detail\""));
    }

    #[test]
    fn nav_marks_current_page() {
        let nav = vec![NavGroup {
            title: "Basics",
            pages: vec![
                PageLink {
                    key: "home",
                    title: "What is Blockchain?",
                },
                PageLink {
                    key: "coreConcepts",
                    title: "Core Concepts",
                },
            ],
        }];
        let page = build_page_shell(FRAGMENT, &ctx(&nav));
        assert!(page.contains("<h2>Basics</h2>"));
        assert!(page.contains("<li><a href=\"/\">What is Blockchain?</a></li>"));
        assert!(page.contains("<li class=\"current\"><a href=\"/coreConcepts\">Core Concepts</a></li>"));
    }

    #[test]
    fn prev_next_links() {
        let page = build_page_shell(FRAGMENT, &ctx(&[]));
        assert!(page.contains("<a rel=\"prev\" href=\"/\">\u{2190} What is Blockchain?</a>"));
        assert!(!page.contains("rel=\"next\""));
    }

    #[test]
    fn page_shell_links_assets() {
        let page = build_page_shell(FRAGMENT, &ctx(&[]));
        assert!(page.contains("<link rel=\"stylesheet\" href=\"/assets/chaindocs.css\">"));
        assert!(page.contains("<script src=\"/assets/chaindocs.js\"></script>"));
    }

    #[test]
    fn nav_titles_are_escaped() {
        let nav = vec![NavGroup {
            title: "A & B",
            pages: vec![PageLink {
                key: "x",
                title: "<script>",
            }],
        }];
        let page = build_page_shell(FRAGMENT, &ctx(&nav));
        assert!(page.contains("<h2>A &amp; B</h2>"));
        assert!(page.contains(">&lt;script&gt;</a>"));
    }

    #[test]
    fn render_site_covers_every_builtin_page() {
        let registry = crate::catalog::builtin_registry();
        let manifest = Manifest::builtin().unwrap();
        let pages = render_site(&registry, &manifest);
        assert_eq!(pages.len(), registry.len());
        let home = &pages["home"];
        assert!(home.contains("<title>What is Blockchain? · Blockchain Development Docs</title>"));
        assert!(home.contains("rel=\"next\" href=\"/coreConcepts\""));
    }

    #[test]
    fn shell_title_skips_empty_h1() {
        let shell = PageShellContext {
            key: "empty",
            ..ctx(&[])
        };
        let html = build_page_shell("<h1></h1><h1>Real Title</h1><p>x</p>", &shell);
        assert!(html.contains("<title>Real Title · "), "{html}");

        let mut registry = ContentRegistry::new();
        registry.register("empty", "<h1></h1><h1>Real Title</h1>");
        assert_eq!(page_titles(&registry)["empty"], "Real Title");
    }

    #[test]
    fn page_index_follows_manifest() {
        let mut registry = ContentRegistry::new();
        registry.register("home", "<h1 class=\"heading\">What is Blockchain?</h1>");
        registry.register("stray", "<p>untitled</p>");
        let manifest = Manifest::from_yaml("title: T\nsections:\n  - title: Basics\n    pages: [home]\n").unwrap();
        assert_eq!(
            page_index(&registry, &manifest),
            vec![
                PageSummary {
                    key: "home".into(),
                    title: "What is Blockchain?".into(),
                    section: "Basics".into(),
                },
                PageSummary {
                    key: "stray".into(),
                    title: "stray".into(),
                    section: UNLISTED_SECTION.into(),
                },
            ]
        );
    }

    #[test]
    fn page_titles_fall_back_to_key() {
        let mut registry = ContentRegistry::new();
        registry.register("titled", "<h1>Solana Architecture</h1>");
        registry.register("bare", "<p>x</p>");
        let titles = page_titles(&registry);
        assert_eq!(titles["titled"], "Solana Architecture");
        assert_eq!(titles["bare"], "bare");
    }
}
