//! Embedded static web assets for the docs server.
//!
//! Both files are compiled into the binary via `include_str!` so the binary
//! is fully self-contained; no external asset files need to be distributed.

/// URL path of the stylesheet.
pub const CSS_PATH: &str = "/assets/chaindocs.css";

/// URL path of the script.
pub const JS_PATH: &str = "/assets/chaindocs.js";

/// Stylesheet for the page shell, including the colours for the
/// pre-highlighted code samples (`.keyword`, `.string`, ...).
pub const CSS: &str = include_str!("assets/chaindocs.css");

/// Theme toggle and TOC active-heading highlighting.
pub const JS: &str = include_str!("assets/chaindocs.js");
