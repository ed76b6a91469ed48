use std::collections::BTreeMap;
use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::SystemTime;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::Response,
    Router,
};
use tokio::signal;
use tower_http::compression::CompressionLayer;

use crate::html;
use crate::manifest::Manifest;
use crate::registry::{self, ContentRegistry};
use crate::web_assets;

/// Maximum number of consecutive ports to try before giving up.
const MAX_PORT_ATTEMPTS: u16 = 100;

/// Path of the JSON page index.
pub const API_PAGES_PATH: &str = "/api/pages";

/// Server configuration.
pub struct AppConfig {
    pub bind_addr: String,
    pub start_port: u16,
}

/// A page shell rendered at start-up.
pub struct CachedPage {
    pub html: String,
    pub etag: String,
}

/// Shared application state passed to all request handlers via `Arc<AppState>`.
///
/// Built once before the listener opens and never mutated afterwards.
pub struct AppState {
    pub registry: ContentRegistry,
    /// Rendered page shells keyed by page key.
    pub pages: BTreeMap<String, CachedPage>,
    /// Key of the page served at `/`.
    pub home: Option<String>,
    /// Serialized `/api/pages` body.
    pub index_json: String,
    pub index_etag: String,
    /// `Last-Modified` value shared by every page (start-up time).
    pub last_modified: String,
    /// `last_modified` parsed back, i.e. truncated to whole seconds.
    pub started: SystemTime,
    pub config: AppConfig,
}

impl AppState {
    /// Render every page of `registry` and freeze the result.
    pub fn build(
        registry: ContentRegistry,
        manifest: &Manifest,
        config: AppConfig,
    ) -> Result<Self, serde_json::Error> {
        let pages = html::render_site(&registry, manifest)
            .into_iter()
            .map(|(key, html)| {
                let etag = etag_for(&html);
                (key, CachedPage { html, etag })
            })
            .collect();

        let index_json = serde_json::to_string(&html::page_index(&registry, manifest))?;
        let index_etag = etag_for(&index_json);

        let home = manifest.home_key(&registry).map(str::to_owned);
        let last_modified = httpdate::fmt_http_date(SystemTime::now());
        let started = httpdate::parse_http_date(&last_modified).unwrap_or_else(|_| SystemTime::now());

        Ok(Self {
            registry,
            pages,
            home,
            index_json,
            index_etag,
            last_modified,
            started,
            config,
        })
    }
}

/// Attempt to bind a TCP listener on `bind_addr` starting at `start_port`.
///
/// On `EADDRINUSE` the port is incremented by one and the attempt is retried up
/// to `MAX_PORT_ATTEMPTS` times.  Any other OS error causes an immediate failure
/// without further retries.
///
/// Returns the bound `TcpListener` and the actual port on success, or a
/// descriptive `String` error on failure.
pub fn bind_with_retry(bind_addr: &str, start_port: u16) -> Result<(TcpListener, u16), String> {
    let mut port = start_port;
    log::debug!("[bind] trying port={port}");
    for _ in 0..MAX_PORT_ATTEMPTS {
        let addr = format!("{bind_addr}:{port}");
        match TcpListener::bind(&addr) {
            Ok(listener) => {
                log::debug!("[bind] success port={port}");
                return Ok((listener, port));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port.wrapping_add(1);
                log::warn!("[bind] EADDRINUSE port={port}, trying {next}");
                port = next;
            }
            Err(e) => {
                return Err(format!("bind {bind_addr}:{port} failed: {e}"));
            }
        }
    }
    Err(format!(
        "exhausted {MAX_PORT_ATTEMPTS} port candidates starting at {start_port}; all ports in use"
    ))
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Percent-decode a URL path byte-by-byte (RFC 3986 §2.1).
///
/// Returns `Err(())` if the encoding is malformed (truncated `%XX` sequence or
/// non-hex digit) or if the decoded byte sequence is not valid UTF-8.
pub fn percent_decode(encoded: &str) -> Result<String, ()> {
    let bytes = encoded.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(()); // truncated sequence
            }
            let hi = hex_digit(bytes[i + 1])?;
            let lo = hex_digit(bytes[i + 2])?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ())
}

fn hex_digit(b: u8) -> Result<u8, ()> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(()),
    }
}

/// Route a decoded request path to a page key.
///
/// `/` maps to the home page. Otherwise the path must be exactly one segment
/// that is a valid page key; anything with further slashes, dots or other
/// characters never names a page.
pub fn page_key_for_path<'a>(decoded: &'a str, home: Option<&'a str>) -> Option<&'a str> {
    let key = decoded.strip_prefix('/').unwrap_or(decoded);
    let key = key.strip_suffix('/').unwrap_or(key);
    if key.is_empty() {
        return home;
    }
    registry::is_valid_key(key).then_some(key)
}

/// Return `true` when the query string contains the `raw=1` parameter.
///
/// Parses the raw query string (e.g. `"raw=1&foo=bar"`) by splitting on `&`
/// and looking for an exact match of `"raw=1"`.
fn is_raw_mode(query: &str) -> bool {
    query.split('&').any(|param| param == "raw=1")
}

// ---------------------------------------------------------------------------
// Conditional requests
// ---------------------------------------------------------------------------

/// Weak entity tag over the identity body: a 64-bit FNV-1a hash.
///
/// The same tag is served for every content-coding the compression layer
/// picks, so it must not claim byte-for-byte equality.
pub fn etag_for(body: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in body.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("W/\"{hash:016x}\"")
}

/// `true` when `If-None-Match` lists `etag` (or `*`), using the weak
/// comparison of RFC 9110 §8.8.3.2.
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let opaque = |tag: &str| tag.strip_prefix("W/").unwrap_or(tag).to_owned();
    let etag = opaque(etag);
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || opaque(candidate) == etag)
}

/// Decide whether the client's cached copy is still fresh.
///
/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when it is absent (RFC 9110 §13.2.2).
fn is_not_modified(headers: &HeaderMap, etag: &str, started: SystemTime) -> bool {
    if let Some(value) = headers.get(header::IF_NONE_MATCH) {
        return value
            .to_str()
            .map(|v| etag_matches(v, etag))
            .unwrap_or(false);
    }
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .is_some_and(|since| started <= since)
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// 404 Not Found with mandatory security headers.
fn not_found_response() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from("Not Found"))
        .unwrap_or_default()
}

fn method_not_allowed_response() -> Response {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(header::ALLOW, "GET, HEAD")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::empty())
        .unwrap_or_default()
}

fn not_modified_response(etag: &str, last_modified: &str) -> Response {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(header::ETAG, etag)
        .header(header::LAST_MODIFIED, last_modified)
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::empty())
        .unwrap_or_default()
}

fn asset_response(content_type: &'static str, body: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(body))
        .unwrap_or_default()
}

/// 200 response for a cacheable body, or 304 when the client copy is fresh.
fn cached_response(
    state: &AppState,
    headers: &HeaderMap,
    content_type: &'static str,
    etag: &str,
    body: String,
) -> Response {
    if is_not_modified(headers, etag, state.started) {
        return not_modified_response(etag, &state.last_modified);
    }
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ETAG, etag)
        .header(header::LAST_MODIFIED, state.last_modified.as_str())
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(body))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Axum request handler
// ---------------------------------------------------------------------------

/// Main request handler.
///
/// 1. Only `GET` and `HEAD` are accepted.
/// 2. Embedded assets and `/api/pages` are matched on the raw path.
/// 3. The path is percent-decoded and mapped to a page key; `/` is the home
///    page.
/// 4. `?raw=1` returns the registered fragment as `text/plain`; otherwise the
///    pre-rendered page shell is returned, honouring conditional headers.
///
/// All responses include `X-Content-Type-Options: nosniff`.
async fn serve_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        log::info!("[request] method={} branch=denied reason=method", req.method());
        return method_not_allowed_response();
    }

    let raw_path = req.uri().path();
    let query = req.uri().query().unwrap_or("");

    if raw_path == web_assets::CSS_PATH {
        log::info!("[request] path={raw_path} mode=asset");
        return asset_response("text/css; charset=utf-8", web_assets::CSS);
    }
    if raw_path == web_assets::JS_PATH {
        log::info!("[request] path={raw_path} mode=asset");
        return asset_response("text/javascript; charset=utf-8", web_assets::JS);
    }
    if raw_path == API_PAGES_PATH {
        log::info!("[request] path={raw_path} mode=index");
        return cached_response(
            &state,
            req.headers(),
            "application/json",
            &state.index_etag,
            state.index_json.clone(),
        );
    }

    let decoded = match percent_decode(raw_path) {
        Ok(d) => d,
        Err(()) => {
            log::info!("[request] path={raw_path} branch=denied reason=invalid-percent-encoding");
            return not_found_response();
        }
    };

    let Some(key) = page_key_for_path(&decoded, state.home.as_deref()) else {
        log::info!("[request] path={raw_path} branch=denied reason=not-a-key");
        return not_found_response();
    };

    if is_raw_mode(query) {
        return match state.registry.get(key) {
            Ok(fragment) => {
                log::info!("[request] key={key} mode=raw");
                cached_response(
                    &state,
                    req.headers(),
                    "text/plain; charset=utf-8",
                    &etag_for(fragment),
                    fragment.to_owned(),
                )
            }
            Err(e) => {
                log::info!("[request] key={key} branch=denied reason={e}");
                not_found_response()
            }
        };
    }

    match state.pages.get(key) {
        Some(page) => {
            log::info!("[request] key={key} mode=rendered");
            cached_response(
                &state,
                req.headers(),
                "text/html; charset=utf-8",
                &page.etag,
                page.html.clone(),
            )
        }
        None => {
            log::info!("[request] key={key} branch=denied reason=not-found");
            not_found_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Serve `registry` over HTTP until SIGINT.
///
/// Every page is rendered before the listener opens. Binds to `bind_addr`
/// starting at `start_port`, retrying on `EADDRINUSE` up to 100 times.
pub async fn run_serve(
    registry: ContentRegistry,
    manifest: Manifest,
    config: AppConfig,
) -> io::Result<()> {
    let state = AppState::build(registry, &manifest, config).map_err(io::Error::other)?;

    let (std_listener, bound_port) =
        bind_with_retry(&state.config.bind_addr, state.config.start_port).map_err(|msg| {
            log::error!("[bind] {msg}");
            io::Error::new(io::ErrorKind::AddrInUse, msg)
        })?;

    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;

    println!("chaindocs serve");
    println!("pages: {}", state.pages.len());
    match &state.home {
        Some(home) => println!("home:  / ({home})"),
        None => println!("home:  (none)"),
    }
    println!("url:   http://{}:{}", state.config.bind_addr, bound_port);

    log::info!(
        "[serve] listening on {}:{} pages={}",
        state.config.bind_addr,
        bound_port,
        state.pages.len()
    );

    let app = Router::new()
        .fallback(serve_handler)
        .with_state(Arc::new(state))
        .layer(CompressionLayer::new());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                log::error!("[shutdown] failed to install SIGINT handler: {e}");
                return;
            }
            log::info!("[shutdown] complete");
        })
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
