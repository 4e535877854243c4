//! Local preview server.
//!
//! Serves the build output with `tiny_http`:
//!
//! - Static files from `output_dir`, `index.html` for directories
//! - `<path>.html` fallback when `trim_html` is set
//! - `/preview` (preview mode only): one entry file, loaded regardless of its
//!   status and rendered through the article page on every request
//! - Graceful shutdown on Ctrl+C

use crate::{
    app::App,
    content::read_entry,
    log,
    render::{Links, Renderer, ViewModel},
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Route answered by [`render_preview`] in preview mode.
const PREVIEW_ROUTE: &str = "/preview";

/// Serve `output_dir` on `port` until Ctrl+C.
///
/// With `preview` set, `/preview` renders that entry file live.
pub fn serve_site(app: &Arc<App>, port: u16, preview: Option<PathBuf>) -> Result<()> {
    let (server, addr) = try_bind_port(IpAddr::V4(Ipv4Addr::LOCALHOST), port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);
    if let Some(path) = &preview {
        log!("preview"; "http://{}{} -> {}", addr, PREVIEW_ROUTE, path.display());
    }

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, app, preview.as_deref()) {
            log!("serve"; "request error: {e:#}");
        }
    }

    Ok(())
}

fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    let last_port = base_port.saturating_add(max_retries.saturating_sub(1));
    let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
    Err(anyhow!("No free port in {base_port}-{last_port}: {reason}"))
}

// ============================================================================
// Request Handling
// ============================================================================

fn handle_request(request: Request, app: &Arc<App>, preview: Option<&Path>) -> Result<()> {
    let url = request.url().split('?').next().unwrap_or_default().to_owned();

    if let Some(entry) = preview.filter(|_| url == PREVIEW_ROUTE) {
        // errors are shown in the page rather than failing the request
        let html = render_preview(app, entry).unwrap_or_else(|e| format!("{e:#}"));
        return serve_html(request, html);
    }

    match resolve(&app.config.output_dir, &url, app.config.trim_html) {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

/// Map a request path onto a file under `root`.
///
/// Tries the path itself, then `index.html` inside it, then `<path>.html`
/// when `trim_html` is set. Paths escaping `root` never resolve.
fn resolve(root: &Path, url: &str, trim_html: bool) -> Option<PathBuf> {
    let decoded = urlencoding::decode(url).ok()?;
    let relative = Path::new(decoded.trim_matches('/'));
    if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }

    let local = root.join(relative);
    if local.is_file() {
        return Some(local);
    }
    if local.is_dir() {
        let index = local.join("index.html");
        return index.is_file().then_some(index);
    }
    if trim_html {
        let mut html = local.into_os_string();
        html.push(".html");
        let html = PathBuf::from(html);
        return html.is_file().then_some(html);
    }
    None
}

/// Load, convert and render the entry at `path` with a fresh renderer.
pub fn render_preview(app: &Arc<App>, path: &Path) -> Result<String> {
    let entry = read_entry(path, &app.config, &app.links)?;
    let lua = app.pool.acquire()?;
    entry.html(&lua)?;

    let data = Links::entry_data(&entry);
    let view = ViewModel {
        entry: Some(Arc::clone(&entry)),
        ..ViewModel::with_title(app.links.title("Article", data)?)
    };
    let renderer = Renderer::new(app.config.theme_path());
    Ok(renderer.render_page(app, &lua, "article", view)?)
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("Invalid content type `{value}`"))
}

fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content).with_header(content_type(guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

fn serve_html(request: Request, content: String) -> Result<()> {
    let response = Response::from_string(content).with_header(content_type("text/html; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::from_string("404 Not Found")
        .with_status_code(StatusCode(404))
        .with_header(content_type("text/plain; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

/// Extension → MIME type; anything else is served as bytes.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("json", "application/json"),
    ("xml", "application/xml; charset=utf-8"),
    ("atom", "application/atom+xml; charset=utf-8"),
    ("rss", "application/rss+xml; charset=utf-8"),
    ("txt", "text/plain; charset=utf-8"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("woff2", "font/woff2"),
];

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map_or("application/octet-stream", |&(_, mime)| mime)
}
