//! Local preview server.
//!
//! Serves the build output for development, built on `tiny_http`:
//!
//! - Static file serving from the build output directory
//! - Automatic `index.html` resolution for directories
//! - Optional browser launch after a short delay
//! - Live reload through an external tool (markdown sites), when installed
//! - Graceful shutdown on Ctrl+C
//!
//! # Flow
//!
//! ```text
//! check_output() ──► open_browser_later() ──► try_livereload()? ──► serve_static()
//!                       (detached thread)      (markdown only)       (tiny_http loop)
//! ```

use crate::{
    config::{SiteConfig, SourceFormat},
    log,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs, io,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    process::Command,
    sync::Arc,
    thread,
    time::Duration,
};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Delay before opening the browser, so the server is listening first.
const BROWSER_DELAY: Duration = Duration::from_millis(1500);

/// Preview server errors.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Output directory {0} does not exist. Run `tufted build` first.")]
    MissingOutput(PathBuf),

    #[error("{0} does not exist. Run `tufted build` first.")]
    MissingIndex(PathBuf),

    #[error("Port {0} is already in use. Choose another one with `tufted preview --port <PORT>`.")]
    PortInUse(u16),

    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the output directory until interrupted.
pub fn serve_site(config: &SiteConfig) -> Result<()> {
    check_output(config)?;

    if config.serve.open {
        open_browser_later(config.serve.port);
    }

    if config.build.format == SourceFormat::Markdown && try_livereload(config)? {
        return Ok(());
    }

    serve_static(config)
}

/// The output root must exist; typst sites also need their top-level page.
fn check_output(config: &SiteConfig) -> Result<(), ServeError> {
    let output = &config.build.output;
    if !output.is_dir() {
        return Err(ServeError::MissingOutput(output.clone()));
    }

    let index = output.join("index.html");
    if config.build.format == SourceFormat::Typst && !index.is_file() {
        return Err(ServeError::MissingIndex(index));
    }

    Ok(())
}

/// Open the site in a browser after [`BROWSER_DELAY`], on a detached thread.
fn open_browser_later(port: u16) {
    thread::spawn(move || {
        thread::sleep(BROWSER_DELAY);
        let url = format!("http://localhost:{port}");
        log!("serve"; "opening {}", url);
        if let Err(err) = webbrowser::open(&url) {
            log!("warn"; "failed to open browser: {}", err);
        }
    });
}

/// Run the configured live-reload command in the foreground.
///
/// Returns `Ok(false)` when it is disabled or not installed.
fn try_livereload(config: &SiteConfig) -> Result<bool> {
    let Some((program, args)) = config.serve.livereload.split_first() else {
        return Ok(false);
    };

    if which::which(program).is_err() {
        log!("serve"; "`{}` not found, using built-in server", program);
        return Ok(false);
    }

    let port = config.serve.port.to_string();
    log!("serve"; "live reload via `{}` (Ctrl+C to stop)", config.serve.livereload.join(" "));

    let status = Command::new(program)
        .args(args)
        .arg(&config.build.output)
        .args(["-p", &port])
        .current_dir(&config.root)
        .status()
        .with_context(|| format!("Failed to execute `{program}`"))?;

    if !status.success() {
        log!("warn"; "`{}` exited with {}", program, status);
    }
    Ok(true)
}

/// Serve files with the built-in server until Ctrl+C.
fn serve_static(config: &SiteConfig) -> Result<()> {
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid [serve.interface] `{}`", config.serve.interface))?;
    let addr = SocketAddr::new(interface, config.serve.port);
    let server = Arc::new(bind(addr)?);

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    let root = &config.build.output;
    log!("serve"; "serving {} at http://{} (Ctrl+C to stop)", root.display(), addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Bind once; an occupied port is reported rather than retried.
fn bind(addr: SocketAddr) -> Result<Server, ServeError> {
    Server::http(addr).map_err(|err| match err.downcast_ref::<io::Error>() {
        Some(io_err) if io_err.kind() == io::ErrorKind::AddrInUse => {
            ServeError::PortInUse(addr.port())
        }
        _ => ServeError::Bind {
            addr,
            message: err.to_string(),
        },
    })
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single HTTP request.
fn handle_request(request: Request, root: &Path) -> Result<()> {
    match resolve_path(root, request.url()) {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

/// Map a request URL onto a file below `root`.
///
/// Resolution order:
/// 1. Exact file match
/// 2. Directory with `index.html`
///
/// URLs that would leave `root` resolve to nothing.
fn resolve_path(root: &Path, url: &str) -> Option<PathBuf> {
    // Strip query string and fragment (e.g. ?t=123456) before decoding
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).ok()?;
    let relative = Path::new(decoded.trim_matches('/'));

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let local = root.join(relative);
    if local.is_file() {
        return Some(local);
    }

    let index = local.join("index.html");
    (local.is_dir() && index.is_file()).then_some(index)
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("Invalid header {name}: {value}"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response =
        Response::from_data(content).with_header(header("Content-Type", guess_content_type(path))?);

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::from_string("404 Not Found")
        .with_status_code(StatusCode(404))
        .with_header(header("Content-Type", "text/plain; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}
