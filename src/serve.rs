//! HTTP server for the live index page
//!
//! `slidetags serve` → serves the index with tag editing, flushes edits to the
//! local cache and gist after a quiet period.
//!
//! The loop is single-threaded: it owns the Tag Store, waits for the next
//! request no longer than the debounce deadline, and runs due flushes between
//! requests.

use crate::config::Config;
use crate::error::Error;
use crate::filter::SlideFilter;
use crate::page::{self, PageMode};
use crate::slides::SlideCatalog;
use crate::tags::{FlushReport, RemoteOutcome, TagStore};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

/// Longest the loop blocks when no flush is pending
const IDLE_TICK: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Everything a request handler can touch
pub struct Session {
    pub config: Config,
    pub catalog: SlideCatalog,
    pub tags: TagStore,
}

#[derive(Deserialize)]
struct AddTagRequest {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleRequest {
    slide_id: String,
    tag_id: String,
}

#[derive(Deserialize, Default)]
struct SlidesQuery {
    #[serde(default)]
    q: String,
    /// Comma-separated tag ids
    #[serde(default)]
    tags: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    state: crate::tags::SyncState,
    remote_configured: bool,
    remote_unsaved: bool,
    last_updated: Option<String>,
}

#[derive(Serialize)]
struct SlidesBody {
    visible: Vec<String>,
    hidden: Vec<String>,
    summary: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleBody {
    slide_id: String,
    tag_id: String,
    assigned: bool,
}

/// Start the live index server
///
/// Returns after Ctrl+C (or SIGTERM), once pending edits are flushed, or
/// when the listener fails.
pub fn start(port: u16, session: Session) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| std::io::Error::other(e.to_string()))?;

    eprintln!("\n\x1b[1;32m🏷  slidetags\x1b[0m");
    eprintln!("   Slides: http://localhost:{}", port);
    eprintln!("   Press Ctrl+C to stop\n");
    tracing::info!(%addr, slides = session.catalog.len(), "serving live index");

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;

    run(&server, session, &shutdown)
}

/// Accept loop; runs due flushes between requests until `shutdown` is set
fn run(server: &Server, mut session: Session, shutdown: &AtomicBool) -> std::io::Result<()> {
    while !shutdown.load(Ordering::Relaxed) {
        let wait = session.tags.next_flush_in().unwrap_or(IDLE_TICK).min(IDLE_TICK);
        match server.recv_timeout(wait) {
            Ok(Some(request)) => {
                if let Err(e) = handle_request(&mut session, request) {
                    tracing::warn!(error = %e, "failed to respond");
                }
            }
            Ok(None) => {}
            Err(e) => {
                session.tags.flush_now();
                return Err(e);
            }
        }

        if let Some(report) = session.tags.poll() {
            log_flush(&report);
        }
    }

    tracing::info!("shutting down");
    if let Some(report) = session.tags.flush_now() {
        log_flush(&report);
    }
    Ok(())
}

fn log_flush(report: &FlushReport) {
    match &report.remote {
        RemoteOutcome::Failed(message) => {
            tracing::warn!(%message, "saved locally, gist sync failed")
        }
        outcome => tracing::info!(?outcome, "flushed tag data"),
    }
}

fn json_header() -> Header {
    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid")
}

fn html_header() -> Header {
    Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
        .expect("static header is valid")
}

fn respond_json<T: Serialize>(request: Request, status: u16, body: &T) -> std::io::Result<()> {
    let json = serde_json::to_string(body)?;
    let response = Response::from_string(json)
        .with_status_code(status)
        .with_header(json_header());
    request.respond(response)
}

fn respond_error(request: Request, err: &Error) -> std::io::Result<()> {
    let status = match err {
        Error::Validation(_) | Error::Parse(_) => 400,
        _ => 500,
    };
    respond_json(request, status, &ApiResponse::failure(err.to_string()))
}

fn read_json<T: for<'de> Deserialize<'de>>(request: &mut Request) -> Result<T, Error> {
    let mut body = String::new();
    request.as_reader().read_to_string(&mut body)?;
    Ok(serde_json::from_str(&body)?)
}

fn handle_request(session: &mut Session, mut request: Request) -> std::io::Result<()> {
    let url = request.url().to_string();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    let method = request.method().clone();
    tracing::debug!(%method, path, "request");

    match (&method, path) {
        (&Method::Get, "/") | (&Method::Get, "/index.html") => {
            let html = page::render(
                &session.config.site,
                &session.catalog,
                session.tags.store(),
                PageMode::Live,
            );
            request.respond(Response::from_string(html).with_header(html_header()))
        }

        (&Method::Get, "/api/store") => {
            respond_json(request, 200, &ApiResponse::success(session.tags.store()))
        }

        (&Method::Get, "/api/status") => {
            let body = StatusBody {
                state: session.tags.sync_state(),
                remote_configured: session.tags.remote_configured(),
                remote_unsaved: session.tags.has_unsaved_remote(),
                last_updated: session.tags.store().last_updated.clone(),
            };
            respond_json(request, 200, &ApiResponse::success(body))
        }

        (&Method::Get, "/api/slides") => {
            let params: SlidesQuery = serde_urlencoded::from_str(query).unwrap_or_default();
            let filter = SlideFilter::new().with_query(&params.q).with_tags(
                params
                    .tags
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty()),
            );
            let result = filter.apply(&session.catalog.slides, session.tags.store());
            let body = SlidesBody {
                visible: result.visible.iter().map(|s| s.name.clone()).collect(),
                hidden: result.hidden.iter().map(|s| s.name.clone()).collect(),
                summary: result.summary(),
            };
            respond_json(request, 200, &ApiResponse::success(body))
        }

        (&Method::Post, "/api/tags") => {
            let req: AddTagRequest = match read_json(&mut request) {
                Ok(r) => r,
                Err(e) => return respond_error(request, &e),
            };
            match session.tags.add_tag(&req.name) {
                Ok(tag) => {
                    let tag = tag.clone();
                    respond_json(request, 200, &ApiResponse::success(tag))
                }
                Err(e) => respond_error(request, &e),
            }
        }

        (&Method::Delete, p) if p.starts_with("/api/tags/") => {
            let tag_id = match urlencoding::decode(&p["/api/tags/".len()..]) {
                Ok(id) => id.into_owned(),
                Err(_) => {
                    let body = ApiResponse::failure("Tag id is not valid UTF-8");
                    return respond_json(request, 400, &body);
                }
            };
            match session.tags.remove_tag(&tag_id) {
                Some(tag) => respond_json(request, 200, &ApiResponse::success(tag)),
                None => respond_json(
                    request,
                    404,
                    &ApiResponse::failure(format!("Unknown tag: {}", tag_id)),
                ),
            }
        }

        (&Method::Post, "/api/assignments/toggle") => {
            let req: ToggleRequest = match read_json(&mut request) {
                Ok(r) => r,
                Err(e) => return respond_error(request, &e),
            };
            if !session.catalog.contains(&req.slide_id) {
                let err = crate::error::ValidationError::UnknownSlide(req.slide_id).into();
                return respond_error(request, &err);
            }
            let assigned = session.tags.toggle_tag(&req.slide_id, &req.tag_id);
            let body = ToggleBody {
                slide_id: req.slide_id,
                tag_id: req.tag_id,
                assigned,
            };
            respond_json(request, 200, &ApiResponse::success(body))
        }

        // Sent by the page on pagehide
        (&Method::Post, "/api/flush") => {
            let report = session.tags.flush_now();
            if let Some(report) = &report {
                log_flush(report);
            }
            respond_json(request, 200, &ApiResponse::success(report))
        }

        // 404
        _ => {
            let response = Response::from_string("Not found").with_status_code(404);
            request.respond(response)
        }
    }
}
