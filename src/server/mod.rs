//! Development server with live reload.
//!
//! Serves the output tree over HTTP, injects a small client script into HTML
//! pages and pushes [`ReloadEvent`]s to that client over server-sent events.

pub mod reload;

pub use reload::{Reload, ReloadEvent, ReloadHandle};

use crate::build::{BuildContext, Job, JobOutput, TaskError};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::BroadcastStream;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// SSE endpoint the client script subscribes to.
pub const EVENTS_PATH: &str = "/__sitepipe/events";
/// URL of the injected client script.
pub const CLIENT_PATH: &str = "/__sitepipe/client.js";

const CLIENT_SCRIPT: &str = include_str!("livereload.js");
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Dev server failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The listener could not bind
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        /// Address from the configuration
        addr: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone)]
struct ServerState {
    root: PathBuf,
    reload: ReloadHandle,
}

/// Build the dev server router for an output tree.
pub fn router(root: PathBuf, reload: ReloadHandle, cors: bool) -> Router {
    let state = ServerState { root, reload };
    let router = Router::new()
        .route(EVENTS_PATH, get(events))
        .route(CLIENT_PATH, get(client_script))
        .fallback(serve_file)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn events(State(state): State<ServerState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(clients = state.reload.client_count() + 1, "live reload client connected");

    let stream = BroadcastStream::new(state.reload.subscribe()).filter_map(|message| async move {
        match message {
            Ok(event) => Some(Ok(Event::default().event(event.name()).data(event.data()))),
            Err(e) => {
                tracing::warn!("live reload stream lagged: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], CLIENT_SCRIPT)
}

async fn serve_file(State(state): State<ServerState>, request: Request) -> Response {
    // HEAD responses carry the file's length and no body
    let inject = *request.method() == Method::GET;
    let service = ServeDir::new(&state.root).append_index_html_on_directories(true);
    let response = match service.oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if !inject || response.status() != StatusCode::OK || !is_html(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let page = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!("failed to read page: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let page = inject_client(&page);
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(page.len()));
    Response::from_parts(parts, Body::from(page))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Insert the live-reload script tag before `</body>`, or append it.
pub fn inject_client(page: &[u8]) -> Vec<u8> {
    let tag = format!("<script src=\"{}\" async></script>", CLIENT_PATH);
    let lower = page.to_ascii_lowercase();
    let position = lower.windows(7).rposition(|w| w == b"</body>").unwrap_or(page.len());

    let mut out = Vec::with_capacity(page.len() + tag.len());
    out.extend_from_slice(&page[..position]);
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&page[position..]);
    out
}

/// Job that starts the dev server.
///
/// Completes once the listener is bound; the server keeps running in the
/// background for the life of the process.
#[derive(Debug, Clone)]
pub struct Serve {
    reload: ReloadHandle,
}

impl Serve {
    /// Create the job.
    pub fn new(reload: ReloadHandle) -> Self {
        Self { reload }
    }
}

#[async_trait]
impl Job for Serve {
    fn name(&self) -> &str {
        "server"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<JobOutput, TaskError> {
        let config = &ctx.config().server;
        let addr = ctx.config().server_addr();
        let listener =
            TcpListener::bind(&addr).await.map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
        let local = listener.local_addr().map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

        let root = ctx.out_dir();
        tracing::info!("Serving {} at http://{}", root.display(), local);

        let app = router(root, self.reload.clone(), config.cors);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("dev server stopped: {}", e);
            }
        });

        Ok(JobOutput::default())
    }
}
