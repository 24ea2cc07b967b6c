use crate::db::Post;
use crate::error::PostsyncError;
use crate::ingest::{IngestionController, StatusSnapshot};

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode, Version},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn generate_request_id() -> String {
    format!("req-{:08x}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct PostsyncState {
    pub controller: IngestionController,
}

impl PostsyncState {
    pub fn new(controller: IngestionController) -> Self {
        Self { controller }
    }
}

/// Start a cycle now. 202 when started, 409 `BUSY` when one is already running.
async fn start_cycle_handler(State(state): State<PostsyncState>) -> Result<StatusCode, PostsyncError> {
    state.controller.start_cycle()?;
    Ok(StatusCode::ACCEPTED)
}

async fn status_handler(State(state): State<PostsyncState>) -> Json<StatusSnapshot> {
    Json(state.controller.status())
}

async fn posts_handler(State(state): State<PostsyncState>) -> Result<Json<Vec<Post>>, PostsyncError> {
    let posts = state.controller.store().read_all().await?;
    Ok(Json(posts))
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let path = uri.path();
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms
        );
    }

    resp
}

pub fn postsync_router(state: PostsyncState) -> Router {
    Router::new()
        .route("/cycles", post(start_cycle_handler))
        .route("/status", get(status_handler))
        .route("/posts", get(posts_handler))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}
