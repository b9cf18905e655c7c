//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use super::forward::Forwarder;

/// Shared application state
pub struct AppState {
    /// Forwarder bound to the resolved backend
    pub forwarder: Forwarder,
    /// Mount prefix without trailing slash (`""` when mounted at the root)
    pub mount: String,
}

impl AppState {
    /// Create state for a forwarder mounted under `mount`
    pub fn new(forwarder: Forwarder, mount: &str) -> Self {
        Self {
            forwarder,
            mount: normalize_mount(mount),
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mount = state.mount.clone();

    let router = Router::new().route("/health", get(health_handler));
    let router = if mount.is_empty() {
        router
            .route("/", proxy_methods())
            .route("/{*path}", proxy_methods())
    } else {
        router
            .route(&mount, proxy_methods())
            .route(&format!("{mount}/"), proxy_methods())
            .route(&format!("{mount}/{{*path}}"), proxy_methods())
    };

    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET (and HEAD), POST, PUT, PATCH, DELETE and OPTIONS are forwarded
fn proxy_methods() -> MethodRouter<Arc<AppState>> {
    get(proxy_handler)
        .post(proxy_handler)
        .put(proxy_handler)
        .patch(proxy_handler)
        .delete(proxy_handler)
        .options(proxy_handler)
}

/// Any method below the mount prefix
async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let segments = path_segments(&state.mount, &path);
    state.forwarder.forward(request, &segments).await
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Non-empty path segments below `mount`, still percent-encoded
fn path_segments<'a>(mount: &str, path: &'a str) -> Vec<&'a str> {
    path.strip_prefix(mount)
        .unwrap_or_default()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn normalize_mount(mount: &str) -> String {
    let trimmed = mount.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
