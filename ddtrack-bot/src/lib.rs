pub mod config;
pub mod discord;
mod error;
pub mod helpers;
pub mod poller;
pub mod render;
mod routes;
pub mod source;
pub mod store;

pub use error::StoreError;
pub use render::RenderError;

use axum::{Router, http::StatusCode, routing::get};
use ddtrack_core::TrackerStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    /// Latest tracker status, published by the poller after every tick.
    pub status: watch::Receiver<TrackerStatus>,
}

/// Create the status API router
pub fn create_app(
    status: watch::Receiver<TrackerStatus>,
    request_body_limit: usize,
    request_timeout: Duration,
) -> Router {
    let state = Arc::new(AppState { status });

    Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::status))
        .fallback(routes::not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(request_body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
