use crate::AppState;
use crate::error::{AppError, ErrorResponse};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_macros::debug_handler;
use ddtrack_core::{TickOutcome, TrackerStatus};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    tracked_players: usize,
    active_notifications: usize,
    channel: Option<String>,
    last_tick_at: Option<i64>,
    last_outcome: Option<TickOutcome>,
    consecutive_source_failures: u32,
    source_reachable: bool,
}

impl From<&TrackerStatus> for StatusResponse {
    fn from(status: &TrackerStatus) -> Self {
        Self {
            tracked_players: status.tracked_players,
            active_notifications: status.active_notifications,
            // Discord snowflakes overflow JS numbers
            channel: status.channel.map(|c| c.to_string()),
            last_tick_at: status.last_tick_at,
            last_outcome: status.last_outcome.clone(),
            consecutive_source_failures: status.consecutive_source_failures,
            source_reachable: status.source_reachable(),
        }
    }
}

pub(crate) async fn health() -> StatusCode {
    StatusCode::OK
}

#[debug_handler]
pub(crate) async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let status = state.status.borrow().clone();
    if status.last_tick_at.is_none() {
        return Err(AppError::NotReady);
    }
    Ok(Json(StatusResponse::from(&status)))
}

pub(crate) async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Not found")))
}
