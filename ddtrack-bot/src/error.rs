use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: None,
    }
  }

  pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: Some(details.into()),
    }
  }
}

/// Status API error type
#[derive(Debug)]
pub enum AppError {
  /// The tracker has not finished its first tick yet.
  NotReady,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::NotReady => {
        tracing::debug!("status requested before the first tick");
        let error_response = ErrorResponse::with_details(
          "Tracker is starting",
          "No polling tick has completed yet. Try again in a few seconds.",
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(error_response)).into_response()
      }
    }
  }
}

/// Errors reading or writing the watch file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("watch file io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("watch file is not valid json: {0}")]
  Json(#[from] serde_json::Error),
}
