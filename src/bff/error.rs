use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure while proxying a request.
///
/// Every variant becomes the same opaque 500; the cause only reaches the log.
#[derive(Error, Debug)]
pub enum BffError {
  #[error("upstream request failed: {0}")]
  Upstream(#[from] reqwest::Error),

  #[error("upstream returned invalid JSON: {0}")]
  InvalidBody(#[from] serde_json::Error),

  #[error("invalid upstream path: {0}")]
  Url(#[from] url::ParseError),

  #[error("failed to build response: {0}")]
  Response(#[from] axum::http::Error),
}

impl IntoResponse for BffError {
  fn into_response(self) -> Response {
    error!("{}", self);
    (
      StatusCode::INTERNAL_SERVER_ERROR,
      Json(json!({ "message": "Internal Server Error" })),
    )
      .into_response()
  }
}
