use reqwest::StatusCode;
use thiserror::Error;

/// Generic message for failures that never reached a usable response.
pub const GENERIC_FAILURE: &str = "API request failed";

/// Uniform failure surfaced by the typed client.
///
/// `Display` is always the user-facing message. Transport and decoding
/// problems carry only the generic message; their cause is logged where
/// they happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
  #[error("{message}")]
  NotFound { message: String },

  #[error("{message}")]
  Status { status: StatusCode, message: String },

  #[error("{message}")]
  Transport { message: String },

  #[error("{message}")]
  Decode { message: String },
}

impl ApiError {
  pub fn transport() -> Self {
    ApiError::Transport {
      message: GENERIC_FAILURE.to_string(),
    }
  }

  pub fn decode() -> Self {
    ApiError::Decode {
      message: GENERIC_FAILURE.to_string(),
    }
  }

  /// Build the error for a non-2xx response, preferring the body's `message`.
  pub fn from_response(status: StatusCode, message: Option<String>) -> Self {
    let message = message.filter(|m| !m.is_empty()).unwrap_or_else(|| {
      format!(
        "{}: {}",
        GENERIC_FAILURE,
        status.canonical_reason().unwrap_or("Unknown Status")
      )
    });

    if status == StatusCode::NOT_FOUND {
      ApiError::NotFound { message }
    } else {
      ApiError::Status { status, message }
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }

  pub fn status(&self) -> Option<StatusCode> {
    match self {
      ApiError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
      ApiError::Status { status, .. } => Some(*status),
      ApiError::Transport { .. } | ApiError::Decode { .. } => None,
    }
  }

  pub fn message(&self) -> &str {
    match self {
      ApiError::NotFound { message }
      | ApiError::Status { message, .. }
      | ApiError::Transport { message }
      | ApiError::Decode { message } => message,
    }
  }
}
