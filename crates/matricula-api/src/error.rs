//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use matricula_coordinator::EnrollmentOutcome;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
///
/// Rendered as an [`EnrollmentOutcome`] failure body:
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Coordinator(#[from] matricula_coordinator::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Coordinator(e) if e.is_validation() => StatusCode::BAD_REQUEST,
      ApiError::Coordinator(e) if e.is_not_found() => StatusCode::NOT_FOUND,
      ApiError::Coordinator(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<matricula_core::ValidationError> for ApiError {
  fn from(e: matricula_core::ValidationError) -> Self { Self::Coordinator(e.into()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    }
    let body = match &self {
      ApiError::Coordinator(e) => EnrollmentOutcome::failed(e),
      other => EnrollmentOutcome::rejected(other.to_string()),
    };
    (status, Json(body)).into_response()
  }
}
