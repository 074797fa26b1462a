//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as
//! `{"error": {"code": "...", "message": "...", "details": ...}}`.

use std::fmt::Display;

use axum::{
  Json,
  extract::{
    multipart::{MultipartError, MultipartRejection},
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use verity_core::{Classify, ErrorKind};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// A classified error raised below the API (store, judge, CSV, domain).
  #[error("{message}")]
  Classified {
    kind:    ErrorKind,
    code:    &'static str,
    message: String,
  },

  /// The request could not be extracted at all.
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  pub fn classified<E: Classify + Display>(e: &E) -> Self {
    Self::Classified {
      kind:    e.kind(),
      code:    e.code(),
      message: e.to_string(),
    }
  }

  /// Adapter for `map_err` on store results.
  pub fn store<E: Classify + Display>(e: E) -> Self { Self::classified(&e) }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::Classified {
      kind:    ErrorKind::Validation,
      code:    "VALIDATION_ERROR",
      message: message.into(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Classified { kind, code, .. } => match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::VersionConflict | ErrorKind::InvalidStateTransition => {
          StatusCode::CONFLICT
        }
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Upstream if *code == "JUDGE_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      Self::BadRequest(_) => "BAD_REQUEST",
      Self::Classified { code, .. } => *code,
    }
  }
}

impl From<verity_core::Error> for ApiError {
  fn from(e: verity_core::Error) -> Self { Self::classified(&e) }
}

impl From<verity_judge::Error> for ApiError {
  fn from(e: verity_judge::Error) -> Self { Self::classified(&e) }
}

impl From<verity_csv::Error> for ApiError {
  fn from(e: verity_csv::Error) -> Self { Self::classified(&e) }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    match e {
      // Well-formed JSON that does not fit the body type.
      JsonRejection::JsonDataError(e) => Self::validation(e.body_text()),
      other => Self::BadRequest(other.body_text()),
    }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<MultipartError> for ApiError {
  fn from(e: MultipartError) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<MultipartRejection> for ApiError {
  fn from(e: MultipartRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let code = self.code();
    let message = match self {
      Self::Classified { kind: ErrorKind::Internal, message, .. } => {
        tracing::error!(code, %message, "internal error");
        "internal error".to_owned()
      }
      Self::Classified { message, .. } | Self::BadRequest(message) => message,
    };
    let body = json!({ "error": { "code": code, "message": message, "details": Value::Null } });
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn status_follows_error_family() {
    let cases = [
      (verity_core::Error::JudgeNotFound("x".into()), StatusCode::NOT_FOUND),
      (verity_core::Error::DatasetFrozen(Uuid::nil()), StatusCode::CONFLICT),
      (verity_core::Error::JudgeInactive(Uuid::nil()), StatusCode::CONFLICT),
      (verity_core::Error::VersionConflict { attempts: 5 }, StatusCode::CONFLICT),
      (verity_core::Error::InvalidSpec("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
      (verity_core::Error::JudgeTimeout(10), StatusCode::GATEWAY_TIMEOUT),
      (verity_core::Error::JudgeInvocationFailed("x".into()), StatusCode::BAD_GATEWAY),
    ];
    for (error, status) in cases {
      assert_eq!(ApiError::from(error).status(), status);
    }
  }

  #[test]
  fn judge_errors_keep_their_codes() {
    let e = ApiError::from(verity_judge::Error::Timeout(250));
    assert_eq!(e.code(), "JUDGE_TIMEOUT");
    assert_eq!(e.status(), StatusCode::GATEWAY_TIMEOUT);
  }
}
