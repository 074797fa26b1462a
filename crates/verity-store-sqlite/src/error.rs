//! Error type for `verity-store-sqlite`.

use rusqlite::ffi;
use thiserror::Error;
use verity_core::{Classify, ErrorKind};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] verity_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A batch row could not be applied. `row` is 1-based, header excluded.
  #[error("row {row}: {source}")]
  Row { row: usize, source: Box<Error> },

  /// A column held a value outside its enum's vocabulary.
  #[error("unexpected {column} value: {value:?}")]
  Decode { column: &'static str, value: String },
}

impl Error {
  fn sqlite(&self) -> Option<&rusqlite::Error> {
    match self {
      Error::Sqlite(e) | Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => Some(e),
      Error::Row { source, .. } => source.sqlite(),
      _ => None,
    }
  }

  fn sqlite_failure(&self) -> Option<ffi::Error> {
    match self.sqlite()? {
      rusqlite::Error::SqliteFailure(e, _) => Some(*e),
      _ => None,
    }
  }

  /// Busy/locked database and unique-key races: the class the assessment
  /// versioner retries.
  pub fn is_retryable(&self) -> bool {
    match self.sqlite_failure() {
      Some(e) => {
        matches!(e.code, ffi::ErrorCode::DatabaseBusy | ffi::ErrorCode::DatabaseLocked)
          || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
          || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
      }
      None => false,
    }
  }

  fn is_constraint(&self) -> bool {
    self
      .sqlite_failure()
      .is_some_and(|e| e.code == ffi::ErrorCode::ConstraintViolation)
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Row { source, .. } => source.kind(),
      _ if self.is_constraint() => ErrorKind::Conflict,
      _ => ErrorKind::Internal,
    }
  }

  fn code(&self) -> &'static str {
    match self {
      Error::Core(e) => e.code(),
      Error::Row { source, .. } => source.code(),
      _ if self.is_constraint() => "CONFLICT",
      _ => "INTERNAL_ERROR",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
