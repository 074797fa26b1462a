//! Error types for the verity-csv codec.

use thiserror::Error;
use verity_core::{Classify, ErrorKind};

/// File-level failures. Problems confined to one data row are reported as
/// [`RowError`](verity_core::import::RowError)s instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("CSV file has no header row")]
  MissingHeader,

  #[error("column '{column}' for field '{field}' not found in header")]
  MissingColumn { field: &'static str, column: String },

  #[error("invalid column mapping: {0}")]
  InvalidMapping(String),

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind { ErrorKind::Validation }

  fn code(&self) -> &'static str { "VALIDATION_ERROR" }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
