//! Error types for judge execution.

use thiserror::Error;
use uuid::Uuid;
use verity_core::{Classify, ErrorKind};

#[derive(Debug, Error)]
pub enum Error {
  #[error("judge {0} is human and cannot be invoked")]
  NotInvocable(Uuid),

  #[error("invalid keyword vocabulary: {0}")]
  Vocabulary(#[from] regex::Error),

  #[error("invalid execution config: {0}")]
  Config(#[from] verity_core::Error),

  #[error("judge invocation failed: {0}")]
  Invocation(String),

  #[error("judge timed out after {0} ms")]
  Timeout(u64),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::NotInvocable(_) | Self::Vocabulary(_) => ErrorKind::Validation,
      Self::Config(e) => e.kind(),
      Self::Invocation(_) | Self::Timeout(_) | Self::Http(_) => ErrorKind::Upstream,
    }
  }

  fn code(&self) -> &'static str {
    match self {
      Self::NotInvocable(_) | Self::Vocabulary(_) => "VALIDATION_ERROR",
      Self::Config(e) => e.code(),
      Self::Invocation(_) | Self::Http(_) => "JUDGE_INVOCATION_FAILED",
      Self::Timeout(_) => "JUDGE_TIMEOUT",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
