//! Automated judge execution for Verity.
//!
//! An automated judge's [`ExecutionConfig`](verity_core::judge::ExecutionConfig)
//! is turned into a [`JudgeEngine`] once and cached per judge id by
//! [`Engines`]. Invocation is bounded by a caller-supplied timeout; every
//! failure surfaces as an error and never as a verdict.

pub mod engine;
pub mod error;
pub mod fixed;
pub mod keyword;
pub mod ollama;

use std::future::Future;

pub use engine::{Engines, JudgeEngine};
pub use error::{Error, Result};
use serde::{Deserialize, Serialize};
use verity_core::{
  article::ArticleContext,
  assessment::{Label, validate_confidence},
};

/// What a judge is asked to decide.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
  pub topic_definition: &'a str,
  pub text:             &'a str,
  pub context:          &'a ArticleContext,
}

/// A judge's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
  pub label:      Label,
  #[serde(default)]
  pub confidence: Option<f64>,
  #[serde(default)]
  pub rationale:  Option<String>,
}

impl Verdict {
  pub fn new(label: Label, confidence: f64) -> Self {
    Self { label, confidence: Some(confidence), rationale: None }
  }

  pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
    self.rationale = Some(rationale.into());
    self
  }

  /// Reject verdicts that could not be stored.
  pub fn validate(self) -> Result<Self> {
    validate_confidence(self.confidence)
      .map_err(|e| Error::Invocation(format!("judge returned {e}")))?;
    Ok(self)
  }
}

/// Anything that can decide a [`Request`].
pub trait Evaluate: Send + Sync {
  fn evaluate<'a>(
    &'a self,
    request: Request<'a>,
  ) -> impl Future<Output = Result<Verdict>> + Send + 'a;
}
