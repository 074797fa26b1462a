//! Batch and event ingestion payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{article::NewArticle, assessment::Label};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImportStatus {
  Processing,
  Completed,
  Failed,
  /// The same upload was already applied.
  Duplicate,
}

impl ImportStatus {
  pub fn is_terminal(self) -> bool { self != ImportStatus::Processing }
}

/// A validation failure on one data row (1-based, header excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
  pub row:   usize,
  pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
  pub import_id:      Uuid,
  pub status:         ImportStatus,
  pub total_rows:     usize,
  pub processed_rows: usize,
  pub errors:         Vec<RowError>,
  pub created_at:     DateTime<Utc>,
  pub finished_at:    Option<DateTime<Utc>>,
}

/// One validated row of a batch.
#[derive(Debug, Clone)]
pub struct ImportRow {
  pub article:    NewArticle,
  pub label:      Label,
  pub confidence: Option<f64>,
  pub rationale:  Option<String>,
}

/// A fully validated batch, applied in one transaction.
#[derive(Debug, Clone)]
pub struct ImportBatch {
  pub topic_id: Uuid,
  pub judge_id: Uuid,
  pub rows:     Vec<ImportRow>,
}

/// An externally delivered judgment, e.g. from a webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentEvent {
  /// Caller-supplied delivery id; redeliveries carry the same id.
  pub event_id:   String,
  pub topic_id:   Uuid,
  pub judge_id:   Uuid,
  pub article:    NewArticle,
  pub label:      Label,
  #[serde(default)]
  pub confidence: Option<f64>,
  #[serde(default)]
  pub rationale:  Option<String>,
}

/// Result of ingesting a [`JudgmentEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventOutcome {
  Accepted { assessment_id: Uuid },
  Duplicate,
}
