//! Error types for `verity-core`.
//!
//! Every error carries a taxonomy family ([`ErrorKind`]) and a stable string
//! code through [`Classify`], so outer layers can map failures without knowing
//! which backend raised them.

use thiserror::Error;
use uuid::Uuid;

/// Taxonomy family of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  VersionConflict,
  Validation,
  Upstream,
  InvalidStateTransition,
  Internal,
}

/// Classification shared by every error type in the workspace.
pub trait Classify {
  fn kind(&self) -> ErrorKind;

  /// Stable machine-readable code, e.g. `"JUDGE_NOT_FOUND"`.
  fn code(&self) -> &'static str;
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Not found ─────────────────────────────────────────────────────────
  #[error("article not found: {0}")]
  ArticleNotFound(Uuid),

  #[error("article version not found: {0}")]
  ArticleVersionNotFound(Uuid),

  #[error("topic not found: {0}")]
  TopicNotFound(Uuid),

  #[error("topic version not found: {0}")]
  TopicVersionNotFound(Uuid),

  #[error("judge not found: {0}")]
  JudgeNotFound(String),

  #[error("assessment not found: {0}")]
  AssessmentNotFound(Uuid),

  #[error("dataset not found: {0}")]
  DatasetNotFound(Uuid),

  #[error("dataset version not found: {0}")]
  DatasetVersionNotFound(Uuid),

  #[error("import job not found: {0}")]
  ImportNotFound(Uuid),

  // ── Conflicts ─────────────────────────────────────────────────────────
  #[error("judge already registered: {0}")]
  DuplicateJudge(String),

  #[error("judge {0} is inactive")]
  JudgeInactive(Uuid),

  #[error("dataset name already taken: {0:?}")]
  DuplicateDataset(String),

  #[error("dataset version {0} is frozen")]
  DatasetFrozen(Uuid),

  #[error("dataset version {version} cannot take {parent} as parent: lineage would be cyclic")]
  CyclicDatasetLineage { version: Uuid, parent: Uuid },

  #[error("dataset {dataset} is {status}, new versions require an active dataset")]
  DatasetNotActive { dataset: Uuid, status: String },

  #[error("article {0} is deleted")]
  ArticleDeleted(Uuid),

  #[error("topic {0} is archived")]
  TopicArchived(Uuid),

  #[error("topic {topic} is {status}, judgments require an active topic")]
  TopicNotActive { topic: Uuid, status: String },

  #[error("assessment version conflict after {attempts} attempts")]
  VersionConflict { attempts: u32 },

  // ── Validation ────────────────────────────────────────────────────────
  #[error("Invalid label value: '{0}'")]
  InvalidLabel(String),

  #[error("confidence {0} is outside [0, 1]")]
  ConfidenceOutOfRange(f64),

  #[error("invalid dataset spec: {0}")]
  InvalidSpec(String),

  #[error("validation error: {0}")]
  Validation(String),

  #[error("invalid {entity} status transition: {from} -> {to}")]
  InvalidStateTransition {
    entity: &'static str,
    from:   String,
    to:     String,
  },

  // ── Upstream ──────────────────────────────────────────────────────────
  #[error("judge invocation failed: {0}")]
  JudgeInvocationFailed(String),

  #[error("judge invocation timed out after {0} ms")]
  JudgeTimeout(u64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    use Error::*;
    match self {
      ArticleNotFound(_)
      | ArticleVersionNotFound(_)
      | TopicNotFound(_)
      | TopicVersionNotFound(_)
      | JudgeNotFound(_)
      | AssessmentNotFound(_)
      | DatasetNotFound(_)
      | DatasetVersionNotFound(_)
      | ImportNotFound(_) => ErrorKind::NotFound,
      DuplicateJudge(_)
      | JudgeInactive(_)
      | DuplicateDataset(_)
      | DatasetFrozen(_)
      | CyclicDatasetLineage { .. }
      | DatasetNotActive { .. }
      | ArticleDeleted(_)
      | TopicArchived(_)
      | TopicNotActive { .. } => ErrorKind::Conflict,
      VersionConflict { .. } => ErrorKind::VersionConflict,
      InvalidLabel(_) | ConfidenceOutOfRange(_) | InvalidSpec(_) | Validation(_) => {
        ErrorKind::Validation
      }
      InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
      JudgeInvocationFailed(_) | JudgeTimeout(_) => ErrorKind::Upstream,
      Serialization(_) => ErrorKind::Internal,
    }
  }

  fn code(&self) -> &'static str {
    use Error::*;
    match self {
      ArticleNotFound(_) => "ARTICLE_NOT_FOUND",
      ArticleVersionNotFound(_) => "ARTICLE_VERSION_NOT_FOUND",
      TopicNotFound(_) => "TOPIC_NOT_FOUND",
      TopicVersionNotFound(_) => "TOPIC_VERSION_NOT_FOUND",
      JudgeNotFound(_) => "JUDGE_NOT_FOUND",
      AssessmentNotFound(_) => "ASSESSMENT_NOT_FOUND",
      DatasetNotFound(_) => "DATASET_NOT_FOUND",
      DatasetVersionNotFound(_) => "DATASET_VERSION_NOT_FOUND",
      ImportNotFound(_) => "IMPORT_NOT_FOUND",
      DuplicateJudge(_) => "DUPLICATE_JUDGE",
      JudgeInactive(_) => "JUDGE_INACTIVE",
      DuplicateDataset(_) => "DUPLICATE_DATASET",
      DatasetFrozen(_) => "DATASET_FROZEN",
      CyclicDatasetLineage { .. } => "CYCLIC_DATASET_LINEAGE",
      DatasetNotActive { .. } => "DATASET_NOT_ACTIVE",
      ArticleDeleted(_) => "ARTICLE_DELETED",
      TopicArchived(_) => "TOPIC_ARCHIVED",
      TopicNotActive { .. } => "TOPIC_NOT_ACTIVE",
      VersionConflict { .. } => "VERSION_CONFLICT",
      InvalidLabel(_) => "INVALID_LABEL",
      ConfidenceOutOfRange(_) => "CONFIDENCE_OUT_OF_RANGE",
      InvalidSpec(_) => "INVALID_SPEC",
      Validation(_) => "VALIDATION_ERROR",
      InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
      JudgeInvocationFailed(_) => "JUDGE_INVOCATION_FAILED",
      JudgeTimeout(_) => "JUDGE_TIMEOUT",
      Serialization(_) => "INTERNAL_ERROR",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
