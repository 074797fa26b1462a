//! The `RelevanceStore` trait and supporting result types.
//!
//! The trait is implemented by storage backends (e.g. `verity-store-sqlite`).
//! Higher layers (`verity-api`, `verity-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Classify,
  article::{Article, ArticleStatus, ArticleVersion, NewArticle, SourceType},
  assessment::{AssessmentKey, AssessmentQuery, NewAssessment, RelevanceAssessment},
  audit::{Actor, AuditEntry},
  content::Resolved,
  dataset::{Dataset, DatasetEntry, DatasetSpec, DatasetStatus, DatasetVersion, NewDataset},
  idempotency::{Admission, EventKey},
  import::{EventOutcome, ImportBatch, ImportJob, JudgmentEvent, RowError},
  judge::{Judge, JudgeKey, JudgeStatus, NewJudge},
  topic::{NewTopic, Topic, TopicStatus, TopicVersion},
};

// ─── Result types ────────────────────────────────────────────────────────────

/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:  Vec<T>,
  /// Total number of matches, ignoring `limit` and `offset`.
  pub total:  u64,
  pub limit:  usize,
  pub offset: usize,
}

/// A dataset created together with its first version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedDataset {
  pub dataset: Dataset,
  pub version: DatasetVersion,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Verity relevance store backend.
///
/// Every mutation runs in a single atomic transaction; audit entries are
/// appended after it commits. Assessments and audit entries are append-only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RelevanceStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Articles ──────────────────────────────────────────────────────────

  /// Resolve `input` to an article version, creating the article and/or the
  /// version as needed, and point the article's latest version at it.
  fn upsert_article(
    &self,
    input: NewArticle,
    actor: Actor,
  ) -> impl Future<Output = Result<Resolved<ArticleVersion>, Self::Error>> + Send + '_;

  fn get_article(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Article>, Self::Error>> + Send + '_;

  /// Look an article up by its `(source_type, external_key)` identity.
  fn find_article(
    &self,
    source_type: SourceType,
    external_key: String,
  ) -> impl Future<Output = Result<Option<Article>, Self::Error>> + Send + '_;

  fn get_article_version(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ArticleVersion>, Self::Error>> + Send + '_;

  /// All versions of an article, oldest first.
  fn list_article_versions(
    &self,
    article_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ArticleVersion>, Self::Error>> + Send + '_;

  fn set_article_status(
    &self,
    id: Uuid,
    status: ArticleStatus,
    actor: Actor,
  ) -> impl Future<Output = Result<Article, Self::Error>> + Send + '_;

  // ── Topics ────────────────────────────────────────────────────────────

  /// Resolve a topic definition by `key`. Fails with `TopicArchived` when the
  /// topic exists and is archived.
  fn upsert_topic(
    &self,
    input: NewTopic,
    actor: Actor,
  ) -> impl Future<Output = Result<Resolved<TopicVersion>, Self::Error>> + Send + '_;

  fn get_topic(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send + '_;

  fn get_topic_version(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<TopicVersion>, Self::Error>> + Send + '_;

  fn list_topics(&self) -> impl Future<Output = Result<Vec<Topic>, Self::Error>> + Send + '_;

  fn set_topic_status(
    &self,
    id: Uuid,
    status: TopicStatus,
    actor: Actor,
  ) -> impl Future<Output = Result<Topic, Self::Error>> + Send + '_;

  // ── Judges ────────────────────────────────────────────────────────────

  fn register_judge(
    &self,
    input: NewJudge,
    actor: Actor,
  ) -> impl Future<Output = Result<Judge, Self::Error>> + Send + '_;

  fn get_judge(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Judge>, Self::Error>> + Send + '_;

  /// Resolve a key to an active judge. Fails with `JudgeNotFound` or
  /// `JudgeInactive`; never falls back to another judge.
  fn resolve_judge(
    &self,
    key: JudgeKey,
  ) -> impl Future<Output = Result<Judge, Self::Error>> + Send + '_;

  fn set_judge_status(
    &self,
    id: Uuid,
    status: JudgeStatus,
    actor: Actor,
  ) -> impl Future<Output = Result<Judge, Self::Error>> + Send + '_;

  // ── Assessments (append-only) ─────────────────────────────────────────

  /// Append the next version of the assessment chain for `input.key`.
  fn record_assessment(
    &self,
    input: NewAssessment,
    actor: Actor,
  ) -> impl Future<Output = Result<RelevanceAssessment, Self::Error>> + Send + '_;

  fn get_assessment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RelevanceAssessment>, Self::Error>> + Send + '_;

  fn latest_assessment(
    &self,
    key: AssessmentKey,
  ) -> impl Future<Output = Result<Option<RelevanceAssessment>, Self::Error>> + Send + '_;

  /// The whole chain for `key`, ascending by version.
  fn assessment_history(
    &self,
    key: AssessmentKey,
  ) -> impl Future<Output = Result<Vec<RelevanceAssessment>, Self::Error>> + Send + '_;

  fn list_assessments(
    &self,
    query: AssessmentQuery,
  ) -> impl Future<Output = Result<Page<RelevanceAssessment>, Self::Error>> + Send + '_;

  // ── Datasets ──────────────────────────────────────────────────────────

  /// Create a dataset and materialize its first version from `input.spec`.
  fn create_dataset(
    &self,
    input: NewDataset,
    actor: Actor,
  ) -> impl Future<Output = Result<CreatedDataset, Self::Error>> + Send + '_;

  /// Materialize a new version of an active dataset.
  fn append_version(
    &self,
    dataset_id: Uuid,
    spec: DatasetSpec,
    actor: Actor,
  ) -> impl Future<Output = Result<DatasetVersion, Self::Error>> + Send + '_;

  fn get_dataset(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Dataset>, Self::Error>> + Send + '_;

  fn get_dataset_version(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<DatasetVersion>, Self::Error>> + Send + '_;

  /// Versions of a dataset, ascending by version number.
  fn list_dataset_versions(
    &self,
    dataset_id: Uuid,
  ) -> impl Future<Output = Result<Vec<DatasetVersion>, Self::Error>> + Send + '_;

  /// The version with the highest version number.
  fn latest_dataset_version(
    &self,
    dataset_id: Uuid,
  ) -> impl Future<Output = Result<Option<DatasetVersion>, Self::Error>> + Send + '_;

  /// Entries of a version in materialized order.
  fn list_entries(
    &self,
    version_id: Uuid,
  ) -> impl Future<Output = Result<Vec<DatasetEntry>, Self::Error>> + Send + '_;

  /// Ancestors of a version, nearest first.
  fn lineage(
    &self,
    version_id: Uuid,
  ) -> impl Future<Output = Result<Vec<DatasetVersion>, Self::Error>> + Send + '_;

  /// Add an entry to an unfrozen version. Adding an existing member is a
  /// no-op that returns the existing entry.
  fn add_entry(
    &self,
    version_id: Uuid,
    article_version_id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<DatasetEntry, Self::Error>> + Send + '_;

  /// Remove an entry from an unfrozen version. Returns whether it existed.
  fn remove_entry(
    &self,
    version_id: Uuid,
    article_version_id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Re-parent an unfrozen derived version after a lineage cycle check.
  fn set_version_parent(
    &self,
    version_id: Uuid,
    parent_id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<DatasetVersion, Self::Error>> + Send + '_;

  /// Freeze a version and move its dataset to `frozen`. Idempotent.
  fn freeze_version(
    &self,
    version_id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<DatasetVersion, Self::Error>> + Send + '_;

  fn set_dataset_status(
    &self,
    id: Uuid,
    status: DatasetStatus,
    actor: Actor,
  ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send + '_;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Admit an event key on its own.
  fn admit(
    &self,
    key: EventKey,
  ) -> impl Future<Output = Result<Admission, Self::Error>> + Send + '_;

  /// Admit an event and apply its effects in one transaction.
  fn ingest_event(
    &self,
    event: JudgmentEvent,
    actor: Actor,
  ) -> impl Future<Output = Result<EventOutcome, Self::Error>> + Send + '_;

  fn create_import_job(
    &self,
    total_rows: usize,
  ) -> impl Future<Output = Result<ImportJob, Self::Error>> + Send + '_;

  /// Admit `key` and apply every row of `batch` in one transaction. The job
  /// ends `completed`, or `duplicate` when the key was already admitted. When
  /// a row cannot be applied the transaction rolls back and the job ends
  /// `failed` with that row's error.
  fn apply_import(
    &self,
    import_id: Uuid,
    key: EventKey,
    batch: ImportBatch,
    actor: Actor,
  ) -> impl Future<Output = Result<ImportJob, Self::Error>> + Send + '_;

  /// Mark a job `failed` with its row errors. Nothing of the batch persists.
  fn fail_import(
    &self,
    import_id: Uuid,
    errors: Vec<RowError>,
  ) -> impl Future<Output = Result<ImportJob, Self::Error>> + Send + '_;

  fn get_import_job(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ImportJob>, Self::Error>> + Send + '_;

  // ── Audit ─────────────────────────────────────────────────────────────

  /// Audit entries for one entity, oldest first.
  fn audit_trail(
    &self,
    entity_type: String,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;
}
