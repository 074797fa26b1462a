//! [`SqliteStore`], the SQLite implementation of [`RelevanceStore`].

use std::{path::Path, time::Duration};

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, warn};
use uuid::Uuid;
use verity_core::{
  article::{Article, ArticleStatus, ArticleVersion, NewArticle, SourceType},
  assessment::{AssessmentKey, AssessmentQuery, NewAssessment, RelevanceAssessment},
  audit::{Actor, AuditEntry, NewAuditEntry},
  content::Resolved,
  dataset::{Dataset, DatasetEntry, DatasetSpec, DatasetStatus, DatasetVersion, NewDataset},
  idempotency::{Admission, EventKey},
  import::{EventOutcome, ImportBatch, ImportJob, JudgmentEvent, RowError},
  judge::{Judge, JudgeKey, JudgeStatus, NewJudge},
  store::{CreatedDataset, Page, RelevanceStore},
  topic::{NewTopic, Topic, TopicStatus, TopicVersion},
};

use crate::{
  Error, Result, assessments, audit, datasets, entities, ingest, judges,
  schema::{PRAGMAS, SCHEMA, SCHEMA_VERSION},
};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// Attempts per write before a race surfaces as `VersionConflict`.
  pub max_version_retries: u32,
  /// How long a writer waits for the database lock.
  pub busy_timeout:        Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self { max_version_retries: 5, busy_timeout: Duration::from_millis(5_000) }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Verity relevance store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  options: StoreOptions,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, options };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, options: StoreOptions::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let busy_timeout = self.options.busy_timeout;
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(PRAGMAS)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let version: i64 = tx.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if version < SCHEMA_VERSION {
          tx.execute_batch(SCHEMA)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread outside any explicit transaction.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` in one `BEGIN IMMEDIATE` transaction, then append the audit
  /// entries it queued. Busy and unique-key races are retried up to
  /// `max_version_retries` attempts before surfacing as `VersionConflict`.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection, &mut Vec<NewAuditEntry>) -> Result<T> + Clone + Send + 'static,
    T: Send + 'static,
  {
    let max_attempts = self.options.max_version_retries.max(1);
    let mut attempt = 0;
    let (out, entries) = loop {
      attempt += 1;
      let f = f.clone();
      let result = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          let mut entries = Vec::new();
          match f(&tx, &mut entries) {
            Ok(out) => {
              tx.commit()?;
              Ok(Ok((out, entries)))
            }
            Err(e) => Ok(Err(e)),
          }
        })
        .await
        .map_err(Error::from)
        .and_then(|inner| inner);

      match result {
        Ok(done) => break done,
        Err(error) if error.is_retryable() && attempt < max_attempts => {
          debug!(attempt, %error, "write raced, retrying");
          tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
        }
        Err(error) if error.is_retryable() => {
          warn!(attempts = attempt, %error, "write race unresolved, giving up");
          return Err(verity_core::Error::VersionConflict { attempts: attempt }.into());
        }
        Err(error) => return Err(error),
      }
    };

    self.append_audit(entries).await;
    Ok(out)
  }

  /// Post-commit hook: a failed audit write never undoes the committed change.
  async fn append_audit(&self, entries: Vec<NewAuditEntry>) {
    if entries.is_empty() {
      return;
    }
    let count = entries.len();
    if let Err(error) = self.read(move |conn| audit::append(conn, &entries)).await {
      warn!(%error, count, "failed to write audit entries");
    }
  }
}

// ─── RelevanceStore impl ─────────────────────────────────────────────────────

impl RelevanceStore for SqliteStore {
  type Error = Error;

  // ── Articles ──────────────────────────────────────────────────────────────

  async fn upsert_article(&self, input: NewArticle, actor: Actor) -> Result<Resolved<ArticleVersion>> {
    self
      .write(move |conn, audit| entities::upsert_article(conn, audit, &input, &actor))
      .await
  }

  async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
    self.read(move |conn| entities::get_article(conn, id)).await
  }

  async fn find_article(
    &self,
    source_type: SourceType,
    external_key: String,
  ) -> Result<Option<Article>> {
    self
      .read(move |conn| entities::find_article(conn, source_type, &external_key))
      .await
  }

  async fn get_article_version(&self, id: Uuid) -> Result<Option<ArticleVersion>> {
    self.read(move |conn| entities::get_article_version(conn, id)).await
  }

  async fn list_article_versions(&self, article_id: Uuid) -> Result<Vec<ArticleVersion>> {
    self
      .read(move |conn| entities::list_article_versions(conn, article_id))
      .await
  }

  async fn set_article_status(
    &self,
    id: Uuid,
    status: ArticleStatus,
    actor: Actor,
  ) -> Result<Article> {
    self
      .write(move |conn, audit| entities::set_article_status(conn, audit, id, status, &actor))
      .await
  }

  // ── Topics ────────────────────────────────────────────────────────────────

  async fn upsert_topic(&self, input: NewTopic, actor: Actor) -> Result<Resolved<TopicVersion>> {
    self
      .write(move |conn, audit| entities::upsert_topic(conn, audit, &input, &actor))
      .await
  }

  async fn get_topic(&self, id: Uuid) -> Result<Option<Topic>> {
    self.read(move |conn| entities::get_topic(conn, id)).await
  }

  async fn get_topic_version(&self, id: Uuid) -> Result<Option<TopicVersion>> {
    self.read(move |conn| entities::get_topic_version(conn, id)).await
  }

  async fn list_topics(&self) -> Result<Vec<Topic>> { self.read(entities::list_topics).await }

  async fn set_topic_status(&self, id: Uuid, status: TopicStatus, actor: Actor) -> Result<Topic> {
    self
      .write(move |conn, audit| entities::set_topic_status(conn, audit, id, status, &actor))
      .await
  }

  // ── Judges ────────────────────────────────────────────────────────────────

  async fn register_judge(&self, input: NewJudge, actor: Actor) -> Result<Judge> {
    self
      .write(move |conn, audit| judges::register_judge(conn, audit, &input, &actor))
      .await
  }

  async fn get_judge(&self, id: Uuid) -> Result<Option<Judge>> {
    self.read(move |conn| judges::get_judge(conn, id)).await
  }

  async fn resolve_judge(&self, key: JudgeKey) -> Result<Judge> {
    self.read(move |conn| judges::resolve_judge(conn, &key)).await
  }

  async fn set_judge_status(&self, id: Uuid, status: JudgeStatus, actor: Actor) -> Result<Judge> {
    self
      .write(move |conn, audit| judges::set_judge_status(conn, audit, id, status, &actor))
      .await
  }

  // ── Assessments (append-only) ─────────────────────────────────────────────

  async fn record_assessment(
    &self,
    input: NewAssessment,
    actor: Actor,
  ) -> Result<RelevanceAssessment> {
    self
      .write(move |conn, audit| assessments::record(conn, audit, &input, &actor))
      .await
  }

  async fn get_assessment(&self, id: Uuid) -> Result<Option<RelevanceAssessment>> {
    self.read(move |conn| assessments::get(conn, id)).await
  }

  async fn latest_assessment(&self, key: AssessmentKey) -> Result<Option<RelevanceAssessment>> {
    self.read(move |conn| assessments::latest(conn, &key)).await
  }

  async fn assessment_history(&self, key: AssessmentKey) -> Result<Vec<RelevanceAssessment>> {
    self.read(move |conn| assessments::history(conn, &key)).await
  }

  async fn list_assessments(&self, query: AssessmentQuery) -> Result<Page<RelevanceAssessment>> {
    self.read(move |conn| assessments::list(conn, &query)).await
  }

  // ── Datasets ──────────────────────────────────────────────────────────────

  async fn create_dataset(&self, input: NewDataset, actor: Actor) -> Result<CreatedDataset> {
    self
      .write(move |conn, audit| datasets::create_dataset(conn, audit, input, &actor))
      .await
  }

  async fn append_version(
    &self,
    dataset_id: Uuid,
    spec: DatasetSpec,
    actor: Actor,
  ) -> Result<DatasetVersion> {
    self
      .write(move |conn, audit| datasets::append_version(conn, audit, dataset_id, spec, &actor))
      .await
  }

  async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>> {
    self.read(move |conn| datasets::get_dataset(conn, id)).await
  }

  async fn get_dataset_version(&self, id: Uuid) -> Result<Option<DatasetVersion>> {
    self.read(move |conn| datasets::get_version(conn, id)).await
  }

  async fn list_dataset_versions(&self, dataset_id: Uuid) -> Result<Vec<DatasetVersion>> {
    self.read(move |conn| datasets::list_versions(conn, dataset_id)).await
  }

  async fn latest_dataset_version(&self, dataset_id: Uuid) -> Result<Option<DatasetVersion>> {
    self.read(move |conn| datasets::latest_version(conn, dataset_id)).await
  }

  async fn list_entries(&self, version_id: Uuid) -> Result<Vec<DatasetEntry>> {
    self.read(move |conn| datasets::list_entries(conn, version_id)).await
  }

  async fn lineage(&self, version_id: Uuid) -> Result<Vec<DatasetVersion>> {
    self.read(move |conn| datasets::lineage(conn, version_id)).await
  }

  async fn add_entry(
    &self,
    version_id: Uuid,
    article_version_id: Uuid,
    actor: Actor,
  ) -> Result<DatasetEntry> {
    self
      .write(move |conn, audit| {
        datasets::add_entry(conn, audit, version_id, article_version_id, &actor)
      })
      .await
  }

  async fn remove_entry(
    &self,
    version_id: Uuid,
    article_version_id: Uuid,
    actor: Actor,
  ) -> Result<bool> {
    self
      .write(move |conn, audit| {
        datasets::remove_entry(conn, audit, version_id, article_version_id, &actor)
      })
      .await
  }

  async fn set_version_parent(
    &self,
    version_id: Uuid,
    parent_id: Uuid,
    actor: Actor,
  ) -> Result<DatasetVersion> {
    self
      .write(move |conn, audit| {
        datasets::set_version_parent(conn, audit, version_id, parent_id, &actor)
      })
      .await
  }

  async fn freeze_version(&self, version_id: Uuid, actor: Actor) -> Result<DatasetVersion> {
    self
      .write(move |conn, audit| datasets::freeze_version(conn, audit, version_id, &actor))
      .await
  }

  async fn set_dataset_status(
    &self,
    id: Uuid,
    status: DatasetStatus,
    actor: Actor,
  ) -> Result<Dataset> {
    self
      .write(move |conn, audit| datasets::set_dataset_status(conn, audit, id, status, &actor))
      .await
  }

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn admit(&self, key: EventKey) -> Result<Admission> {
    self.write(move |conn, _| ingest::admit(conn, &key)).await
  }

  async fn ingest_event(&self, event: JudgmentEvent, actor: Actor) -> Result<EventOutcome> {
    self
      .write(move |conn, audit| ingest::ingest_event(conn, audit, &event, &actor))
      .await
  }

  async fn create_import_job(&self, total_rows: usize) -> Result<ImportJob> {
    self
      .write(move |conn, _| ingest::create_import_job(conn, total_rows))
      .await
  }

  async fn apply_import(
    &self,
    import_id: Uuid,
    key: EventKey,
    batch: ImportBatch,
    actor: Actor,
  ) -> Result<ImportJob> {
    let applied = self
      .write(move |conn, audit| ingest::apply_import(conn, audit, import_id, &key, &batch, &actor))
      .await;
    match applied {
      Err(Error::Row { row, source }) => {
        warn!(%import_id, row, error = %source, "import row failed, batch rolled back");
        self
          .fail_import(import_id, vec![RowError { row, error: source.to_string() }])
          .await
      }
      other => other,
    }
  }

  async fn fail_import(&self, import_id: Uuid, errors: Vec<RowError>) -> Result<ImportJob> {
    self
      .write(move |conn, _| ingest::fail_import(conn, import_id, errors))
      .await
  }

  async fn get_import_job(&self, id: Uuid) -> Result<Option<ImportJob>> {
    self.read(move |conn| ingest::get_import_job(conn, id)).await
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  async fn audit_trail(&self, entity_type: String, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
    self
      .read(move |conn| audit::trail(conn, &entity_type, entity_id))
      .await
  }
}
