//! Idempotent ingestion: event admission, webhook events and CSV batches.

use rusqlite::{Connection, OptionalExtension as _};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  assessment::{AssessmentKey, NewAssessment},
  audit::{Actor, NewAuditEntry},
  idempotency::{Admission, EventKey},
  import::{
    EventOutcome, ImportBatch, ImportJob, ImportRow, ImportStatus, JudgmentEvent, RowError,
  },
  topic::Topic,
};

use crate::{
  Error, Result, assessments,
  encode::{RawImportJob, encode_dt, encode_uuid, now},
  entities,
};

/// Conditionally insert the key. Inside a transaction the admission is undone
/// with everything else when the transaction rolls back.
pub fn admit(conn: &Connection, key: &EventKey) -> Result<Admission> {
  let inserted = conn.execute(
    "INSERT INTO idempotency_keys (event_key, admitted_at) VALUES (?1, ?2)
     ON CONFLICT (event_key) DO NOTHING",
    rusqlite::params![key.as_str(), encode_dt(now())],
  )?;
  Ok(if inserted == 1 { Admission::Accepted } else { Admission::Duplicate })
}

fn require_topic(conn: &Connection, id: Uuid) -> Result<Topic> {
  Ok(entities::get_topic(conn, id)?.ok_or(CoreError::TopicNotFound(id))?)
}

pub fn ingest_event(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  event: &JudgmentEvent,
  actor: &Actor,
) -> Result<EventOutcome> {
  let key = EventKey::webhook(&event.event_id)?;
  if admit(conn, &key)? == Admission::Duplicate {
    return Ok(EventOutcome::Duplicate);
  }

  let topic = require_topic(conn, event.topic_id)?;
  let article = entities::upsert_article(conn, audit, &event.article, actor)?;
  let assessment = assessments::record(
    conn,
    audit,
    &NewAssessment {
      key:        AssessmentKey {
        judge_id:           event.judge_id,
        topic_version_id:   topic.latest_version_id,
        article_version_id: article.value.version_id,
      },
      label:      event.label,
      confidence: event.confidence,
      rationale:  event.rationale.clone(),
    },
    actor,
  )?;
  Ok(EventOutcome::Accepted { assessment_id: assessment.assessment_id })
}

// ─── Import jobs ─────────────────────────────────────────────────────────────

pub fn get_import_job(conn: &Connection, id: Uuid) -> Result<Option<ImportJob>> {
  let sql = format!("SELECT {} FROM import_jobs WHERE import_id = ?1", RawImportJob::COLUMNS);
  conn
    .query_row(&sql, [encode_uuid(id)], RawImportJob::from_row)
    .optional()?
    .map(RawImportJob::into_job)
    .transpose()
}

fn require_job(conn: &Connection, id: Uuid) -> Result<ImportJob> {
  Ok(get_import_job(conn, id)?.ok_or(CoreError::ImportNotFound(id))?)
}

pub fn create_import_job(conn: &Connection, total_rows: usize) -> Result<ImportJob> {
  let job = ImportJob {
    import_id:      Uuid::new_v4(),
    status:         ImportStatus::Processing,
    total_rows,
    processed_rows: 0,
    errors:         Vec::new(),
    created_at:     now(),
    finished_at:    None,
  };
  conn.execute(
    "INSERT INTO import_jobs (import_id, status, total_rows, processed_rows, errors, created_at)
     VALUES (?1, ?2, ?3, 0, '[]', ?4)",
    rusqlite::params![
      encode_uuid(job.import_id),
      job.status.as_ref(),
      total_rows as i64,
      encode_dt(job.created_at),
    ],
  )?;
  Ok(job)
}

fn finish_job(
  conn: &Connection,
  job: ImportJob,
  status: ImportStatus,
  processed_rows: usize,
  errors: Vec<RowError>,
) -> Result<ImportJob> {
  if job.status.is_terminal() {
    return Err(
      CoreError::InvalidStateTransition {
        entity: "import",
        from:   job.status.as_ref().to_owned(),
        to:     status.as_ref().to_owned(),
      }
      .into(),
    );
  }
  let finished_at = now();
  conn.execute(
    "UPDATE import_jobs
     SET status = ?2, processed_rows = ?3, errors = ?4, finished_at = ?5
     WHERE import_id = ?1",
    rusqlite::params![
      encode_uuid(job.import_id),
      status.as_ref(),
      processed_rows as i64,
      serde_json::to_string(&errors)?,
      encode_dt(finished_at),
    ],
  )?;
  Ok(ImportJob { status, processed_rows, errors, finished_at: Some(finished_at), ..job })
}

fn apply_row(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  topic: &Topic,
  judge_id: Uuid,
  row: &ImportRow,
  actor: &Actor,
) -> Result<()> {
  let article = entities::upsert_article(conn, audit, &row.article, actor)?;
  assessments::record(
    conn,
    audit,
    &NewAssessment {
      key:        AssessmentKey {
        judge_id,
        topic_version_id:   topic.latest_version_id,
        article_version_id: article.value.version_id,
      },
      label:      row.label,
      confidence: row.confidence,
      rationale:  row.rationale.clone(),
    },
    actor,
  )?;
  Ok(())
}

/// Apply a validated batch. Every row commits, or none does. A row that
/// cannot be applied fails with [`Error::Row`] carrying its 1-based index.
pub fn apply_import(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  import_id: Uuid,
  key: &EventKey,
  batch: &ImportBatch,
  actor: &Actor,
) -> Result<ImportJob> {
  let job = require_job(conn, import_id)?;
  if admit(conn, key)? == Admission::Duplicate {
    info!(%import_id, key = %key, "csv batch already imported");
    return finish_job(conn, job, ImportStatus::Duplicate, 0, Vec::new());
  }

  let topic = require_topic(conn, batch.topic_id)?;
  for (index, row) in batch.rows.iter().enumerate() {
    apply_row(conn, audit, &topic, batch.judge_id, row, actor)
      .map_err(|source| Error::Row { row: index + 1, source: Box::new(source) })?;
  }

  let job = finish_job(conn, job, ImportStatus::Completed, batch.rows.len(), Vec::new())?;
  audit.push(NewAuditEntry::new(
    "import",
    import_id,
    "completed",
    actor,
    json!({ "rows": job.processed_rows, "topic_id": batch.topic_id, "judge_id": batch.judge_id }),
  ));
  info!(%import_id, rows = job.processed_rows, "csv import completed");
  Ok(job)
}

pub fn fail_import(conn: &Connection, import_id: Uuid, errors: Vec<RowError>) -> Result<ImportJob> {
  let job = require_job(conn, import_id)?;
  finish_job(conn, job, ImportStatus::Failed, 0, errors)
}
