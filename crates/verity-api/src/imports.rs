//! Handlers for CSV batch imports.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/v1/import/csv` | Multipart: `file`, `mapping` (JSON, optional), `topic_id`, `judge_id`; returns 202 + a `processing` job |
//! | `GET`  | `/v1/import/{id}` | Job status, counts and row errors |
//!
//! The file is validated before the job is created; rows are applied by a
//! background task in one transaction, or not at all.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Multipart, State, multipart::MultipartRejection},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  audit::Actor,
  idempotency::EventKey,
  import::{ImportBatch, ImportJob, RowError},
  store::RelevanceStore,
};
use verity_csv::{ColumnMapping, Parsed};

use crate::{ApiState, error::ApiError, extract::ApiPath};

// ─── Upload ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Upload {
  file:     Option<Bytes>,
  mapping:  Option<String>,
  topic_id: Option<String>,
  judge_id: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
  let mut upload = Upload::default();
  while let Some(field) = multipart.next_field().await? {
    let name = field.name().unwrap_or_default().to_owned();
    match name.as_str() {
      "file" => upload.file = Some(field.bytes().await?),
      "mapping" => upload.mapping = Some(field.text().await?),
      "topic_id" => upload.topic_id = Some(field.text().await?),
      "judge_id" => upload.judge_id = Some(field.text().await?),
      _ => {}
    }
  }
  Ok(upload)
}

fn required_id(field: &str, raw: Option<String>) -> Result<Uuid, ApiError> {
  let raw = raw.ok_or_else(|| ApiError::validation(format!("missing multipart field '{field}'")))?;
  raw
    .trim()
    .parse()
    .map_err(|_| ApiError::validation(format!("'{field}' is not a valid id: '{raw}'")))
}

/// `POST /v1/import/csv`
pub async fn upload<S>(
  State(state): State<ApiState<S>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RelevanceStore + 'static,
{
  let upload = read_upload(multipart?).await?;
  let file = upload
    .file
    .ok_or_else(|| ApiError::validation("missing multipart field 'file'"))?;
  let topic_id = required_id("topic_id", upload.topic_id)?;
  let judge_id = required_id("judge_id", upload.judge_id)?;
  let mapping = ColumnMapping::from_json(upload.mapping.as_deref().unwrap_or_default())?;

  let store = &state.store;
  store
    .get_topic(topic_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::TopicNotFound(topic_id))?;
  store
    .get_judge(judge_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| CoreError::JudgeNotFound(judge_id.to_string()))?;

  let parsed = verity_csv::parse(&file, &mapping)?;
  let key = verity_csv::upload_key(&file, &mapping, topic_id, judge_id)?;
  let job = store
    .create_import_job(parsed.total_rows)
    .await
    .map_err(ApiError::store)?;
  info!(import_id = %job.import_id, rows = parsed.total_rows, "import accepted");

  tokio::spawn(process(state.store.clone(), job.import_id, key, topic_id, judge_id, parsed));
  Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Apply a parsed upload, or record why it cannot be applied.
async fn process<S>(
  store: Arc<S>,
  import_id: Uuid,
  key: EventKey,
  topic_id: Uuid,
  judge_id: Uuid,
  parsed: Parsed,
) where
  S: RelevanceStore,
{
  let errors = if parsed.is_valid() {
    let batch = ImportBatch { topic_id, judge_id, rows: parsed.rows };
    match store.apply_import(import_id, key, batch, Actor::judge(judge_id)).await {
      Ok(job) => {
        let status = job.status.as_ref();
        info!(%import_id, status, rows = job.processed_rows, "import finished");
        return;
      }
      // Row failures come back as a `failed` job; what is left is batch-level.
      Err(e) => vec![RowError { row: 0, error: e.to_string() }],
    }
  } else {
    parsed.errors
  };

  warn!(%import_id, errors = errors.len(), "import failed");
  if let Err(e) = store.fail_import(import_id, errors).await {
    error!(%import_id, error = %e, "could not record import failure");
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// `GET /v1/import/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ImportJob>, ApiError>
where
  S: RelevanceStore,
{
  let job = state
    .store
    .get_import_job(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::ImportNotFound(id))?;
  Ok(Json(job))
}
