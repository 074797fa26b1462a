//! Handlers for dataset endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/v1/datasets` | Body: [`CreateDatasetBody`]; with `dataset_id` appends a version |
//! | `GET`  | `/v1/datasets/{id}` | Dataset plus its versions |
//! | `POST` | `/v1/datasets/{id}/freeze` | Freezes the latest version |
//! | `POST` | `/v1/datasets/{id}/status` | Body: `{"status":"archived"}` |
//! | `GET`  | `/v1/dataset-versions/{id}/entries` | Entries in materialized order |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  audit::Actor,
  dataset::{
    Dataset, DatasetEntry, DatasetPurpose, DatasetSpec, DatasetStatus, DatasetVersion,
    NewDataset,
  },
  store::RelevanceStore,
};

use crate::{
  ApiState,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateDatasetBody {
  /// Append to this dataset instead of creating one.
  pub dataset_id:  Option<Uuid>,
  pub name:        Option<String>,
  pub description: Option<String>,
  pub purpose:     Option<DatasetPurpose>,
  pub spec:        DatasetSpec,
}

#[derive(Debug, Serialize)]
pub struct CreatedVersion {
  pub dataset_id:         Uuid,
  pub dataset_version_id: Uuid,
  pub version_number:     u32,
  pub entry_count:        u64,
  pub created_at:         DateTime<Utc>,
}

impl From<&DatasetVersion> for CreatedVersion {
  fn from(v: &DatasetVersion) -> Self {
    Self {
      dataset_id:         v.dataset_id,
      dataset_version_id: v.version_id,
      version_number:     v.version_number,
      entry_count:        v.entry_count,
      created_at:         v.created_at,
    }
  }
}

/// `POST /v1/datasets`: returns 201 + the materialized version summary.
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  ApiJson(body): ApiJson<CreateDatasetBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RelevanceStore,
{
  let version = match body.dataset_id {
    Some(dataset_id) => state
      .store
      .append_version(dataset_id, body.spec, Actor::system())
      .await
      .map_err(ApiError::store)?,
    None => {
      let (Some(name), Some(purpose)) = (body.name, body.purpose) else {
        return Err(ApiError::validation("a new dataset requires name and purpose"));
      };
      let input = NewDataset { name, description: body.description, purpose, spec: body.spec };
      state
        .store
        .create_dataset(input, Actor::system())
        .await
        .map_err(ApiError::store)?
        .version
    }
  };
  info!(
    dataset_id = %version.dataset_id,
    version = version.version_number,
    entries = version.entry_count,
    "dataset version materialized"
  );
  Ok((StatusCode::CREATED, Json(CreatedVersion::from(&version))))
}

// ─── Read ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DatasetDetail {
  #[serde(flatten)]
  pub dataset:  Dataset,
  pub versions: Vec<DatasetVersion>,
}

/// `GET /v1/datasets/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DatasetDetail>, ApiError>
where
  S: RelevanceStore,
{
  let dataset = state
    .store
    .get_dataset(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::DatasetNotFound(id))?;
  let versions = state.store.list_dataset_versions(id).await.map_err(ApiError::store)?;
  Ok(Json(DatasetDetail { dataset, versions }))
}

/// `GET /v1/dataset-versions/{id}/entries`
pub async fn entries<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<DatasetEntry>>, ApiError>
where
  S: RelevanceStore,
{
  state
    .store
    .get_dataset_version(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::DatasetVersionNotFound(id))?;
  let entries = state.store.list_entries(id).await.map_err(ApiError::store)?;
  Ok(Json(entries))
}

// ─── Freeze ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Frozen {
  pub dataset_id:         Uuid,
  pub dataset_version_id: Uuid,
  pub status:             DatasetStatus,
  pub frozen_at:          Option<DateTime<Utc>>,
}

/// `POST /v1/datasets/{id}/freeze`
pub async fn freeze<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Frozen>, ApiError>
where
  S: RelevanceStore,
{
  let store = &state.store;
  store
    .get_dataset(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::DatasetNotFound(id))?;
  let latest = store
    .latest_dataset_version(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::validation(format!("dataset {id} has no versions")))?;

  let version = store
    .freeze_version(latest.version_id, Actor::system())
    .await
    .map_err(ApiError::store)?;
  let dataset = store
    .get_dataset(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::DatasetNotFound(id))?;
  info!(dataset_id = %id, version_id = %version.version_id, "dataset frozen");

  Ok(Json(Frozen {
    dataset_id:         id,
    dataset_version_id: version.version_id,
    status:             dataset.status,
    frozen_at:          version.frozen_at,
  }))
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: DatasetStatus,
}

/// `POST /v1/datasets/{id}/status`
pub async fn set_status<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Dataset>, ApiError>
where
  S: RelevanceStore,
{
  let dataset = state
    .store
    .set_dataset_status(id, body.status, Actor::system())
    .await
    .map_err(ApiError::store)?;
  info!(dataset_id = %id, status = dataset.status.as_ref(), "dataset status set");
  Ok(Json(dataset))
}
