//! Handler for `/v1/audit`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/v1/audit` | `?entity_type&entity_id` both required; oldest first |

use axum::{Json, extract::State};
use serde::Deserialize;
use uuid::Uuid;
use verity_core::{audit::AuditEntry, store::RelevanceStore};

use crate::{ApiState, error::ApiError, extract::ApiQuery};

#[derive(Debug, Deserialize)]
pub struct TrailParams {
  /// e.g. `assessment`, `dataset_version`.
  pub entity_type: String,
  pub entity_id:   Uuid,
}

/// `GET /v1/audit?entity_type=<type>&entity_id=<id>`
pub async fn trail<S>(
  State(state): State<ApiState<S>>,
  ApiQuery(params): ApiQuery<TrailParams>,
) -> Result<Json<Vec<AuditEntry>>, ApiError>
where
  S: RelevanceStore,
{
  let entries = state
    .store
    .audit_trail(params.entity_type, params.entity_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}
