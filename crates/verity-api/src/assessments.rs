//! Handlers for `/v1/assessments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/v1/assessments` | Filters: `article_version_id`, `topic_id`, `judge_id`, `label`, `from`, `to`, `latest_only`, `limit`, `offset` |
//! | `GET`  | `/v1/assessments/{id}` | One assessment version |

use axum::{Json, extract::State};
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  assessment::{AssessmentQuery, RelevanceAssessment},
  store::{Page, RelevanceStore},
};

use crate::{
  ApiState,
  error::ApiError,
  extract::{ApiPath, ApiQuery},
};

/// `GET /v1/assessments?...`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  ApiQuery(query): ApiQuery<AssessmentQuery>,
) -> Result<Json<Page<RelevanceAssessment>>, ApiError>
where
  S: RelevanceStore,
{
  let page = state.store.list_assessments(query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /v1/assessments/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<RelevanceAssessment>, ApiError>
where
  S: RelevanceStore,
{
  let assessment = state
    .store
    .get_assessment(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::AssessmentNotFound(id))?;
  Ok(Json(assessment))
}
