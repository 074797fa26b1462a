//! Handlers for `/v1/judges` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/v1/judges` | Body: [`NewJudge`]; returns 201 + the registered judge |
//! | `GET`  | `/v1/judges/{id}` | |
//! | `POST` | `/v1/judges/{id}/status` | Body: `{"status":"inactive"}` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  audit::Actor,
  judge::{Judge, JudgeStatus, NewJudge},
  store::RelevanceStore,
};

use crate::{
  ApiState,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

/// `POST /v1/judges`
pub async fn register<S>(
  State(state): State<ApiState<S>>,
  ApiJson(body): ApiJson<NewJudge>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RelevanceStore,
{
  let judge = state
    .store
    .register_judge(body, Actor::system())
    .await
    .map_err(ApiError::store)?;
  info!(judge_id = %judge.judge_id, identity = %judge.profile.identity(), "judge registered");
  Ok((StatusCode::CREATED, Json(judge)))
}

/// `GET /v1/judges/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Judge>, ApiError>
where
  S: RelevanceStore,
{
  let judge = state
    .store
    .get_judge(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| CoreError::JudgeNotFound(id.to_string()))?;
  Ok(Json(judge))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: JudgeStatus,
}

/// `POST /v1/judges/{id}/status`
pub async fn set_status<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Judge>, ApiError>
where
  S: RelevanceStore,
{
  let judge = state
    .store
    .set_judge_status(id, body.status, Actor::system())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(judge))
}
