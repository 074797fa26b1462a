//! Handlers for `/v1/topics` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/v1/topics` | All topics |
//! | `POST` | `/v1/topics` | Body: [`NewTopic`]; 201 when a version was created, else 200 |
//! | `GET`  | `/v1/topics/{id}` | Topic plus its latest version |
//! | `POST` | `/v1/topics/{id}/status` | Body: `{"status":"active"}` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  audit::Actor,
  store::RelevanceStore,
  topic::{NewTopic, Topic, TopicStatus, TopicVersion},
};

use crate::{
  ApiState,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

#[derive(Debug, Serialize)]
pub struct TopicDetail {
  pub topic:          Topic,
  pub latest_version: TopicVersion,
}

#[derive(Debug, Serialize)]
pub struct UpsertedTopic {
  pub topic:       Topic,
  pub version:     TopicVersion,
  pub was_created: bool,
}

/// `GET /v1/topics`
pub async fn list<S>(State(state): State<ApiState<S>>) -> Result<Json<Vec<Topic>>, ApiError>
where
  S: RelevanceStore,
{
  Ok(Json(state.store.list_topics().await.map_err(ApiError::store)?))
}

/// `POST /v1/topics`
pub async fn upsert<S>(
  State(state): State<ApiState<S>>,
  ApiJson(body): ApiJson<NewTopic>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RelevanceStore,
{
  let resolved = state
    .store
    .upsert_topic(body, Actor::system())
    .await
    .map_err(ApiError::store)?;
  let topic_id = resolved.value.topic_id;
  let topic = state
    .store
    .get_topic(topic_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::TopicNotFound(topic_id))?;

  let status = if resolved.was_created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((
    status,
    Json(UpsertedTopic { topic, version: resolved.value, was_created: resolved.was_created }),
  ))
}

/// `GET /v1/topics/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<TopicDetail>, ApiError>
where
  S: RelevanceStore,
{
  let topic = state
    .store
    .get_topic(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::TopicNotFound(id))?;
  let latest_version = state
    .store
    .get_topic_version(topic.latest_version_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::TopicVersionNotFound(topic.latest_version_id))?;
  Ok(Json(TopicDetail { topic, latest_version }))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: TopicStatus,
}

/// `POST /v1/topics/{id}/status`
pub async fn set_status<S>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Topic>, ApiError>
where
  S: RelevanceStore,
{
  let topic = state
    .store
    .set_topic_status(id, body.status, Actor::system())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(topic))
}
