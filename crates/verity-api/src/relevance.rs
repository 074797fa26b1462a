//! Handler for `/v1/relevance/judge`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/v1/relevance/judge` | Body: [`JudgeBody`]; invokes an automated judge |
//!
//! The article and topic are resolved before the judge runs, so a failed
//! invocation leaves them persisted.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  article::NewArticle,
  assessment::{AssessmentKey, Label, NewAssessment},
  audit::Actor,
  judge::JudgeKey,
  store::RelevanceStore,
  topic::TopicStatus,
};
use verity_judge::Request;

use crate::{ApiState, error::ApiError, extract::ApiJson};

#[derive(Debug, Deserialize)]
pub struct JudgeBody {
  pub topic_id: Uuid,
  pub article:  NewArticle,
  pub judge:    JudgeKey,
  #[serde(default)]
  pub options:  JudgeOptions,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JudgeOptions {
  /// When `false` nothing is written and the returned ids are `null`.
  pub persist_article:  bool,
  /// When `false` the rationale is still stored but not returned.
  pub return_rationale: bool,
}

impl Default for JudgeOptions {
  fn default() -> Self { Self { persist_article: true, return_rationale: true } }
}

#[derive(Debug, Serialize)]
pub struct JudgeResponse {
  pub assessment_id:      Option<Uuid>,
  pub article_version_id: Option<Uuid>,
  pub topic_version_id:   Uuid,
  pub judge_id:           Uuid,
  pub label:              Label,
  pub confidence:         Option<f64>,
  pub rationale:          Option<String>,
  pub created_at:         DateTime<Utc>,
}

/// `POST /v1/relevance/judge`
pub async fn judge<S>(
  State(state): State<ApiState<S>>,
  ApiJson(body): ApiJson<JudgeBody>,
) -> Result<Json<JudgeResponse>, ApiError>
where
  S: RelevanceStore,
{
  let store = &state.store;
  body.article.content.validate()?;

  let topic = store
    .get_topic(body.topic_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::TopicNotFound(body.topic_id))?;
  if topic.status != TopicStatus::Active {
    return Err(
      CoreError::TopicNotActive { topic: topic.topic_id, status: topic.status.as_ref().into() }
        .into(),
    );
  }
  let topic_version = store
    .get_topic_version(topic.latest_version_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::TopicVersionNotFound(topic.latest_version_id))?;

  let judge = store.resolve_judge(body.judge).await.map_err(ApiError::store)?;

  let article_version = if body.options.persist_article {
    let resolved = store
      .upsert_article(body.article.clone(), Actor::system())
      .await
      .map_err(ApiError::store)?;
    Some(resolved.value)
  } else {
    None
  };

  let request = Request {
    topic_definition: &topic_version.definition,
    text:             &body.article.content.text,
    context:          &body.article.content.context,
  };
  let verdict = state
    .engines
    .invoke(&judge, request, state.settings.judge_timeout)
    .await?;

  let (assessment_id, created_at) = match &article_version {
    Some(version) => {
      let assessment = store
        .record_assessment(
          NewAssessment {
            key:        AssessmentKey {
              judge_id:           judge.judge_id,
              topic_version_id:   topic_version.version_id,
              article_version_id: version.version_id,
            },
            label:      verdict.label,
            confidence: verdict.confidence,
            rationale:  verdict.rationale.clone(),
          },
          Actor::judge(judge.judge_id),
        )
        .await
        .map_err(ApiError::store)?;
      info!(
        assessment_id = %assessment.assessment_id,
        judge_id = %judge.judge_id,
        version = assessment.version,
        "judgment recorded"
      );
      (Some(assessment.assessment_id), assessment.created_at)
    }
    None => (None, Utc::now()),
  };

  Ok(Json(JudgeResponse {
    assessment_id,
    article_version_id: article_version.map(|v| v.version_id),
    topic_version_id: topic_version.version_id,
    judge_id: judge.judge_id,
    label: verdict.label,
    confidence: verdict.confidence,
    rationale: verdict.rationale.filter(|_| body.options.return_rationale),
    created_at,
  }))
}
