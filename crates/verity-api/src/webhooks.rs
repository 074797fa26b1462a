//! Handler for `/v1/webhooks/assessments`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/v1/webhooks/assessments` | Body: [`JudgmentEvent`]; 202 when accepted, 200 on redelivery |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, info};
use verity_core::{
  audit::Actor,
  import::{EventOutcome, JudgmentEvent},
  store::RelevanceStore,
};

use crate::{ApiState, error::ApiError, extract::ApiJson};

/// `POST /v1/webhooks/assessments`
pub async fn receive<S>(
  State(state): State<ApiState<S>>,
  ApiJson(event): ApiJson<JudgmentEvent>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RelevanceStore,
{
  let event_id = event.event_id.clone();
  let actor = Actor::judge(event.judge_id);
  let outcome = state.store.ingest_event(event, actor).await.map_err(ApiError::store)?;
  let status = match &outcome {
    EventOutcome::Accepted { assessment_id } => {
      info!(%event_id, %assessment_id, "webhook event accepted");
      StatusCode::ACCEPTED
    }
    EventOutcome::Duplicate => {
      debug!(%event_id, "webhook event redelivered");
      StatusCode::OK
    }
  };
  Ok((status, Json(outcome)))
}
