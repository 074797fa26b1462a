//! JSON REST API for Verity.
//!
//! Exposes an axum [`Router`] backed by any
//! [`verity_core::store::RelevanceStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = verity_api::api_router(ApiState::new(store, engines, settings));
//! ```

pub mod assessments;
pub mod audit;
pub mod datasets;
pub mod error;
pub mod extract;
pub mod imports;
pub mod judges;
pub mod relevance;
pub mod topics;
pub mod webhooks;

use std::{sync::Arc, time::Duration};

use axum::{
  Json, Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use serde_json::{Value, json};
use verity_core::store::RelevanceStore;
use verity_judge::Engines;

pub use error::ApiError;

/// Tunables the handlers read.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Upper bound on one judge invocation.
  pub judge_timeout:    Duration,
  /// Request body limit, CSV uploads included.
  pub max_upload_bytes: usize,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self { judge_timeout: Duration::from_secs(30), max_upload_bytes: 16 * 1024 * 1024 }
  }
}

/// Shared handler state.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub engines:  Arc<Engines>,
  pub settings: Arc<ApiSettings>,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, engines: Arc<Engines>, settings: ApiSettings) -> Self {
    Self { store, engines, settings: Arc::new(settings) }
  }
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      engines:  self.engines.clone(),
      settings: self.settings.clone(),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: RelevanceStore + 'static,
{
  let body_limit = DefaultBodyLimit::max(state.settings.max_upload_bytes);
  Router::new()
    .route("/healthz", get(health))
    // Judging
    .route("/v1/relevance/judge", post(relevance::judge::<S>))
    .route("/v1/assessments", get(assessments::list::<S>))
    .route("/v1/assessments/{id}", get(assessments::get_one::<S>))
    // Datasets
    .route("/v1/datasets", post(datasets::create::<S>))
    .route("/v1/datasets/{id}", get(datasets::get_one::<S>))
    .route("/v1/datasets/{id}/freeze", post(datasets::freeze::<S>))
    .route("/v1/datasets/{id}/status", post(datasets::set_status::<S>))
    .route("/v1/dataset-versions/{id}/entries", get(datasets::entries::<S>))
    // Ingestion
    .route("/v1/import/csv", post(imports::upload::<S>))
    .route("/v1/import/{id}", get(imports::get_one::<S>))
    .route("/v1/webhooks/assessments", post(webhooks::receive::<S>))
    // Registry
    .route("/v1/topics", get(topics::list::<S>).post(topics::upsert::<S>))
    .route("/v1/topics/{id}", get(topics::get_one::<S>))
    .route("/v1/topics/{id}/status", post(topics::set_status::<S>))
    .route("/v1/judges", post(judges::register::<S>))
    .route("/v1/judges/{id}", get(judges::get_one::<S>))
    .route("/v1/judges/{id}/status", post(judges::set_status::<S>))
    // Audit
    .route("/v1/audit", get(audit::trail::<S>))
    .layer(body_limit)
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests;
