//! Audit log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActorType {
  User,
  Judge,
  System,
}

/// Who caused a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub actor_type: ActorType,
  #[serde(default)]
  pub actor_id:   Option<String>,
}

impl Actor {
  pub fn system() -> Self { Self { actor_type: ActorType::System, actor_id: None } }

  pub fn user(id: impl Into<String>) -> Self {
    Self { actor_type: ActorType::User, actor_id: Some(id.into()) }
  }

  pub fn judge(id: Uuid) -> Self {
    Self { actor_type: ActorType::Judge, actor_id: Some(id.to_string()) }
  }
}

impl Default for Actor {
  fn default() -> Self { Self::system() }
}

/// An entry queued during a transaction and written once it commits.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub entity_type: &'static str,
  pub entity_id:   Uuid,
  pub action:      &'static str,
  pub actor:       Actor,
  pub changes:     serde_json::Value,
}

impl NewAuditEntry {
  pub fn new(
    entity_type: &'static str,
    entity_id: Uuid,
    action: &'static str,
    actor: &Actor,
    changes: serde_json::Value,
  ) -> Self {
    Self { entity_type, entity_id, action, actor: actor.clone(), changes }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub log_id:      Uuid,
  pub entity_type: String,
  pub entity_id:   Uuid,
  pub action:      String,
  pub actor_type:  ActorType,
  pub actor_id:    Option<String>,
  pub changes:     serde_json::Value,
  pub created_at:  DateTime<Utc>,
}
