//! Judges: the humans and automated systems that produce assessments.
//!
//! A judge is a closed tagged variant: the shared surface (`status`,
//! `metadata`, `display_name`) lives on [`Judge`], the kind-specific payload in
//! [`JudgeProfile`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result, assessment::Label};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JudgeKind {
  Human,
  Automated,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JudgeStatus {
  #[default]
  Active,
  Inactive,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HumanRole {
  Annotator,
  Reviewer,
  Admin,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AutomationType {
  Llm,
  Rule,
  Hybrid,
}

// ─── Execution configuration ─────────────────────────────────────────────────

/// How an automated judge is executed, keyed by `provider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ExecutionConfig {
  /// Keyword-density heuristic. An empty keyword list selects the built-in
  /// vocabulary.
  Keyword {
    #[serde(default)]
    keywords:               Vec<String>,
    #[serde(default)]
    high_match_threshold:   Option<usize>,
    #[serde(default)]
    high_density_threshold: Option<f64>,
  },
  /// Always returns the configured verdict.
  Fixed {
    label:      Label,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    rationale:  Option<String>,
  },
  /// A model served by an Ollama instance.
  Ollama {
    base_url:        String,
    model:           String,
    #[serde(default = "default_ollama_timeout")]
    timeout_secs:    u64,
    #[serde(default)]
    prompt_template: Option<String>,
  },
}

fn default_ollama_timeout() -> u64 { 30 }

impl ExecutionConfig {
  pub fn provider(&self) -> &'static str {
    match self {
      Self::Keyword { .. } => "keyword",
      Self::Fixed { .. } => "fixed",
      Self::Ollama { .. } => "ollama",
    }
  }

  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Keyword { high_density_threshold: Some(d), .. } if !(0.0..=1.0).contains(d) => {
        Err(Error::Validation(format!("keyword density threshold {d} is outside [0, 1]")))
      }
      Self::Fixed { confidence, .. } => crate::assessment::validate_confidence(*confidence).map(|_| ()),
      Self::Ollama { base_url, model, timeout_secs, .. } => {
        if base_url.trim().is_empty() || model.trim().is_empty() {
          return Err(Error::Validation("ollama config requires base_url and model".into()));
        }
        if *timeout_secs == 0 {
          return Err(Error::Validation("ollama timeout must be positive".into()));
        }
        Ok(())
      }
      Self::Keyword { .. } => Ok(()),
    }
  }
}

// ─── Judge ───────────────────────────────────────────────────────────────────

/// Kind-specific judge payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JudgeProfile {
  Human {
    /// External user id; unique across human judges.
    user_id: String,
    role:    HumanRole,
  },
  Automated {
    automation_type: AutomationType,
    impl_key:        String,
    version:         String,
    config:          ExecutionConfig,
  },
}

impl JudgeProfile {
  pub fn kind(&self) -> JudgeKind {
    match self {
      Self::Human { .. } => JudgeKind::Human,
      Self::Automated { .. } => JudgeKind::Automated,
    }
  }

  /// The uniqueness key the registry enforces for this profile.
  pub fn identity(&self) -> String {
    match self {
      Self::Human { user_id, .. } => format!("human:{user_id}"),
      Self::Automated { impl_key, version, .. } => format!("automated:{impl_key}@{version}"),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judge {
  pub judge_id:     Uuid,
  pub display_name: String,
  pub status:       JudgeStatus,
  #[serde(default)]
  pub metadata:     serde_json::Value,
  pub profile:      JudgeProfile,
  pub created_at:   DateTime<Utc>,
}

impl Judge {
  pub fn kind(&self) -> JudgeKind { self.profile.kind() }

  pub fn is_active(&self) -> bool { self.status == JudgeStatus::Active }

  /// Fail with [`Error::JudgeInactive`] unless the judge may produce new
  /// judgments.
  pub fn ensure_active(&self) -> Result<()> {
    if self.is_active() {
      Ok(())
    } else {
      Err(Error::JudgeInactive(self.judge_id))
    }
  }
}

/// Input to [`RelevanceStore::register_judge`](crate::store::RelevanceStore::register_judge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJudge {
  pub display_name: String,
  #[serde(default)]
  pub metadata:     serde_json::Value,
  pub profile:      JudgeProfile,
}

impl NewJudge {
  pub fn validate(&self) -> Result<()> {
    if self.display_name.trim().is_empty() {
      return Err(Error::Validation("judge display_name is empty".into()));
    }
    match &self.profile {
      JudgeProfile::Human { user_id, .. } if user_id.trim().is_empty() => {
        Err(Error::Validation("human judge requires a user_id".into()))
      }
      JudgeProfile::Automated { impl_key, version, config, .. } => {
        if impl_key.trim().is_empty() || version.trim().is_empty() {
          return Err(Error::Validation("automated judge requires impl_key and version".into()));
        }
        config.validate()
      }
      JudgeProfile::Human { .. } => Ok(()),
    }
  }
}

/// Lookup key accepted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JudgeKey {
  Human {
    user_id: String,
  },
  Automated {
    impl_key: String,
    /// When absent, the most recently registered version is resolved.
    #[serde(default)]
    version:  Option<String>,
  },
}

impl fmt::Display for JudgeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Human { user_id } => write!(f, "human:{user_id}"),
      Self::Automated { impl_key, version: Some(v) } => write!(f, "automated:{impl_key}@{v}"),
      Self::Automated { impl_key, version: None } => write!(f, "automated:{impl_key}@latest"),
    }
  }
}
