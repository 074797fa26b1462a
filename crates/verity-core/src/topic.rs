//! Topics (the questions articles are judged against) and their versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  content::{ContentHash, ContentHasher, normalize_text},
};

const TOPIC_HASH_DOMAIN: &str = "verity.topic.v1";

/// Gates whether new judgments may target a topic's latest version.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TopicStatus {
  #[default]
  Draft,
  Active,
  Archived,
}

impl TopicStatus {
  /// draft → active → archived, and draft → archived. Archived is terminal.
  pub fn can_transition_to(self, next: TopicStatus) -> bool {
    use TopicStatus::*;
    matches!((self, next), (Draft, Active) | (Active, Archived) | (Draft, Archived))
  }

  pub fn transition(self, next: TopicStatus) -> Result<TopicStatus> {
    if self == next || self.can_transition_to(next) {
      Ok(next)
    } else {
      Err(Error::InvalidStateTransition {
        entity: "topic",
        from:   self.as_ref().to_owned(),
        to:     next.as_ref().to_owned(),
      })
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
  pub topic_id:          Uuid,
  /// Caller-chosen stable slug, unique across topics.
  pub key:               String,
  pub name:              String,
  pub status:            TopicStatus,
  pub latest_version_id: Uuid,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// An immutable snapshot of a topic definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicVersion {
  pub version_id:   Uuid,
  pub topic_id:     Uuid,
  pub definition:   String,
  pub content_hash: ContentHash,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`RelevanceStore::upsert_topic`](crate::store::RelevanceStore::upsert_topic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTopic {
  pub key:        String,
  pub name:       String,
  pub definition: String,
  /// Status for a newly created topic; ignored when the topic exists.
  #[serde(default)]
  pub status:     TopicStatus,
}

impl NewTopic {
  pub fn validate(&self) -> Result<()> {
    if self.key.trim().is_empty() {
      return Err(Error::Validation("topic key is empty".into()));
    }
    if normalize_text(&self.definition).is_empty() {
      return Err(Error::Validation("topic definition is empty".into()));
    }
    if self.status == TopicStatus::Archived {
      return Err(Error::Validation("cannot create an archived topic".into()));
    }
    Ok(())
  }

  pub fn content_hash(&self) -> ContentHash {
    ContentHasher::new(TOPIC_HASH_DOMAIN)
      .field(normalize_text(&self.definition))
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn archived_is_terminal() {
    assert!(TopicStatus::Archived.transition(TopicStatus::Active).is_err());
    assert!(TopicStatus::Archived.transition(TopicStatus::Draft).is_err());
    assert_eq!(
      TopicStatus::Archived.transition(TopicStatus::Archived).unwrap(),
      TopicStatus::Archived
    );
  }

  #[test]
  fn active_cannot_return_to_draft() {
    assert!(TopicStatus::Active.transition(TopicStatus::Draft).is_err());
    assert!(TopicStatus::Draft.transition(TopicStatus::Active).is_ok());
  }

  #[test]
  fn definition_hash_ignores_reflowed_whitespace() {
    let a = NewTopic {
      key:        "elections".into(),
      name:       "Elections".into(),
      definition: "Articles about  national elections.".into(),
      status:     TopicStatus::Active,
    };
    let mut b = a.clone();
    b.definition = "Articles about national elections.\n".into();
    b.name = "Renamed".into();
    assert_eq!(a.content_hash(), b.content_hash());
  }
}
