//! Exactly-once admission of external events.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Outcome of admitting an event key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
  /// First sighting; the event's effects are applied.
  Accepted,
  /// Seen before; no effects are produced.
  Duplicate,
}

impl Admission {
  pub fn is_accepted(self) -> bool { self == Admission::Accepted }
}

/// A namespaced idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey(String);

impl EventKey {
  /// Key of a webhook delivery, from the caller-supplied event id. A blank id
  /// is rejected: every id-less event would otherwise share one key.
  pub fn webhook(event_id: &str) -> Result<Self> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
      return Err(Error::Validation("event_id must not be blank".into()));
    }
    Ok(Self(format!("webhook:{event_id}")))
  }

  /// Key of a CSV upload: a digest over the file bytes, the column mapping and
  /// the attribution, so the same file imported under a different judge or
  /// topic is a distinct import.
  pub fn csv(file: &[u8], mapping: &[u8], attribution: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    for part in [file, mapping, attribution] {
      hasher.update((part.len() as u64).to_le_bytes());
      hasher.update(part);
    }
    Self(format!("csv:{}", hex::encode(hasher.finalize())))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// Rebuild a key read back from storage.
  pub fn from_stored(raw: String) -> Self { Self(raw) }
}

impl fmt::Display for EventKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_are_namespaced() {
    assert_eq!(EventKey::webhook(" evt-1 ").unwrap().as_str(), "webhook:evt-1");
    assert!(EventKey::csv(b"a", b"b", b"c").as_str().starts_with("csv:"));
  }

  #[test]
  fn blank_event_ids_have_no_key() {
    for id in ["", "   ", "\t\n"] {
      assert!(matches!(EventKey::webhook(id), Err(Error::Validation(_))));
    }
  }

  #[test]
  fn csv_key_depends_on_attribution() {
    let a = EventKey::csv(b"text\nhello\n", b"{}", b"judge-1");
    let b = EventKey::csv(b"text\nhello\n", b"{}", b"judge-2");
    assert_ne!(a, b);
    assert_eq!(a, EventKey::csv(b"text\nhello\n", b"{}", b"judge-1"));
  }

  #[test]
  fn csv_key_framing_is_unambiguous() {
    assert_ne!(EventKey::csv(b"ab", b"c", b""), EventKey::csv(b"a", b"bc", b""));
  }
}
