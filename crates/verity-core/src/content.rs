//! Canonicalization and content hashing.
//!
//! Content-addressed entities (article versions, topic versions) are keyed by
//! a SHA-256 digest over a canonical form of their content. Canonicalization is
//! deterministic: insignificant whitespace in free text is normalized, and
//! structured payloads are rendered as JSON with sorted keys.
//!
//! The digest input is domain-separated and length-prefixed per field, so two
//! payloads can only share a hash when all of their canonical fields match.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── Hash value ──────────────────────────────────────────────────────────────

/// A SHA-256 content digest, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
  pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }

  pub fn to_hex(&self) -> String { hex::encode(self.0) }
}

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ContentHash({})", self.to_hex())
  }
}

impl FromStr for ContentHash {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let bytes = hex::decode(s)
      .map_err(|e| Error::Validation(format!("invalid content hash {s:?}: {e}")))?;
    let arr: [u8; 32] = bytes
      .try_into()
      .map_err(|_| Error::Validation(format!("content hash {s:?} is not 32 bytes")))?;
    Ok(Self(arr))
  }
}

impl Serialize for ContentHash {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for ContentHash {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let s = String::deserialize(d)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Hasher ──────────────────────────────────────────────────────────────────

/// Incremental builder for a domain-separated content hash.
pub struct ContentHasher {
  inner: Sha256,
}

impl ContentHasher {
  pub fn new(domain: &str) -> Self {
    let mut inner = Sha256::new();
    update_framed(&mut inner, domain.as_bytes());
    Self { inner }
  }

  /// Append one canonical field.
  pub fn field(mut self, bytes: impl AsRef<[u8]>) -> Self {
    update_framed(&mut self.inner, bytes.as_ref());
    self
  }

  pub fn finish(self) -> ContentHash { ContentHash(self.inner.finalize().into()) }
}

fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
  hasher.update((bytes.len() as u64).to_le_bytes());
  hasher.update(bytes);
}

// ─── Canonical forms ─────────────────────────────────────────────────────────

/// Normalize insignificant whitespace in free text.
///
/// - CRLF and lone CR become LF.
/// - Within a line, runs of whitespace collapse to one space; lines are trimmed.
/// - Runs of blank lines collapse to a single blank line.
/// - Leading and trailing blank lines are dropped.
pub fn normalize_text(input: &str) -> String {
  let unified = input.replace("\r\n", "\n").replace('\r', "\n");
  let mut out = String::with_capacity(unified.len());
  let mut pending_blank = false;

  for line in unified.split('\n') {
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
      pending_blank = !out.is_empty();
      continue;
    }
    if !out.is_empty() {
      out.push('\n');
      if pending_blank {
        out.push('\n');
      }
    }
    pending_blank = false;
    out.push_str(&collapsed);
  }

  out
}

/// Normalize a language tag: trimmed, lowercase, `und` when empty.
pub fn normalize_language(tag: &str) -> String {
  let trimmed = tag.trim();
  if trimmed.is_empty() {
    "und".to_owned()
  } else {
    trimmed.to_ascii_lowercase()
  }
}

/// Render `value` as canonical JSON: object keys sorted, no insignificant
/// whitespace. String leaves are left untouched.
pub fn canonical_json(value: &Value) -> String {
  // `Value`'s `Display` is the compact form; we only need to fix key order.
  sort_keys(value).to_string()
}

/// Serialize `value` and render it as canonical JSON.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
  Ok(canonical_json(&serde_json::to_value(value)?))
}

fn sort_keys(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let sorted: BTreeMap<&String, Value> =
        map.iter().map(|(k, v)| (k, sort_keys(v))).collect();
      let mut out = serde_json::Map::new();
      for (k, v) in sorted {
        out.insert(k.clone(), v);
      }
      Value::Object(out)
    }
    Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
    other => other.clone(),
  }
}

// ─── Resolution outcome ──────────────────────────────────────────────────────

/// The outcome of a create-or-reuse resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolved<T> {
  pub value:       T,
  /// `false` when an existing row with identical content was reused.
  pub was_created: bool,
}
