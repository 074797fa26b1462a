//! CSV batch codec for Verity.
//!
//! Turns an uploaded judgment CSV into validated [`ImportRow`]s plus a
//! per-row error report. Pure and synchronous; no HTTP or database
//! dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use verity_csv::{ColumnMapping, parse};
//!
//! let file = b"text,label\nSolar output rose,relevant\n";
//! let parsed = parse(file, &ColumnMapping::default()).unwrap();
//! assert!(parsed.is_valid());
//! println!("{} rows", parsed.rows.len());
//! ```

pub mod error;
mod parse;

pub use error::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use verity_core::{
  idempotency::EventKey,
  import::{ImportRow, RowError},
};

// ─── Public types ────────────────────────────────────────────────────────────

/// Header name for each logical field. Missing fields default to the logical
/// name itself, so an empty mapping `{}` expects headers `text`, `label`, ….
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMapping {
  pub text:         String,
  pub label:        String,
  pub external_key: String,
  pub source:       String,
  pub language:     String,
  pub confidence:   String,
  pub rationale:    String,
  pub published_at: String,
}

impl Default for ColumnMapping {
  fn default() -> Self {
    Self {
      text:         "text".into(),
      label:        "label".into(),
      external_key: "external_key".into(),
      source:       "source".into(),
      language:     "language".into(),
      confidence:   "confidence".into(),
      rationale:    "rationale".into(),
      published_at: "published_at".into(),
    }
  }
}

impl ColumnMapping {
  /// Parse a mapping from its JSON form. Blank input yields the default.
  pub fn from_json(raw: &str) -> Result<Self> {
    if raw.trim().is_empty() {
      return Ok(Self::default());
    }
    let mapping: Self = serde_json::from_str(raw)?;
    if mapping.text.trim().is_empty() || mapping.label.trim().is_empty() {
      return Err(Error::InvalidMapping("text and label columns cannot be blank".into()));
    }
    Ok(mapping)
  }

  /// Stable byte form; part of an upload's idempotency key.
  pub fn canonical_bytes(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec(self)?) }
}

/// The outcome of parsing one upload.
#[derive(Debug, Clone)]
pub struct Parsed {
  /// Number of data rows, header excluded.
  pub total_rows: usize,
  pub rows:       Vec<ImportRow>,
  pub errors:     Vec<RowError>,
}

impl Parsed {
  /// A batch may only be applied when no row failed.
  pub fn is_valid(&self) -> bool { self.errors.is_empty() }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse a whole CSV file against `mapping`.
///
/// Fails only on file-level problems (no header, a required column absent).
/// Row problems are collected in [`Parsed::errors`].
pub fn parse(input: &[u8], mapping: &ColumnMapping) -> Result<Parsed> {
  parse::parse_file(input, mapping)
}

/// Idempotency key of an upload: the same file, mapping and attribution map
/// to the same key.
pub fn upload_key(
  file: &[u8],
  mapping: &ColumnMapping,
  topic_id: Uuid,
  judge_id: Uuid,
) -> Result<EventKey> {
  let attribution = format!("{topic_id}:{judge_id}");
  Ok(EventKey::csv(file, &mapping.canonical_bytes()?, attribution.as_bytes()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_mapping_keeps_defaults() {
    let mapping = ColumnMapping::from_json(r#"{"text": "body"}"#).unwrap();
    assert_eq!(mapping.text, "body");
    assert_eq!(mapping.label, "label");
  }

  #[test]
  fn unknown_mapping_field_is_rejected() {
    assert!(ColumnMapping::from_json(r#"{"headline": "h"}"#).is_err());
    assert!(ColumnMapping::from_json(r#"{"label": " "}"#).is_err());
  }

  #[test]
  fn upload_key_depends_on_attribution() {
    let mapping = ColumnMapping::default();
    let topic = Uuid::new_v4();
    let a = upload_key(b"text,label\n", &mapping, topic, Uuid::new_v4()).unwrap();
    let b = upload_key(b"text,label\n", &mapping, topic, Uuid::new_v4()).unwrap();
    assert_ne!(a, b);
    assert!(a.as_str().starts_with("csv:"));
  }
}
