//! Relevance assessments: append-only judgment records with supersede
//! chains.
//!
//! A re-judgment never mutates the prior row; it appends a new row with
//! `version = previous + 1` and `supersedes_id` pointing at the previous row.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// The judgment outcome. Distinct from confidence: `unsure` is an outcome, a
/// confidence value expresses certainty about whichever outcome was chosen.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Label {
  Relevant,
  NotRelevant,
  Unsure,
}

impl Label {
  /// Lenient parse for external input: trimmed, case-insensitive.
  pub fn parse(raw: &str) -> Result<Label> {
    Label::from_str(&raw.trim().to_ascii_lowercase())
      .map_err(|_| Error::InvalidLabel(raw.to_owned()))
  }
}

/// Validate an optional confidence into `[0, 1]`.
pub fn validate_confidence(confidence: Option<f64>) -> Result<Option<f64>> {
  match confidence {
    Some(c) if !(0.0..=1.0).contains(&c) => Err(Error::ConfidenceOutOfRange(c)),
    other => Ok(other),
  }
}

/// The `(judge, topic version, article version)` key a supersede chain lives
/// under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssessmentKey {
  pub judge_id:           Uuid,
  pub topic_version_id:   Uuid,
  pub article_version_id: Uuid,
}

/// Input to [`RelevanceStore::record_assessment`](crate::store::RelevanceStore::record_assessment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssessment {
  #[serde(flatten)]
  pub key:        AssessmentKey,
  pub label:      Label,
  #[serde(default)]
  pub confidence: Option<f64>,
  #[serde(default)]
  pub rationale:  Option<String>,
}

impl NewAssessment {
  pub fn new(key: AssessmentKey, label: Label) -> Self {
    Self { key, label, confidence: None, rationale: None }
  }

  pub fn validate(&self) -> Result<()> {
    validate_confidence(self.confidence)?;
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceAssessment {
  pub assessment_id:      Uuid,
  pub judge_id:           Uuid,
  pub topic_version_id:   Uuid,
  pub article_version_id: Uuid,
  pub label:              Label,
  pub confidence:         Option<f64>,
  pub rationale:          Option<String>,
  /// Set exactly when `version > 1`.
  pub supersedes_id:      Option<Uuid>,
  pub version:            u32,
  pub created_at:         DateTime<Utc>,
}

impl RelevanceAssessment {
  pub fn key(&self) -> AssessmentKey {
    AssessmentKey {
      judge_id:           self.judge_id,
      topic_version_id:   self.topic_version_id,
      article_version_id: self.article_version_id,
    }
  }
}

/// Filters for [`RelevanceStore::list_assessments`](crate::store::RelevanceStore::list_assessments).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentQuery {
  pub article_version_id: Option<Uuid>,
  /// Matches assessments on any version of the topic.
  pub topic_id:           Option<Uuid>,
  pub judge_id:           Option<Uuid>,
  pub label:              Option<Label>,
  /// Inclusive lower bound on `created_at`.
  pub from:               Option<DateTime<Utc>>,
  /// Exclusive upper bound on `created_at`.
  pub to:                 Option<DateTime<Utc>>,
  /// Only the latest version of each supersede chain.
  #[serde(default)]
  pub latest_only:        bool,
  pub limit:              Option<usize>,
  pub offset:             Option<usize>,
}

impl AssessmentQuery {
  pub const DEFAULT_LIMIT: usize = 50;
  pub const MAX_LIMIT: usize = 500;

  pub fn effective_limit(&self) -> usize {
    self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
  }

  pub fn effective_offset(&self) -> usize { self.offset.unwrap_or(0) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_parse_is_lenient_about_case_and_padding() {
    assert_eq!(Label::parse(" Relevant ").unwrap(), Label::Relevant);
    assert_eq!(Label::parse("NOT_RELEVANT").unwrap(), Label::NotRelevant);
  }

  #[test]
  fn invalid_label_reports_the_raw_value() {
    let err = Label::parse("maybe").unwrap_err();
    assert_eq!(err.to_string(), "Invalid label value: 'maybe'");
  }

  #[test]
  fn confidence_bounds_are_inclusive() {
    assert!(validate_confidence(Some(0.0)).is_ok());
    assert!(validate_confidence(Some(1.0)).is_ok());
    assert!(validate_confidence(None).is_ok());
    assert!(validate_confidence(Some(1.01)).is_err());
    assert!(validate_confidence(Some(-0.1)).is_err());
    assert!(validate_confidence(Some(f64::NAN)).is_err());
  }

  #[test]
  fn limit_is_clamped() {
    let q = AssessmentQuery { limit: Some(10_000), ..Default::default() };
    assert_eq!(q.effective_limit(), AssessmentQuery::MAX_LIMIT);
    assert_eq!(AssessmentQuery::default().effective_limit(), AssessmentQuery::DEFAULT_LIMIT);
  }
}
