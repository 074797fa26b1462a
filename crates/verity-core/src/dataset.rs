//! Datasets, dataset versions and the specifications they are derived from.
//!
//! Dataset versions form a tree through `parent_version_id`. The tree is held
//! as an index-based arena ([`LineageArena`]) when checked, never as an
//! in-memory object graph.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  article::SourceType,
  assessment::{Label, validate_confidence},
  content::normalize_language,
};

// ─── Dataset ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatasetPurpose {
  Corpus,
  Analysis,
  Training,
  Evaluation,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatasetStatus {
  #[default]
  Active,
  Frozen,
  Archived,
}

impl DatasetStatus {
  /// | from \ to | active | frozen | archived |
  /// |-----------|--------|--------|----------|
  /// | active    | –      | ok     | ok       |
  /// | frozen    | ok     | –      | ok       |
  /// | archived  | ✗      | ok     | –        |
  pub fn can_transition_to(self, next: DatasetStatus) -> bool {
    use DatasetStatus::*;
    !matches!((self, next), (Archived, Active)) && self != next
  }

  /// Validate a transition; staying in the same state is a no-op.
  pub fn transition(self, next: DatasetStatus) -> Result<DatasetStatus> {
    if self == next || self.can_transition_to(next) {
      Ok(next)
    } else {
      Err(Error::InvalidStateTransition {
        entity: "dataset",
        from:   self.as_ref().to_owned(),
        to:     next.as_ref().to_owned(),
      })
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
  pub dataset_id:  Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub purpose:     DatasetPurpose,
  pub status:      DatasetStatus,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

// ─── Specifications ──────────────────────────────────────────────────────────

/// How a dataset version is built, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetSpec {
  TimeSlice(TimeSliceSpec),
  Subset(SubsetSpec),
}

impl DatasetSpec {
  pub fn kind(&self) -> VersionKind {
    match self {
      Self::TimeSlice(_) => VersionKind::Base,
      Self::Subset(_) => VersionKind::Derived,
    }
  }

  pub fn parent_version_id(&self) -> Option<Uuid> {
    match self {
      Self::TimeSlice(_) => None,
      Self::Subset(s) => Some(s.parent_dataset_version_id),
    }
  }

  pub fn validate(&self) -> Result<()> {
    match self {
      Self::TimeSlice(s) => s.validate(),
      Self::Subset(s) => s.validate(),
    }
  }
}

/// Corpus-level filters of a base dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusFilters {
  /// Language tags; empty admits every language.
  #[serde(default)]
  pub languages: Vec<String>,
}

/// A base dataset: every latest article version observed in `[from, to)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSliceSpec {
  pub from:         DateTime<Utc>,
  pub to:           DateTime<Utc>,
  /// Source types; empty admits every source type.
  #[serde(default)]
  pub source_types: Vec<SourceType>,
  #[serde(default)]
  pub filters:      CorpusFilters,
}

impl TimeSliceSpec {
  pub fn validate(&self) -> Result<()> {
    if self.from >= self.to {
      return Err(Error::InvalidSpec(format!(
        "time slice is empty: from {} is not before to {}",
        self.from, self.to
      )));
    }
    Ok(())
  }

  /// Whether a version with the given attributes belongs to the slice.
  pub fn admits(
    &self,
    observed_at: DateTime<Utc>,
    source_type: SourceType,
    language: &str,
  ) -> bool {
    if observed_at < self.from || observed_at >= self.to {
      return false;
    }
    if !self.source_types.is_empty() && !self.source_types.contains(&source_type) {
      return false;
    }
    if !self.filters.languages.is_empty() {
      let language = normalize_language(language);
      return self
        .filters
        .languages
        .iter()
        .any(|l| normalize_language(l) == language);
    }
    true
  }
}

/// Assessment-level filters of a derived dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetFilters {
  #[serde(default)]
  pub topic_id:         Option<Uuid>,
  #[serde(default)]
  pub topic_version_id: Option<Uuid>,
  /// Any of these labels; empty admits every label.
  #[serde(default)]
  pub labels:           Vec<Label>,
  /// Any of these judges; empty admits every judge.
  #[serde(default)]
  pub judge_ids:        Vec<Uuid>,
  #[serde(default)]
  pub min_confidence:   Option<f64>,
  #[serde(default)]
  pub max_confidence:   Option<f64>,
}

impl SubsetFilters {
  pub fn has_assessment_criteria(&self) -> bool {
    self.topic_id.is_some()
      || self.topic_version_id.is_some()
      || !self.labels.is_empty()
      || !self.judge_ids.is_empty()
      || self.min_confidence.is_some()
      || self.max_confidence.is_some()
  }

  pub fn matches(&self, a: &CandidateAssessment) -> bool {
    if self.topic_id.is_some_and(|t| t != a.topic_id) {
      return false;
    }
    if self.topic_version_id.is_some_and(|t| t != a.topic_version_id) {
      return false;
    }
    if !self.labels.is_empty() && !self.labels.contains(&a.label) {
      return false;
    }
    if !self.judge_ids.is_empty() && !self.judge_ids.contains(&a.judge_id) {
      return false;
    }
    if let Some(min) = self.min_confidence
      && !a.confidence.is_some_and(|c| c >= min)
    {
      return false;
    }
    if let Some(max) = self.max_confidence
      && !a.confidence.is_some_and(|c| c <= max)
    {
      return false;
    }
    true
  }

  fn validate(&self) -> Result<()> {
    validate_confidence(self.min_confidence)?;
    validate_confidence(self.max_confidence)?;
    if let (Some(min), Some(max)) = (self.min_confidence, self.max_confidence)
      && min > max
    {
      return Err(Error::InvalidSpec(format!(
        "min_confidence {min} exceeds max_confidence {max}"
      )));
    }
    Ok(())
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SampleMethod {
  /// Uniform without replacement.
  Random,
  /// Proportional allocation by label.
  Stratified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSpec {
  pub method: SampleMethod,
  pub size:   usize,
  /// Drawn at creation time and recorded when absent.
  #[serde(default)]
  pub seed:   Option<u64>,
}

/// A derived dataset: a filtered, optionally sampled subset of a parent
/// version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetSpec {
  pub parent_dataset_version_id: Uuid,
  #[serde(default)]
  pub filters:                   SubsetFilters,
  #[serde(default)]
  pub sample:                    Option<SampleSpec>,
}

impl SubsetSpec {
  pub fn validate(&self) -> Result<()> {
    self.filters.validate()?;
    if let Some(sample) = &self.sample
      && sample.size == 0
    {
      return Err(Error::InvalidSpec("sample size must be positive".into()));
    }
    Ok(())
  }

  /// Fix the sampling seed so the stored spec reproduces this version.
  pub fn resolve_seed(&mut self) -> Option<u64> {
    let sample = self.sample.as_mut()?;
    Some(*sample.seed.get_or_insert_with(rand::random::<u64>))
  }
}

// ─── Versions & entries ──────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VersionKind {
  Base,
  Derived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetVersion {
  pub version_id:        Uuid,
  pub dataset_id:        Uuid,
  pub version_number:    u32,
  pub kind:              VersionKind,
  pub spec:              DatasetSpec,
  /// Required when `kind == Derived`.
  pub parent_version_id: Option<Uuid>,
  /// Cached; always equals the number of entries.
  pub entry_count:       u64,
  pub frozen_at:         Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
}

impl DatasetVersion {
  pub fn is_frozen(&self) -> bool { self.frozen_at.is_some() }

  /// Fail with [`Error::DatasetFrozen`] if the entry set is immutable.
  pub fn ensure_mutable(&self) -> Result<()> {
    if self.is_frozen() {
      Err(Error::DatasetFrozen(self.version_id))
    } else {
      Ok(())
    }
  }
}

/// Membership edge between a dataset version and an article version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
  pub dataset_version_id: Uuid,
  pub article_version_id: Uuid,
  pub ordinal:            Option<u64>,
  pub added_at:           DateTime<Utc>,
}

/// Input to [`RelevanceStore::create_dataset`](crate::store::RelevanceStore::create_dataset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDataset {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
  pub purpose:     DatasetPurpose,
  pub spec:        DatasetSpec,
}

impl NewDataset {
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::Validation("dataset name is empty".into()));
    }
    self.spec.validate()
  }
}

// ─── Candidate selection ─────────────────────────────────────────────────────

/// A latest-version assessment joined with its topic, as seen by derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateAssessment {
  pub article_version_id: Uuid,
  pub topic_id:           Uuid,
  pub topic_version_id:   Uuid,
  pub judge_id:           Uuid,
  pub label:              Label,
  pub confidence:         Option<f64>,
  pub created_at:         DateTime<Utc>,
}

/// An entry of the parent that survived filtering, with its stratum label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
  pub article_version_id: Uuid,
  /// The label of the most recent matching assessment, if any.
  pub label:              Option<Label>,
}

/// Apply `filters` to the parent's entries.
///
/// `latest` holds only the latest version of each supersede chain. With
/// assessment criteria set, an entry qualifies when at least one of its latest
/// assessments matches all of them; otherwise every entry qualifies.
pub fn select_candidates(
  parent_entries: &[Uuid],
  latest: &[CandidateAssessment],
  filters: &SubsetFilters,
) -> Vec<Candidate> {
  let mut by_article: HashMap<Uuid, Vec<&CandidateAssessment>> = HashMap::new();
  for a in latest.iter().filter(|a| filters.matches(a)) {
    by_article.entry(a.article_version_id).or_default().push(a);
  }

  let strict = filters.has_assessment_criteria();
  parent_entries
    .iter()
    .filter_map(|&article_version_id| {
      let label = by_article.get(&article_version_id).and_then(|matches| {
        matches
          .iter()
          .max_by_key(|a| (a.created_at, a.judge_id))
          .map(|a| a.label)
      });
      if strict && label.is_none() {
        None
      } else {
        Some(Candidate { article_version_id, label })
      }
    })
    .collect()
}

// ─── Lineage ─────────────────────────────────────────────────────────────────

/// Index-based view of the version tree: version id → parent id.
#[derive(Debug, Clone, Default)]
pub struct LineageArena {
  parents: HashMap<Uuid, Option<Uuid>>,
}

impl LineageArena {
  pub fn new(pairs: impl IntoIterator<Item = (Uuid, Option<Uuid>)>) -> Self {
    Self { parents: pairs.into_iter().collect() }
  }

  pub fn contains(&self, id: Uuid) -> bool { self.parents.contains_key(&id) }

  /// Ancestors of `id`, nearest first.
  pub fn ancestors(&self, id: Uuid) -> Result<Vec<Uuid>> {
    let mut seen = HashSet::from([id]);
    let mut chain = Vec::new();
    let mut cursor = id;
    while let Some(Some(parent)) = self.parents.get(&cursor) {
      if !seen.insert(*parent) {
        return Err(Error::CyclicDatasetLineage { version: cursor, parent: *parent });
      }
      chain.push(*parent);
      cursor = *parent;
    }
    Ok(chain)
  }

  /// Check that `child` may take `parent` as its parent, returning the
  /// resulting ancestor chain of `child` (nearest first).
  pub fn check_attach(&self, child: Uuid, parent: Uuid) -> Result<Vec<Uuid>> {
    if child == parent {
      return Err(Error::CyclicDatasetLineage { version: child, parent });
    }
    if !self.contains(parent) {
      return Err(Error::DatasetVersionNotFound(parent));
    }
    let mut chain = vec![parent];
    for ancestor in self.ancestors(parent)? {
      if ancestor == child {
        return Err(Error::CyclicDatasetLineage { version: child, parent });
      }
      chain.push(ancestor);
    }
    Ok(chain)
  }
}
