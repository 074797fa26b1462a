//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings (microseconds,
//! `Z` suffix) so lexical order equals time order. Tagged payloads (article
//! context, judge profile, dataset spec) are stored as compact JSON. UUIDs are
//! stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;
use uuid::Uuid;
use verity_core::{
  article::{Article, ArticleVersion},
  assessment::RelevanceAssessment,
  audit::AuditEntry,
  content::ContentHash,
  dataset::{Dataset, DatasetEntry, DatasetVersion},
  import::ImportJob,
  judge::Judge,
  topic::{Topic, TopicVersion},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

/// The current time at storage precision.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

/// Decode a strum-backed enum column.
pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode { column, value: s.to_owned() })
}

fn decode_hash(s: &str) -> Result<ContentHash> {
  ContentHash::from_str(s).map_err(|_| Error::Decode { column: "content_hash", value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `Raw*` struct mirrors one table's `COLUMNS` list in order. `from_row`
// runs inside the connection closure; `into_*` decodes outside it.

pub struct RawArticle {
  pub article_id:        String,
  pub source_type:       String,
  pub external_key:      String,
  pub latest_version_id: String,
  pub status:            String,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawArticle {
  pub const COLUMNS: &'static str =
    "article_id, source_type, external_key, latest_version_id, status, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      article_id:        row.get(0)?,
      source_type:       row.get(1)?,
      external_key:      row.get(2)?,
      latest_version_id: row.get(3)?,
      status:            row.get(4)?,
      created_at:        row.get(5)?,
      updated_at:        row.get(6)?,
    })
  }

  pub fn into_article(self) -> Result<Article> {
    Ok(Article {
      article_id:        decode_uuid(&self.article_id)?,
      source_type:       decode_enum("source_type", &self.source_type)?,
      external_key:      self.external_key,
      latest_version_id: decode_uuid(&self.latest_version_id)?,
      status:            decode_enum("status", &self.status)?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawArticleVersion {
  pub version_id:   String,
  pub article_id:   String,
  pub text:         String,
  pub context:      String,
  pub language:     String,
  pub content_hash: String,
  pub observed_at:  String,
  pub created_at:   String,
}

impl RawArticleVersion {
  pub const COLUMNS: &'static str =
    "version_id, article_id, text, context, language, content_hash, observed_at, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:   row.get(0)?,
      article_id:   row.get(1)?,
      text:         row.get(2)?,
      context:      row.get(3)?,
      language:     row.get(4)?,
      content_hash: row.get(5)?,
      observed_at:  row.get(6)?,
      created_at:   row.get(7)?,
    })
  }

  pub fn into_version(self) -> Result<ArticleVersion> {
    Ok(ArticleVersion {
      version_id:   decode_uuid(&self.version_id)?,
      article_id:   decode_uuid(&self.article_id)?,
      text:         self.text,
      context:      serde_json::from_str(&self.context)?,
      language:     self.language,
      content_hash: decode_hash(&self.content_hash)?,
      observed_at:  decode_dt(&self.observed_at)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawTopic {
  pub topic_id:          String,
  pub key:               String,
  pub name:              String,
  pub status:            String,
  pub latest_version_id: String,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawTopic {
  pub const COLUMNS: &'static str =
    "topic_id, key, name, status, latest_version_id, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      topic_id:          row.get(0)?,
      key:               row.get(1)?,
      name:              row.get(2)?,
      status:            row.get(3)?,
      latest_version_id: row.get(4)?,
      created_at:        row.get(5)?,
      updated_at:        row.get(6)?,
    })
  }

  pub fn into_topic(self) -> Result<Topic> {
    Ok(Topic {
      topic_id:          decode_uuid(&self.topic_id)?,
      key:               self.key,
      name:              self.name,
      status:            decode_enum("status", &self.status)?,
      latest_version_id: decode_uuid(&self.latest_version_id)?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawTopicVersion {
  pub version_id:   String,
  pub topic_id:     String,
  pub definition:   String,
  pub content_hash: String,
  pub created_at:   String,
}

impl RawTopicVersion {
  pub const COLUMNS: &'static str = "version_id, topic_id, definition, content_hash, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:   row.get(0)?,
      topic_id:     row.get(1)?,
      definition:   row.get(2)?,
      content_hash: row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_version(self) -> Result<TopicVersion> {
    Ok(TopicVersion {
      version_id:   decode_uuid(&self.version_id)?,
      topic_id:     decode_uuid(&self.topic_id)?,
      definition:   self.definition,
      content_hash: decode_hash(&self.content_hash)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawJudge {
  pub judge_id:     String,
  pub display_name: String,
  pub status:       String,
  pub metadata:     String,
  pub profile:      String,
  pub created_at:   String,
}

impl RawJudge {
  pub const COLUMNS: &'static str = "judge_id, display_name, status, metadata, profile, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      judge_id:     row.get(0)?,
      display_name: row.get(1)?,
      status:       row.get(2)?,
      metadata:     row.get(3)?,
      profile:      row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_judge(self) -> Result<Judge> {
    Ok(Judge {
      judge_id:     decode_uuid(&self.judge_id)?,
      display_name: self.display_name,
      status:       decode_enum("status", &self.status)?,
      metadata:     serde_json::from_str(&self.metadata)?,
      profile:      serde_json::from_str(&self.profile)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAssessment {
  pub assessment_id:      String,
  pub judge_id:           String,
  pub topic_version_id:   String,
  pub article_version_id: String,
  pub label:              String,
  pub confidence:         Option<f64>,
  pub rationale:          Option<String>,
  pub supersedes_id:      Option<String>,
  pub version:            u32,
  pub created_at:         String,
}

impl RawAssessment {
  pub const COLUMNS: &'static str = "assessment_id, judge_id, topic_version_id, article_version_id, \
                                     label, confidence, rationale, supersedes_id, version, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assessment_id:      row.get(0)?,
      judge_id:           row.get(1)?,
      topic_version_id:   row.get(2)?,
      article_version_id: row.get(3)?,
      label:              row.get(4)?,
      confidence:         row.get(5)?,
      rationale:          row.get(6)?,
      supersedes_id:      row.get(7)?,
      version:            row.get(8)?,
      created_at:         row.get(9)?,
    })
  }

  pub fn into_assessment(self) -> Result<RelevanceAssessment> {
    Ok(RelevanceAssessment {
      assessment_id:      decode_uuid(&self.assessment_id)?,
      judge_id:           decode_uuid(&self.judge_id)?,
      topic_version_id:   decode_uuid(&self.topic_version_id)?,
      article_version_id: decode_uuid(&self.article_version_id)?,
      label:              decode_enum("label", &self.label)?,
      confidence:         self.confidence,
      rationale:          self.rationale,
      supersedes_id:      decode_opt_uuid(self.supersedes_id.as_deref())?,
      version:            self.version,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawDataset {
  pub dataset_id:  String,
  pub name:        String,
  pub description: Option<String>,
  pub purpose:     String,
  pub status:      String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawDataset {
  pub const COLUMNS: &'static str =
    "dataset_id, name, description, purpose, status, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      dataset_id:  row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      purpose:     row.get(3)?,
      status:      row.get(4)?,
      created_at:  row.get(5)?,
      updated_at:  row.get(6)?,
    })
  }

  pub fn into_dataset(self) -> Result<Dataset> {
    Ok(Dataset {
      dataset_id:  decode_uuid(&self.dataset_id)?,
      name:        self.name,
      description: self.description,
      purpose:     decode_enum("purpose", &self.purpose)?,
      status:      decode_enum("status", &self.status)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawDatasetVersion {
  pub version_id:        String,
  pub dataset_id:        String,
  pub version_number:    u32,
  pub kind:              String,
  pub spec:              String,
  pub parent_version_id: Option<String>,
  pub entry_count:       u64,
  pub frozen_at:         Option<String>,
  pub created_at:        String,
}

impl RawDatasetVersion {
  pub const COLUMNS: &'static str = "version_id, dataset_id, version_number, kind, spec, \
                                     parent_version_id, entry_count, frozen_at, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:        row.get(0)?,
      dataset_id:        row.get(1)?,
      version_number:    row.get(2)?,
      kind:              row.get(3)?,
      spec:              row.get(4)?,
      parent_version_id: row.get(5)?,
      entry_count:       row.get(6)?,
      frozen_at:         row.get(7)?,
      created_at:        row.get(8)?,
    })
  }

  pub fn into_version(self) -> Result<DatasetVersion> {
    Ok(DatasetVersion {
      version_id:        decode_uuid(&self.version_id)?,
      dataset_id:        decode_uuid(&self.dataset_id)?,
      version_number:    self.version_number,
      kind:              decode_enum("kind", &self.kind)?,
      spec:              serde_json::from_str(&self.spec)?,
      parent_version_id: decode_opt_uuid(self.parent_version_id.as_deref())?,
      entry_count:       self.entry_count,
      frozen_at:         decode_opt_dt(self.frozen_at.as_deref())?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawDatasetEntry {
  pub dataset_version_id: String,
  pub article_version_id: String,
  pub ordinal:            Option<u64>,
  pub added_at:           String,
}

impl RawDatasetEntry {
  pub const COLUMNS: &'static str = "dataset_version_id, article_version_id, ordinal, added_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      dataset_version_id: row.get(0)?,
      article_version_id: row.get(1)?,
      ordinal:            row.get(2)?,
      added_at:           row.get(3)?,
    })
  }

  pub fn into_entry(self) -> Result<DatasetEntry> {
    Ok(DatasetEntry {
      dataset_version_id: decode_uuid(&self.dataset_version_id)?,
      article_version_id: decode_uuid(&self.article_version_id)?,
      ordinal:            self.ordinal,
      added_at:           decode_dt(&self.added_at)?,
    })
  }
}

pub struct RawImportJob {
  pub import_id:      String,
  pub status:         String,
  pub total_rows:     usize,
  pub processed_rows: usize,
  pub errors:         String,
  pub created_at:     String,
  pub finished_at:    Option<String>,
}

impl RawImportJob {
  pub const COLUMNS: &'static str =
    "import_id, status, total_rows, processed_rows, errors, created_at, finished_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      import_id:      row.get(0)?,
      status:         row.get(1)?,
      total_rows:     row.get(2)?,
      processed_rows: row.get(3)?,
      errors:         row.get(4)?,
      created_at:     row.get(5)?,
      finished_at:    row.get(6)?,
    })
  }

  pub fn into_job(self) -> Result<ImportJob> {
    Ok(ImportJob {
      import_id:      decode_uuid(&self.import_id)?,
      status:         decode_enum("status", &self.status)?,
      total_rows:     self.total_rows,
      processed_rows: self.processed_rows,
      errors:         serde_json::from_str(&self.errors)?,
      created_at:     decode_dt(&self.created_at)?,
      finished_at:    decode_opt_dt(self.finished_at.as_deref())?,
    })
  }
}

pub struct RawAuditEntry {
  pub log_id:      String,
  pub entity_type: String,
  pub entity_id:   String,
  pub action:      String,
  pub actor_type:  String,
  pub actor_id:    Option<String>,
  pub changes:     String,
  pub created_at:  String,
}

impl RawAuditEntry {
  pub const COLUMNS: &'static str =
    "log_id, entity_type, entity_id, action, actor_type, actor_id, changes, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      log_id:      row.get(0)?,
      entity_type: row.get(1)?,
      entity_id:   row.get(2)?,
      action:      row.get(3)?,
      actor_type:  row.get(4)?,
      actor_id:    row.get(5)?,
      changes:     row.get(6)?,
      created_at:  row.get(7)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      log_id:      decode_uuid(&self.log_id)?,
      entity_type: self.entity_type,
      entity_id:   decode_uuid(&self.entity_id)?,
      action:      self.action,
      actor_type:  decode_enum("actor_type", &self.actor_type)?,
      actor_id:    self.actor_id,
      changes:     serde_json::from_str(&self.changes)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea, "2024-01-01T00:00:00.000000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn unknown_enum_value_is_a_decode_error() {
    let err = decode_enum::<verity_core::assessment::Label>("label", "maybe").unwrap_err();
    assert!(matches!(err, Error::Decode { column: "label", .. }));
  }
}
