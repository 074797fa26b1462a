//! Append-only assessment chains.

use rusqlite::{Connection, OptionalExtension as _};
use serde_json::json;
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  article::ArticleStatus,
  assessment::{AssessmentKey, AssessmentQuery, NewAssessment, RelevanceAssessment},
  audit::{Actor, NewAuditEntry},
  store::Page,
  topic::TopicStatus,
};

use crate::{
  Result,
  encode::{RawAssessment, decode_uuid, encode_dt, encode_uuid, now},
  entities, judges,
};

fn key_params(key: &AssessmentKey) -> [String; 3] {
  [
    encode_uuid(key.judge_id),
    encode_uuid(key.topic_version_id),
    encode_uuid(key.article_version_id),
  ]
}

/// Check every precondition for a new judgment on `key`.
fn check_targets(conn: &Connection, key: &AssessmentKey) -> Result<()> {
  judges::get_judge(conn, key.judge_id)?
    .ok_or_else(|| CoreError::JudgeNotFound(key.judge_id.to_string()))?
    .ensure_active()?;

  let topic_version = entities::get_topic_version(conn, key.topic_version_id)?
    .ok_or(CoreError::TopicVersionNotFound(key.topic_version_id))?;
  let topic = entities::get_topic(conn, topic_version.topic_id)?
    .ok_or(CoreError::TopicNotFound(topic_version.topic_id))?;
  if topic.status != TopicStatus::Active {
    return Err(
      CoreError::TopicNotActive { topic: topic.topic_id, status: topic.status.as_ref().to_owned() }
        .into(),
    );
  }

  let article_version = entities::get_article_version(conn, key.article_version_id)?
    .ok_or(CoreError::ArticleVersionNotFound(key.article_version_id))?;
  let article = entities::get_article(conn, article_version.article_id)?
    .ok_or(CoreError::ArticleNotFound(article_version.article_id))?;
  if article.status == ArticleStatus::Deleted {
    return Err(CoreError::ArticleDeleted(article.article_id).into());
  }
  Ok(())
}

/// Append version `max + 1` for the input's key. Must run inside an
/// immediate transaction; a concurrent writer surfaces as a unique violation
/// on `(judge, topic_version, article_version, version)`.
pub fn record(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  input: &NewAssessment,
  actor: &Actor,
) -> Result<RelevanceAssessment> {
  input.validate()?;
  check_targets(conn, &input.key)?;

  let previous: Option<(String, u32)> = conn
    .query_row(
      "SELECT assessment_id, version FROM assessments
       WHERE judge_id = ?1 AND topic_version_id = ?2 AND article_version_id = ?3
       ORDER BY version DESC
       LIMIT 1",
      key_params(&input.key),
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;

  let (version, supersedes_id) = match previous {
    Some((id, version)) => (version + 1, Some(decode_uuid(&id)?)),
    None => (1, None),
  };

  let assessment = RelevanceAssessment {
    assessment_id:      Uuid::new_v4(),
    judge_id:           input.key.judge_id,
    topic_version_id:   input.key.topic_version_id,
    article_version_id: input.key.article_version_id,
    label:              input.label,
    confidence:         input.confidence,
    rationale:          input.rationale.clone(),
    supersedes_id,
    version,
    created_at:         now(),
  };

  conn.execute(
    "INSERT INTO assessments (
       assessment_id, judge_id, topic_version_id, article_version_id,
       label, confidence, rationale, supersedes_id, version, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(assessment.assessment_id),
      encode_uuid(assessment.judge_id),
      encode_uuid(assessment.topic_version_id),
      encode_uuid(assessment.article_version_id),
      assessment.label.as_ref(),
      assessment.confidence,
      assessment.rationale,
      assessment.supersedes_id.map(encode_uuid),
      assessment.version,
      encode_dt(assessment.created_at),
    ],
  )?;

  audit.push(NewAuditEntry::new(
    "assessment",
    assessment.assessment_id,
    if supersedes_id.is_some() { "superseded" } else { "created" },
    actor,
    json!({
      "version": version,
      "supersedes_id": supersedes_id,
      "label": assessment.label,
      "confidence": assessment.confidence,
    }),
  ));
  Ok(assessment)
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<RelevanceAssessment>> {
  let sql = format!(
    "SELECT {} FROM assessments WHERE assessment_id = ?1",
    RawAssessment::COLUMNS
  );
  conn
    .query_row(&sql, [encode_uuid(id)], RawAssessment::from_row)
    .optional()?
    .map(RawAssessment::into_assessment)
    .transpose()
}

pub fn latest(conn: &Connection, key: &AssessmentKey) -> Result<Option<RelevanceAssessment>> {
  let sql = format!(
    "SELECT {} FROM assessments
     WHERE judge_id = ?1 AND topic_version_id = ?2 AND article_version_id = ?3
     ORDER BY version DESC
     LIMIT 1",
    RawAssessment::COLUMNS
  );
  conn
    .query_row(&sql, key_params(key), RawAssessment::from_row)
    .optional()?
    .map(RawAssessment::into_assessment)
    .transpose()
}

pub fn history(conn: &Connection, key: &AssessmentKey) -> Result<Vec<RelevanceAssessment>> {
  let sql = format!(
    "SELECT {} FROM assessments
     WHERE judge_id = ?1 AND topic_version_id = ?2 AND article_version_id = ?3
     ORDER BY version ASC",
    RawAssessment::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(key_params(key), RawAssessment::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAssessment::into_assessment).collect()
}

/// Filter predicate shared by the page query and its count. `?1..?6` are the
/// optional filters, `?7` the latest-only flag.
const LIST_WHERE: &str = "
  WHERE (?1 IS NULL OR a.article_version_id = ?1)
    AND (?2 IS NULL OR tv.topic_id = ?2)
    AND (?3 IS NULL OR a.judge_id = ?3)
    AND (?4 IS NULL OR a.label = ?4)
    AND (?5 IS NULL OR a.created_at >= ?5)
    AND (?6 IS NULL OR a.created_at < ?6)
    AND (?7 = 0 OR a.version = (
      SELECT MAX(b.version) FROM assessments b
      WHERE b.judge_id = a.judge_id
        AND b.topic_version_id = a.topic_version_id
        AND b.article_version_id = a.article_version_id))";

pub fn list(conn: &Connection, query: &AssessmentQuery) -> Result<Page<RelevanceAssessment>> {
  let limit = query.effective_limit();
  let offset = query.effective_offset();
  let article_version_id = query.article_version_id.map(encode_uuid);
  let topic_id = query.topic_id.map(encode_uuid);
  let judge_id = query.judge_id.map(encode_uuid);
  let label = query.label.map(|l| l.as_ref().to_owned());
  let from = query.from.map(encode_dt);
  let to = query.to.map(encode_dt);

  let total: u64 = conn.query_row(
    &format!(
      "SELECT COUNT(*) FROM assessments a
       JOIN topic_versions tv ON tv.version_id = a.topic_version_id
       {LIST_WHERE}"
    ),
    rusqlite::params![article_version_id, topic_id, judge_id, label, from, to, query.latest_only],
    |r| r.get(0),
  )?;

  let columns = RawAssessment::COLUMNS
    .split(',')
    .map(|c| format!("a.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ");
  let sql = format!(
    "SELECT {columns} FROM assessments a
     JOIN topic_versions tv ON tv.version_id = a.topic_version_id
     {LIST_WHERE}
     ORDER BY a.created_at DESC, a.version DESC
     LIMIT ?8 OFFSET ?9"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(
      rusqlite::params![
        article_version_id,
        topic_id,
        judge_id,
        label,
        from,
        to,
        query.latest_only,
        limit as i64,
        offset as i64,
      ],
      RawAssessment::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(Page {
    items: raws.into_iter().map(RawAssessment::into_assessment).collect::<Result<_>>()?,
    total,
    limit,
    offset,
  })
}
