//! Versioned logical entities: articles and topics.

use rusqlite::{Connection, OptionalExtension as _};
use serde_json::json;
use uuid::Uuid;
use verity_core::{
  article::{Article, ArticleStatus, ArticleVersion, NewArticle, SourceType},
  audit::{Actor, NewAuditEntry},
  content::{Resolved, normalize_language},
  topic::{NewTopic, Topic, TopicStatus, TopicVersion},
};

use crate::{
  Result,
  content_address::{ArticleVersions, TopicVersions, resolve_or_create},
  encode::{
    RawArticle, RawArticleVersion, RawTopic, RawTopicVersion, encode_dt, encode_uuid, now,
  },
};

// ─── Articles ────────────────────────────────────────────────────────────────

pub fn get_article(conn: &Connection, id: Uuid) -> Result<Option<Article>> {
  let sql = format!("SELECT {} FROM articles WHERE article_id = ?1", RawArticle::COLUMNS);
  conn
    .query_row(&sql, [encode_uuid(id)], RawArticle::from_row)
    .optional()?
    .map(RawArticle::into_article)
    .transpose()
}

pub fn find_article(
  conn: &Connection,
  source_type: SourceType,
  external_key: &str,
) -> Result<Option<Article>> {
  let sql = format!(
    "SELECT {} FROM articles WHERE source_type = ?1 AND external_key = ?2",
    RawArticle::COLUMNS
  );
  conn
    .query_row(&sql, rusqlite::params![source_type.as_ref(), external_key], RawArticle::from_row)
    .optional()?
    .map(RawArticle::into_article)
    .transpose()
}

pub fn get_article_version(conn: &Connection, id: Uuid) -> Result<Option<ArticleVersion>> {
  let sql = format!(
    "SELECT {} FROM article_versions WHERE version_id = ?1",
    RawArticleVersion::COLUMNS
  );
  conn
    .query_row(&sql, [encode_uuid(id)], RawArticleVersion::from_row)
    .optional()?
    .map(RawArticleVersion::into_version)
    .transpose()
}

pub fn list_article_versions(conn: &Connection, article_id: Uuid) -> Result<Vec<ArticleVersion>> {
  let sql = format!(
    "SELECT {} FROM article_versions WHERE article_id = ?1 ORDER BY created_at, rowid",
    RawArticleVersion::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map([encode_uuid(article_id)], RawArticleVersion::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawArticleVersion::into_version).collect()
}

/// Resolve an article identity and its content, advancing `latest_version_id`
/// when the resolved version differs.
pub fn upsert_article(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  input: &NewArticle,
  actor: &Actor,
) -> Result<Resolved<ArticleVersion>> {
  input.content.validate()?;
  let source_type = input.source_type();
  let external_key = input.resolved_key()?;
  let hash = input.content.content_hash()?;
  let at = now();

  let existing = find_article(conn, source_type, &external_key)?;
  if let Some(article) = &existing
    && article.status == ArticleStatus::Deleted
  {
    return Err(verity_core::Error::ArticleDeleted(article.article_id).into());
  }
  let article_id = existing.as_ref().map_or_else(Uuid::new_v4, |a| a.article_id);

  let context = serde_json::to_string(&input.content.context)?;
  let language = normalize_language(&input.content.language);
  let observed_at = encode_dt(input.content.observed_at(at));
  let (version_id, was_created) =
    resolve_or_create::<ArticleVersions, _>(conn, article_id, &hash, |candidate| {
      Ok(conn.execute(
        "INSERT INTO article_versions (
           version_id, article_id, text, context, language, content_hash, observed_at, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (article_id, content_hash) DO NOTHING",
        rusqlite::params![
          encode_uuid(candidate),
          encode_uuid(article_id),
          input.content.text,
          context,
          language,
          hash.to_hex(),
          observed_at,
          encode_dt(at),
        ],
      )?)
    })?;

  match &existing {
    None => {
      conn.execute(
        "INSERT INTO articles (
           article_id, source_type, external_key, latest_version_id, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)",
        rusqlite::params![
          encode_uuid(article_id),
          source_type.as_ref(),
          external_key,
          encode_uuid(version_id),
          encode_dt(at),
        ],
      )?;
      audit.push(NewAuditEntry::new(
        "article",
        article_id,
        "created",
        actor,
        json!({ "source_type": source_type, "external_key": external_key }),
      ));
    }
    Some(article) if article.latest_version_id != version_id => {
      conn.execute(
        "UPDATE articles SET latest_version_id = ?2, updated_at = ?3 WHERE article_id = ?1",
        rusqlite::params![encode_uuid(article_id), encode_uuid(version_id), encode_dt(at)],
      )?;
      audit.push(NewAuditEntry::new(
        "article",
        article_id,
        "latest_version_changed",
        actor,
        json!({ "from": article.latest_version_id, "to": version_id }),
      ));
    }
    Some(_) => {}
  }

  if was_created {
    audit.push(NewAuditEntry::new(
      "article_version",
      version_id,
      "created",
      actor,
      json!({ "article_id": article_id, "content_hash": hash }),
    ));
  }

  let value = get_article_version(conn, version_id)?
    .ok_or(verity_core::Error::ArticleVersionNotFound(version_id))?;
  Ok(Resolved { value, was_created })
}

pub fn set_article_status(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  id: Uuid,
  status: ArticleStatus,
  actor: &Actor,
) -> Result<Article> {
  let article = get_article(conn, id)?.ok_or(verity_core::Error::ArticleNotFound(id))?;
  if article.status == status {
    return Ok(article);
  }
  let at = now();
  conn.execute(
    "UPDATE articles SET status = ?2, updated_at = ?3 WHERE article_id = ?1",
    rusqlite::params![encode_uuid(id), status.as_ref(), encode_dt(at)],
  )?;
  audit.push(NewAuditEntry::new(
    "article",
    id,
    "status_changed",
    actor,
    json!({ "from": article.status, "to": status }),
  ));
  Ok(Article { status, updated_at: at, ..article })
}

// ─── Topics ──────────────────────────────────────────────────────────────────

pub fn get_topic(conn: &Connection, id: Uuid) -> Result<Option<Topic>> {
  let sql = format!("SELECT {} FROM topics WHERE topic_id = ?1", RawTopic::COLUMNS);
  conn
    .query_row(&sql, [encode_uuid(id)], RawTopic::from_row)
    .optional()?
    .map(RawTopic::into_topic)
    .transpose()
}

fn find_topic(conn: &Connection, key: &str) -> Result<Option<Topic>> {
  let sql = format!("SELECT {} FROM topics WHERE key = ?1", RawTopic::COLUMNS);
  conn
    .query_row(&sql, [key], RawTopic::from_row)
    .optional()?
    .map(RawTopic::into_topic)
    .transpose()
}

pub fn get_topic_version(conn: &Connection, id: Uuid) -> Result<Option<TopicVersion>> {
  let sql = format!(
    "SELECT {} FROM topic_versions WHERE version_id = ?1",
    RawTopicVersion::COLUMNS
  );
  conn
    .query_row(&sql, [encode_uuid(id)], RawTopicVersion::from_row)
    .optional()?
    .map(RawTopicVersion::into_version)
    .transpose()
}

pub fn list_topics(conn: &Connection) -> Result<Vec<Topic>> {
  let sql = format!("SELECT {} FROM topics ORDER BY key", RawTopic::COLUMNS);
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map([], RawTopic::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTopic::into_topic).collect()
}

/// Resolve a topic by key. Archived topics accept neither new versions nor
/// renames.
pub fn upsert_topic(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  input: &NewTopic,
  actor: &Actor,
) -> Result<Resolved<TopicVersion>> {
  input.validate()?;
  let key = input.key.trim();
  let hash = input.content_hash();
  let at = now();

  let existing = find_topic(conn, key)?;
  if let Some(topic) = &existing
    && topic.status == TopicStatus::Archived
  {
    return Err(verity_core::Error::TopicArchived(topic.topic_id).into());
  }
  let topic_id = existing.as_ref().map_or_else(Uuid::new_v4, |t| t.topic_id);

  let (version_id, was_created) =
    resolve_or_create::<TopicVersions, _>(conn, topic_id, &hash, |candidate| {
      Ok(conn.execute(
        "INSERT INTO topic_versions (version_id, topic_id, definition, content_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (topic_id, content_hash) DO NOTHING",
        rusqlite::params![
          encode_uuid(candidate),
          encode_uuid(topic_id),
          input.definition,
          hash.to_hex(),
          encode_dt(at),
        ],
      )?)
    })?;

  match &existing {
    None => {
      conn.execute(
        "INSERT INTO topics (topic_id, key, name, status, latest_version_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        rusqlite::params![
          encode_uuid(topic_id),
          key,
          input.name,
          input.status.as_ref(),
          encode_uuid(version_id),
          encode_dt(at),
        ],
      )?;
      audit.push(NewAuditEntry::new(
        "topic",
        topic_id,
        "created",
        actor,
        json!({ "key": key, "status": input.status }),
      ));
    }
    Some(topic) if topic.latest_version_id != version_id || topic.name != input.name => {
      conn.execute(
        "UPDATE topics SET latest_version_id = ?2, name = ?3, updated_at = ?4 WHERE topic_id = ?1",
        rusqlite::params![
          encode_uuid(topic_id),
          encode_uuid(version_id),
          input.name,
          encode_dt(at),
        ],
      )?;
      audit.push(NewAuditEntry::new(
        "topic",
        topic_id,
        "updated",
        actor,
        json!({
          "latest_version": { "from": topic.latest_version_id, "to": version_id },
          "name": { "from": topic.name, "to": input.name },
        }),
      ));
    }
    Some(_) => {}
  }

  if was_created {
    audit.push(NewAuditEntry::new(
      "topic_version",
      version_id,
      "created",
      actor,
      json!({ "topic_id": topic_id, "content_hash": hash }),
    ));
  }

  let value = get_topic_version(conn, version_id)?
    .ok_or(verity_core::Error::TopicVersionNotFound(version_id))?;
  Ok(Resolved { value, was_created })
}

pub fn set_topic_status(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  id: Uuid,
  status: TopicStatus,
  actor: &Actor,
) -> Result<Topic> {
  let topic = get_topic(conn, id)?.ok_or(verity_core::Error::TopicNotFound(id))?;
  let next = topic.status.transition(status)?;
  if next == topic.status {
    return Ok(topic);
  }
  let at = now();
  conn.execute(
    "UPDATE topics SET status = ?2, updated_at = ?3 WHERE topic_id = ?1",
    rusqlite::params![encode_uuid(id), next.as_ref(), encode_dt(at)],
  )?;
  audit.push(NewAuditEntry::new(
    "topic",
    id,
    "status_changed",
    actor,
    json!({ "from": topic.status, "to": next }),
  ));
  Ok(Topic { status: next, updated_at: at, ..topic })
}
