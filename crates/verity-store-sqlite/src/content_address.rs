//! Create-or-reuse resolution for content-addressed version tables.
//!
//! Each table carries a `UNIQUE (scope, content_hash)` constraint. Resolution
//! attempts the insert with `ON CONFLICT DO NOTHING`; when nothing was inserted
//! the winning row is re-read by hash. Existing rows are never overwritten.

use rusqlite::{Connection, OptionalExtension as _};
use tracing::debug;
use uuid::Uuid;
use verity_core::content::ContentHash;

use crate::{
  Error, Result,
  encode::{decode_uuid, encode_uuid},
};

/// A table of immutable, content-addressed versions.
pub trait ContentTable {
  const TABLE: &'static str;
  /// Primary key column.
  const ID: &'static str;
  /// Column the hash is unique within.
  const SCOPE: &'static str;
}

pub struct ArticleVersions;

impl ContentTable for ArticleVersions {
  const TABLE: &'static str = "article_versions";
  const ID: &'static str = "version_id";
  const SCOPE: &'static str = "article_id";
}

pub struct TopicVersions;

impl ContentTable for TopicVersions {
  const TABLE: &'static str = "topic_versions";
  const ID: &'static str = "version_id";
  const SCOPE: &'static str = "topic_id";
}

pub fn find_by_hash<T: ContentTable>(
  conn: &Connection,
  scope: Uuid,
  hash: &ContentHash,
) -> Result<Option<Uuid>> {
  let sql = format!(
    "SELECT {id} FROM {table} WHERE {scope} = ?1 AND content_hash = ?2",
    id = T::ID,
    table = T::TABLE,
    scope = T::SCOPE,
  );
  let raw: Option<String> = conn
    .query_row(&sql, rusqlite::params![encode_uuid(scope), hash.to_hex()], |r| r.get(0))
    .optional()?;
  raw.as_deref().map(decode_uuid).transpose()
}

/// Resolve `(scope, hash)` to a version id.
///
/// `insert` receives a fresh candidate id and must insert the row with
/// `ON CONFLICT (scope, content_hash) DO NOTHING`, returning the affected row
/// count. Returns `(version_id, was_created)`.
pub fn resolve_or_create<T, F>(
  conn: &Connection,
  scope: Uuid,
  hash: &ContentHash,
  insert: F,
) -> Result<(Uuid, bool)>
where
  T: ContentTable,
  F: FnOnce(Uuid) -> Result<usize>,
{
  let candidate = Uuid::new_v4();
  if insert(candidate)? == 1 {
    return Ok((candidate, true));
  }

  let existing = find_by_hash::<T>(conn, scope, hash)?.ok_or_else(|| Error::Decode {
    column: "content_hash",
    value:  format!("{hash} conflicted in {} but was not found", T::TABLE),
  })?;
  debug!(table = T::TABLE, %existing, %hash, "content already stored, reusing version");
  Ok((existing, false))
}
