//! Audit log writes and reads.

use rusqlite::Connection;
use uuid::Uuid;
use verity_core::audit::{AuditEntry, NewAuditEntry};

use crate::{
  Result,
  encode::{RawAuditEntry, encode_dt, encode_uuid, now},
};

pub fn append(conn: &Connection, entries: &[NewAuditEntry]) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO audit_log (
       log_id, entity_type, entity_id, action, actor_type, actor_id, changes, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
  )?;
  let created_at = encode_dt(now());
  for entry in entries {
    stmt.execute(rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      entry.entity_type,
      encode_uuid(entry.entity_id),
      entry.action,
      entry.actor.actor_type.as_ref(),
      entry.actor.actor_id,
      serde_json::to_string(&entry.changes)?,
      created_at,
    ])?;
  }
  Ok(())
}

pub fn trail(conn: &Connection, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
  let sql = format!(
    "SELECT {} FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2
     ORDER BY created_at, rowid",
    RawAuditEntry::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(rusqlite::params![entity_type, encode_uuid(entity_id)], RawAuditEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAuditEntry::into_entry).collect()
}
