//! The judge registry.

use rusqlite::{Connection, OptionalExtension as _};
use serde_json::json;
use uuid::Uuid;
use verity_core::{
  audit::{Actor, NewAuditEntry},
  judge::{Judge, JudgeKey, JudgeProfile, JudgeStatus, NewJudge},
};

use crate::{
  Result,
  encode::{RawJudge, encode_dt, encode_uuid, now},
};

pub fn get_judge(conn: &Connection, id: Uuid) -> Result<Option<Judge>> {
  let sql = format!("SELECT {} FROM judges WHERE judge_id = ?1", RawJudge::COLUMNS);
  conn
    .query_row(&sql, [encode_uuid(id)], RawJudge::from_row)
    .optional()?
    .map(RawJudge::into_judge)
    .transpose()
}

pub fn register_judge(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  input: &NewJudge,
  actor: &Actor,
) -> Result<Judge> {
  input.validate()?;
  let identity = input.profile.identity();
  let impl_key = match &input.profile {
    JudgeProfile::Automated { impl_key, .. } => Some(impl_key.as_str()),
    JudgeProfile::Human { .. } => None,
  };

  let judge = Judge {
    judge_id:     Uuid::new_v4(),
    display_name: input.display_name.clone(),
    status:       JudgeStatus::Active,
    metadata:     input.metadata.clone(),
    profile:      input.profile.clone(),
    created_at:   now(),
  };

  let inserted = conn.execute(
    "INSERT INTO judges (
       judge_id, kind, identity, impl_key, display_name, status, metadata, profile, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
     ON CONFLICT (identity) DO NOTHING",
    rusqlite::params![
      encode_uuid(judge.judge_id),
      judge.kind().as_ref(),
      identity,
      impl_key,
      judge.display_name,
      judge.status.as_ref(),
      serde_json::to_string(&judge.metadata)?,
      serde_json::to_string(&judge.profile)?,
      encode_dt(judge.created_at),
    ],
  )?;
  if inserted == 0 {
    return Err(verity_core::Error::DuplicateJudge(identity).into());
  }

  audit.push(NewAuditEntry::new(
    "judge",
    judge.judge_id,
    "registered",
    actor,
    json!({ "identity": identity, "kind": judge.kind() }),
  ));
  Ok(judge)
}

/// Look a key up without the active check.
pub fn find_judge(conn: &Connection, key: &JudgeKey) -> Result<Option<Judge>> {
  let raw = match key {
    JudgeKey::Human { user_id } => {
      let sql = format!("SELECT {} FROM judges WHERE identity = ?1", RawJudge::COLUMNS);
      conn
        .query_row(&sql, [format!("human:{user_id}")], RawJudge::from_row)
        .optional()?
    }
    JudgeKey::Automated { impl_key, version: Some(version) } => {
      let sql = format!("SELECT {} FROM judges WHERE identity = ?1", RawJudge::COLUMNS);
      conn
        .query_row(&sql, [format!("automated:{impl_key}@{version}")], RawJudge::from_row)
        .optional()?
    }
    JudgeKey::Automated { impl_key, version: None } => {
      let sql = format!(
        "SELECT {} FROM judges
         WHERE kind = 'automated' AND impl_key = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT 1",
        RawJudge::COLUMNS
      );
      conn.query_row(&sql, [impl_key], RawJudge::from_row).optional()?
    }
  };
  raw.map(RawJudge::into_judge).transpose()
}

pub fn resolve_judge(conn: &Connection, key: &JudgeKey) -> Result<Judge> {
  let judge =
    find_judge(conn, key)?.ok_or_else(|| verity_core::Error::JudgeNotFound(key.to_string()))?;
  judge.ensure_active()?;
  Ok(judge)
}

pub fn set_judge_status(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  id: Uuid,
  status: JudgeStatus,
  actor: &Actor,
) -> Result<Judge> {
  let judge = get_judge(conn, id)?.ok_or_else(|| verity_core::Error::JudgeNotFound(id.to_string()))?;
  if judge.status == status {
    return Ok(judge);
  }
  conn.execute(
    "UPDATE judges SET status = ?2 WHERE judge_id = ?1",
    rusqlite::params![encode_uuid(id), status.as_ref()],
  )?;
  audit.push(NewAuditEntry::new(
    "judge",
    id,
    "status_changed",
    actor,
    json!({ "from": judge.status, "to": status }),
  ));
  Ok(Judge { status, ..judge })
}
