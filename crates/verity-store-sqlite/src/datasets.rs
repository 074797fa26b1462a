//! Dataset derivation, curation and freezing.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use verity_core::{
  Error as CoreError,
  article::SourceType,
  audit::{Actor, NewAuditEntry},
  dataset::{
    CandidateAssessment, Dataset, DatasetEntry, DatasetSpec, DatasetStatus, DatasetVersion,
    LineageArena, NewDataset, SubsetSpec, TimeSliceSpec, select_candidates,
  },
  sampling,
  store::CreatedDataset,
};

use crate::{
  Result,
  encode::{
    RawDataset, RawDatasetEntry, RawDatasetVersion, decode_dt, decode_enum, decode_opt_uuid,
    decode_uuid, encode_dt, encode_uuid, now,
  },
};

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn get_dataset(conn: &Connection, id: Uuid) -> Result<Option<Dataset>> {
  let sql = format!("SELECT {} FROM datasets WHERE dataset_id = ?1", RawDataset::COLUMNS);
  conn
    .query_row(&sql, [encode_uuid(id)], RawDataset::from_row)
    .optional()?
    .map(RawDataset::into_dataset)
    .transpose()
}

pub fn get_version(conn: &Connection, id: Uuid) -> Result<Option<DatasetVersion>> {
  let sql = format!(
    "SELECT {} FROM dataset_versions WHERE version_id = ?1",
    RawDatasetVersion::COLUMNS
  );
  conn
    .query_row(&sql, [encode_uuid(id)], RawDatasetVersion::from_row)
    .optional()?
    .map(RawDatasetVersion::into_version)
    .transpose()
}

fn require_version(conn: &Connection, id: Uuid) -> Result<DatasetVersion> {
  Ok(get_version(conn, id)?.ok_or(CoreError::DatasetVersionNotFound(id))?)
}

pub fn list_versions(conn: &Connection, dataset_id: Uuid) -> Result<Vec<DatasetVersion>> {
  let sql = format!(
    "SELECT {} FROM dataset_versions WHERE dataset_id = ?1 ORDER BY version_number",
    RawDatasetVersion::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map([encode_uuid(dataset_id)], RawDatasetVersion::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawDatasetVersion::into_version).collect()
}

pub fn latest_version(conn: &Connection, dataset_id: Uuid) -> Result<Option<DatasetVersion>> {
  let sql = format!(
    "SELECT {} FROM dataset_versions WHERE dataset_id = ?1
     ORDER BY version_number DESC
     LIMIT 1",
    RawDatasetVersion::COLUMNS
  );
  conn
    .query_row(&sql, [encode_uuid(dataset_id)], RawDatasetVersion::from_row)
    .optional()?
    .map(RawDatasetVersion::into_version)
    .transpose()
}

pub fn list_entries(conn: &Connection, version_id: Uuid) -> Result<Vec<DatasetEntry>> {
  let sql = format!(
    "SELECT {} FROM dataset_entries WHERE dataset_version_id = ?1
     ORDER BY ordinal, article_version_id",
    RawDatasetEntry::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map([encode_uuid(version_id)], RawDatasetEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawDatasetEntry::into_entry).collect()
}

fn get_entry(
  conn: &Connection,
  version_id: Uuid,
  article_version_id: Uuid,
) -> Result<Option<DatasetEntry>> {
  let sql = format!(
    "SELECT {} FROM dataset_entries WHERE dataset_version_id = ?1 AND article_version_id = ?2",
    RawDatasetEntry::COLUMNS
  );
  conn
    .query_row(
      &sql,
      [encode_uuid(version_id), encode_uuid(article_version_id)],
      RawDatasetEntry::from_row,
    )
    .optional()?
    .map(RawDatasetEntry::into_entry)
    .transpose()
}

/// The whole version tree as an id arena.
fn lineage_arena(conn: &Connection) -> Result<LineageArena> {
  let mut stmt = conn.prepare("SELECT version_id, parent_version_id FROM dataset_versions")?;
  let raws = stmt
    .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let pairs = raws
    .iter()
    .map(|(id, parent)| Ok((decode_uuid(id)?, decode_opt_uuid(parent.as_deref())?)))
    .collect::<Result<Vec<_>>>()?;
  Ok(LineageArena::new(pairs))
}

pub fn lineage(conn: &Connection, version_id: Uuid) -> Result<Vec<DatasetVersion>> {
  let arena = lineage_arena(conn)?;
  if !arena.contains(version_id) {
    return Err(CoreError::DatasetVersionNotFound(version_id).into());
  }
  arena
    .ancestors(version_id)?
    .into_iter()
    .map(|id| require_version(conn, id))
    .collect()
}

// ─── Derivation ──────────────────────────────────────────────────────────────

/// Latest article versions of non-deleted articles inside the time slice, in
/// observation order.
fn base_members(conn: &Connection, spec: &TimeSliceSpec) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare(
    "SELECT v.version_id, v.observed_at, a.source_type, v.language
     FROM articles a
     JOIN article_versions v ON v.version_id = a.latest_version_id
     WHERE a.status = 'active' AND v.observed_at >= ?1 AND v.observed_at < ?2
     ORDER BY v.observed_at, v.version_id",
  )?;
  let raws = stmt
    .query_map([encode_dt(spec.from), encode_dt(spec.to)], |r| {
      Ok((
        r.get::<_, String>(0)?,
        r.get::<_, String>(1)?,
        r.get::<_, String>(2)?,
        r.get::<_, String>(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut members = Vec::with_capacity(raws.len());
  for (id, observed_at, source_type, language) in raws {
    let source_type: SourceType = decode_enum("source_type", &source_type)?;
    if spec.admits(decode_dt(&observed_at)?, source_type, &language) {
      members.push(decode_uuid(&id)?);
    }
  }
  Ok(members)
}

/// Latest-version assessments on the entries of `version_id`.
fn latest_assessments_on(conn: &Connection, version_id: Uuid) -> Result<Vec<CandidateAssessment>> {
  let mut stmt = conn.prepare(
    "SELECT a.article_version_id, tv.topic_id, a.topic_version_id, a.judge_id,
            a.label, a.confidence, a.created_at
     FROM dataset_entries e
     JOIN assessments a     ON a.article_version_id = e.article_version_id
     JOIN topic_versions tv ON tv.version_id = a.topic_version_id
     WHERE e.dataset_version_id = ?1
       AND a.version = (
         SELECT MAX(b.version) FROM assessments b
         WHERE b.judge_id = a.judge_id
           AND b.topic_version_id = a.topic_version_id
           AND b.article_version_id = a.article_version_id)",
  )?;
  let raws = stmt
    .query_map([encode_uuid(version_id)], |r| {
      Ok((
        r.get::<_, String>(0)?,
        r.get::<_, String>(1)?,
        r.get::<_, String>(2)?,
        r.get::<_, String>(3)?,
        r.get::<_, String>(4)?,
        r.get::<_, Option<f64>>(5)?,
        r.get::<_, String>(6)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws
    .into_iter()
    .map(|(av, topic, tv, judge, label, confidence, created_at)| {
      Ok(CandidateAssessment {
        article_version_id: decode_uuid(&av)?,
        topic_id:           decode_uuid(&topic)?,
        topic_version_id:   decode_uuid(&tv)?,
        judge_id:           decode_uuid(&judge)?,
        label:              decode_enum("label", &label)?,
        confidence,
        created_at:         decode_dt(&created_at)?,
      })
    })
    .collect()
}

/// Entries of a derived version: filter the parent, then sample. Resolves the
/// sampling seed in `spec`.
fn subset_members(conn: &Connection, spec: &mut SubsetSpec) -> Result<Vec<Uuid>> {
  let parent = spec.parent_dataset_version_id;
  let parent_entries: Vec<Uuid> =
    list_entries(conn, parent)?.into_iter().map(|e| e.article_version_id).collect();
  let latest = latest_assessments_on(conn, parent)?;
  let candidates = select_candidates(&parent_entries, &latest, &spec.filters);

  let seed = spec.resolve_seed();
  let members = match (seed, &spec.sample) {
    (Some(seed), Some(sample)) => sampling::sample(&candidates, sample.method, sample.size, seed),
    _ => candidates.into_iter().map(|c| c.article_version_id).collect(),
  };
  Ok(members)
}

fn refresh_entry_count(conn: &Connection, version_id: Uuid) -> Result<u64> {
  let id = encode_uuid(version_id);
  conn.execute(
    "UPDATE dataset_versions
     SET entry_count = (SELECT COUNT(*) FROM dataset_entries WHERE dataset_version_id = ?1)
     WHERE version_id = ?1",
    [&id],
  )?;
  Ok(conn.query_row(
    "SELECT entry_count FROM dataset_versions WHERE version_id = ?1",
    [&id],
    |r| r.get(0),
  )?)
}

/// Insert `members` in order as the entries of `version_id`; returns the
/// refreshed entry count.
fn insert_entries(
  conn: &Connection,
  version_id: Uuid,
  members: &[Uuid],
  at: DateTime<Utc>,
) -> Result<u64> {
  {
    let mut insert = conn.prepare(
      "INSERT INTO dataset_entries (dataset_version_id, article_version_id, ordinal, added_at)
       VALUES (?1, ?2, ?3, ?4)",
    )?;
    let version = encode_uuid(version_id);
    let added_at = encode_dt(at);
    for (ordinal, article_version_id) in members.iter().enumerate() {
      insert.execute(rusqlite::params![
        version,
        encode_uuid(*article_version_id),
        ordinal as i64,
        added_at,
      ])?;
    }
  }
  refresh_entry_count(conn, version_id)
}

/// Build and insert one version, entries included.
fn materialize(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  dataset_id: Uuid,
  version_number: u32,
  mut spec: DatasetSpec,
  actor: &Actor,
) -> Result<DatasetVersion> {
  spec.validate()?;
  let version_id = Uuid::new_v4();

  let members = match &mut spec {
    DatasetSpec::TimeSlice(ts) => base_members(conn, ts)?,
    DatasetSpec::Subset(subset) => {
      require_version(conn, subset.parent_dataset_version_id)?;
      lineage_arena(conn)?.check_attach(version_id, subset.parent_dataset_version_id)?;
      subset_members(conn, subset)?
    }
  };

  let at = now();
  conn.execute(
    "INSERT INTO dataset_versions (
       version_id, dataset_id, version_number, kind, spec, parent_version_id, entry_count, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
    rusqlite::params![
      encode_uuid(version_id),
      encode_uuid(dataset_id),
      version_number,
      spec.kind().as_ref(),
      serde_json::to_string(&spec)?,
      spec.parent_version_id().map(encode_uuid),
      encode_dt(at),
    ],
  )?;

  let entry_count = insert_entries(conn, version_id, &members, at)?;

  info!(
    %dataset_id,
    %version_id,
    version_number,
    entry_count,
    kind = spec.kind().as_ref(),
    "materialized dataset version"
  );
  audit.push(NewAuditEntry::new(
    "dataset_version",
    version_id,
    "created",
    actor,
    json!({
      "dataset_id": dataset_id,
      "version_number": version_number,
      "kind": spec.kind(),
      "parent_version_id": spec.parent_version_id(),
      "entry_count": entry_count,
    }),
  ));

  Ok(DatasetVersion {
    version_id,
    dataset_id,
    version_number,
    kind:              spec.kind(),
    parent_version_id: spec.parent_version_id(),
    spec,
    entry_count,
    frozen_at:         None,
    created_at:        at,
  })
}

pub fn create_dataset(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  input: NewDataset,
  actor: &Actor,
) -> Result<CreatedDataset> {
  input.validate()?;
  let at = now();
  let dataset = Dataset {
    dataset_id:  Uuid::new_v4(),
    name:        input.name.trim().to_owned(),
    description: input.description,
    purpose:     input.purpose,
    status:      DatasetStatus::Active,
    created_at:  at,
    updated_at:  at,
  };

  let inserted = conn.execute(
    "INSERT INTO datasets (dataset_id, name, description, purpose, status, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
     ON CONFLICT (name) DO NOTHING",
    rusqlite::params![
      encode_uuid(dataset.dataset_id),
      dataset.name,
      dataset.description,
      dataset.purpose.as_ref(),
      dataset.status.as_ref(),
      encode_dt(at),
    ],
  )?;
  if inserted == 0 {
    return Err(CoreError::DuplicateDataset(dataset.name).into());
  }
  audit.push(NewAuditEntry::new(
    "dataset",
    dataset.dataset_id,
    "created",
    actor,
    json!({ "name": dataset.name, "purpose": dataset.purpose }),
  ));

  let version = materialize(conn, audit, dataset.dataset_id, 1, input.spec, actor)?;
  Ok(CreatedDataset { dataset, version })
}

pub fn append_version(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  dataset_id: Uuid,
  spec: DatasetSpec,
  actor: &Actor,
) -> Result<DatasetVersion> {
  let dataset = get_dataset(conn, dataset_id)?.ok_or(CoreError::DatasetNotFound(dataset_id))?;
  if dataset.status != DatasetStatus::Active {
    return Err(
      CoreError::DatasetNotActive { dataset: dataset_id, status: dataset.status.as_ref().to_owned() }
        .into(),
    );
  }
  let next: u32 = conn.query_row(
    "SELECT COALESCE(MAX(version_number), 0) + 1 FROM dataset_versions WHERE dataset_id = ?1",
    [encode_uuid(dataset_id)],
    |r| r.get(0),
  )?;
  materialize(conn, audit, dataset_id, next, spec, actor)
}

// ─── Curation ────────────────────────────────────────────────────────────────

pub fn add_entry(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  version_id: Uuid,
  article_version_id: Uuid,
  actor: &Actor,
) -> Result<DatasetEntry> {
  require_version(conn, version_id)?.ensure_mutable()?;
  crate::entities::get_article_version(conn, article_version_id)?
    .ok_or(CoreError::ArticleVersionNotFound(article_version_id))?;

  let inserted = conn.execute(
    "INSERT INTO dataset_entries (dataset_version_id, article_version_id, ordinal, added_at)
     SELECT ?1, ?2, COALESCE(MAX(ordinal) + 1, 0), ?3
     FROM dataset_entries WHERE dataset_version_id = ?1
     ON CONFLICT (dataset_version_id, article_version_id) DO NOTHING",
    rusqlite::params![encode_uuid(version_id), encode_uuid(article_version_id), encode_dt(now())],
  )?;
  if inserted == 1 {
    let entry_count = refresh_entry_count(conn, version_id)?;
    audit.push(NewAuditEntry::new(
      "dataset_version",
      version_id,
      "entry_added",
      actor,
      json!({ "article_version_id": article_version_id, "entry_count": entry_count }),
    ));
  }

  Ok(
    get_entry(conn, version_id, article_version_id)?
      .ok_or(CoreError::ArticleVersionNotFound(article_version_id))?,
  )
}

pub fn remove_entry(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  version_id: Uuid,
  article_version_id: Uuid,
  actor: &Actor,
) -> Result<bool> {
  require_version(conn, version_id)?.ensure_mutable()?;
  let removed = conn.execute(
    "DELETE FROM dataset_entries WHERE dataset_version_id = ?1 AND article_version_id = ?2",
    [encode_uuid(version_id), encode_uuid(article_version_id)],
  )?;
  if removed == 0 {
    return Ok(false);
  }
  let entry_count = refresh_entry_count(conn, version_id)?;
  audit.push(NewAuditEntry::new(
    "dataset_version",
    version_id,
    "entry_removed",
    actor,
    json!({ "article_version_id": article_version_id, "entry_count": entry_count }),
  ));
  Ok(true)
}

/// Re-parent an unfrozen derived version and rebuild its entries from the
/// new parent, so spec, lineage and contents stay in agreement. Manual
/// curation on the version is discarded.
pub fn set_version_parent(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  version_id: Uuid,
  parent_id: Uuid,
  actor: &Actor,
) -> Result<DatasetVersion> {
  let mut version = require_version(conn, version_id)?;
  version.ensure_mutable()?;
  let DatasetSpec::Subset(subset) = &mut version.spec else {
    return Err(CoreError::InvalidSpec("base versions have no parent".into()).into());
  };
  require_version(conn, parent_id)?;
  lineage_arena(conn)?.check_attach(version_id, parent_id)?;

  let previous = version.parent_version_id;
  subset.parent_dataset_version_id = parent_id;
  let members = subset_members(conn, subset)?;
  version.parent_version_id = Some(parent_id);

  conn.execute(
    "DELETE FROM dataset_entries WHERE dataset_version_id = ?1",
    [encode_uuid(version_id)],
  )?;
  conn.execute(
    "UPDATE dataset_versions SET parent_version_id = ?2, spec = ?3 WHERE version_id = ?1",
    rusqlite::params![
      encode_uuid(version_id),
      encode_uuid(parent_id),
      serde_json::to_string(&version.spec)?,
    ],
  )?;
  version.entry_count = insert_entries(conn, version_id, &members, now())?;

  audit.push(NewAuditEntry::new(
    "dataset_version",
    version_id,
    "parent_changed",
    actor,
    json!({ "from": previous, "to": parent_id, "entry_count": version.entry_count }),
  ));
  Ok(version)
}

// ─── Freeze & status ─────────────────────────────────────────────────────────

pub fn freeze_version(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  version_id: Uuid,
  actor: &Actor,
) -> Result<DatasetVersion> {
  let version = require_version(conn, version_id)?;
  if version.is_frozen() {
    // The dataset may have been reopened since; re-freezing moves it back.
    set_dataset_status(conn, audit, version.dataset_id, DatasetStatus::Frozen, actor)?;
    return Ok(version);
  }

  let at = now();
  conn.execute(
    "UPDATE dataset_versions SET frozen_at = ?2 WHERE version_id = ?1",
    [encode_uuid(version_id), encode_dt(at)],
  )?;
  audit.push(NewAuditEntry::new(
    "dataset_version",
    version_id,
    "frozen",
    actor,
    json!({ "frozen_at": at, "entry_count": version.entry_count }),
  ));
  set_dataset_status(conn, audit, version.dataset_id, DatasetStatus::Frozen, actor)?;

  info!(
    dataset_id = %version.dataset_id,
    %version_id,
    entry_count = version.entry_count,
    "froze dataset version"
  );
  Ok(DatasetVersion { frozen_at: Some(at), ..version })
}

pub fn set_dataset_status(
  conn: &Connection,
  audit: &mut Vec<NewAuditEntry>,
  id: Uuid,
  status: DatasetStatus,
  actor: &Actor,
) -> Result<Dataset> {
  let dataset = get_dataset(conn, id)?.ok_or(CoreError::DatasetNotFound(id))?;
  let next = dataset.status.transition(status)?;
  if next == dataset.status {
    return Ok(dataset);
  }
  let at = now();
  conn.execute(
    "UPDATE datasets SET status = ?2, updated_at = ?3 WHERE dataset_id = ?1",
    rusqlite::params![encode_uuid(id), next.as_ref(), encode_dt(at)],
  )?;
  audit.push(NewAuditEntry::new(
    "dataset",
    id,
    "status_changed",
    actor,
    json!({ "from": dataset.status, "to": next }),
  ));
  Ok(Dataset { status: next, updated_at: at, ..dataset })
}
