//! SQL schema for the Verity SQLite store.
//!
//! Applied at connection startup when `PRAGMA user_version` is below
//! [`SCHEMA_VERSION`]. Future migrations will be gated on that number.

pub const SCHEMA_VERSION: i64 = 1;

/// Per-connection settings; run on every open.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
-- Articles and their versions reference each other; both sides are deferred
-- so identity and first version can be inserted in one transaction.
CREATE TABLE IF NOT EXISTS articles (
    article_id        TEXT PRIMARY KEY,
    source_type       TEXT NOT NULL,   -- 'news' | 'social' | 'csv' | 'manual'
    external_key      TEXT NOT NULL,
    latest_version_id TEXT NOT NULL
                      REFERENCES article_versions(version_id) DEFERRABLE INITIALLY DEFERRED,
    status            TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'deleted')),
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    UNIQUE (source_type, external_key)
);

CREATE TABLE IF NOT EXISTS article_versions (
    version_id   TEXT PRIMARY KEY,
    article_id   TEXT NOT NULL
                 REFERENCES articles(article_id) DEFERRABLE INITIALLY DEFERRED,
    text         TEXT NOT NULL,
    context      TEXT NOT NULL,   -- JSON ArticleContext
    language     TEXT NOT NULL,
    content_hash TEXT NOT NULL,   -- hex SHA-256
    observed_at  TEXT NOT NULL,   -- published_at, else created_at
    created_at   TEXT NOT NULL,
    UNIQUE (article_id, content_hash)
);

CREATE TABLE IF NOT EXISTS topics (
    topic_id          TEXT PRIMARY KEY,
    key               TEXT NOT NULL UNIQUE,
    name              TEXT NOT NULL,
    status            TEXT NOT NULL CHECK (status IN ('draft', 'active', 'archived')),
    latest_version_id TEXT NOT NULL
                      REFERENCES topic_versions(version_id) DEFERRABLE INITIALLY DEFERRED,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS topic_versions (
    version_id   TEXT PRIMARY KEY,
    topic_id     TEXT NOT NULL
                 REFERENCES topics(topic_id) DEFERRABLE INITIALLY DEFERRED,
    definition   TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE (topic_id, content_hash)
);

-- `identity` is 'human:<user_id>' or 'automated:<impl_key>@<version>'.
CREATE TABLE IF NOT EXISTS judges (
    judge_id     TEXT PRIMARY KEY,
    kind         TEXT NOT NULL CHECK (kind IN ('human', 'automated')),
    identity     TEXT NOT NULL UNIQUE,
    impl_key     TEXT,            -- automated judges only
    display_name TEXT NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
    metadata     TEXT NOT NULL DEFAULT 'null',
    profile      TEXT NOT NULL,   -- JSON JudgeProfile
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS judges_impl_idx ON judges(impl_key, created_at);

-- Assessments are strictly append-only.
CREATE TABLE IF NOT EXISTS assessments (
    assessment_id      TEXT PRIMARY KEY,
    judge_id           TEXT NOT NULL REFERENCES judges(judge_id),
    topic_version_id   TEXT NOT NULL REFERENCES topic_versions(version_id),
    article_version_id TEXT NOT NULL REFERENCES article_versions(version_id),
    label              TEXT NOT NULL CHECK (label IN ('relevant', 'not_relevant', 'unsure')),
    confidence         REAL CHECK (confidence IS NULL OR (confidence >= 0.0 AND confidence <= 1.0)),
    rationale          TEXT,
    supersedes_id      TEXT REFERENCES assessments(assessment_id),
    version            INTEGER NOT NULL CHECK (version >= 1),
    created_at         TEXT NOT NULL,
    CHECK ((version = 1) = (supersedes_id IS NULL))
);

CREATE UNIQUE INDEX IF NOT EXISTS assessments_key_version_idx
    ON assessments(judge_id, topic_version_id, article_version_id, version DESC);
CREATE INDEX IF NOT EXISTS assessments_article_idx ON assessments(article_version_id);
CREATE INDEX IF NOT EXISTS assessments_created_idx ON assessments(created_at);

CREATE TRIGGER IF NOT EXISTS assessments_no_update BEFORE UPDATE ON assessments
BEGIN
    SELECT RAISE(ABORT, 'assessments are append-only');
END;

CREATE TRIGGER IF NOT EXISTS assessments_no_delete BEFORE DELETE ON assessments
BEGIN
    SELECT RAISE(ABORT, 'assessments are append-only');
END;

CREATE TABLE IF NOT EXISTS datasets (
    dataset_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT,
    purpose     TEXT NOT NULL CHECK (purpose IN ('corpus', 'analysis', 'training', 'evaluation')),
    status      TEXT NOT NULL CHECK (status IN ('active', 'frozen', 'archived')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dataset_versions (
    version_id        TEXT PRIMARY KEY,
    dataset_id        TEXT NOT NULL REFERENCES datasets(dataset_id),
    version_number    INTEGER NOT NULL CHECK (version_number >= 1),
    kind              TEXT NOT NULL CHECK (kind IN ('base', 'derived')),
    spec              TEXT NOT NULL,   -- JSON DatasetSpec, seed resolved
    parent_version_id TEXT REFERENCES dataset_versions(version_id),
    entry_count       INTEGER NOT NULL DEFAULT 0 CHECK (entry_count >= 0),
    frozen_at         TEXT,
    created_at        TEXT NOT NULL,
    UNIQUE (dataset_id, version_number),
    CHECK ((kind = 'derived') = (parent_version_id IS NOT NULL)),
    CHECK (parent_version_id IS NULL OR parent_version_id != version_id)
);

CREATE INDEX IF NOT EXISTS dataset_versions_parent_idx ON dataset_versions(parent_version_id);

CREATE TABLE IF NOT EXISTS dataset_entries (
    dataset_version_id TEXT NOT NULL REFERENCES dataset_versions(version_id),
    article_version_id TEXT NOT NULL REFERENCES article_versions(version_id),
    ordinal            INTEGER,
    added_at           TEXT NOT NULL,
    PRIMARY KEY (dataset_version_id, article_version_id)
) WITHOUT ROWID;

-- Backstops for the frozen check the store performs in-transaction.
CREATE TRIGGER IF NOT EXISTS dataset_entries_frozen_insert BEFORE INSERT ON dataset_entries
WHEN (SELECT frozen_at FROM dataset_versions WHERE version_id = NEW.dataset_version_id) IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'dataset version is frozen');
END;

CREATE TRIGGER IF NOT EXISTS dataset_entries_frozen_delete BEFORE DELETE ON dataset_entries
WHEN (SELECT frozen_at FROM dataset_versions WHERE version_id = OLD.dataset_version_id) IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'dataset version is frozen');
END;

CREATE TRIGGER IF NOT EXISTS dataset_versions_stay_frozen BEFORE UPDATE ON dataset_versions
WHEN OLD.frozen_at IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'dataset version is frozen');
END;

CREATE TABLE IF NOT EXISTS idempotency_keys (
    event_key   TEXT PRIMARY KEY,
    admitted_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS import_jobs (
    import_id      TEXT PRIMARY KEY,
    status         TEXT NOT NULL CHECK (status IN ('processing', 'completed', 'failed', 'duplicate')),
    total_rows     INTEGER NOT NULL,
    processed_rows INTEGER NOT NULL DEFAULT 0,
    errors         TEXT NOT NULL DEFAULT '[]',   -- JSON [{row, error}]
    created_at     TEXT NOT NULL,
    finished_at    TEXT
);

-- The audit log is strictly append-only.
CREATE TABLE IF NOT EXISTS audit_log (
    log_id      TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    action      TEXT NOT NULL,
    actor_type  TEXT NOT NULL CHECK (actor_type IN ('user', 'judge', 'system')),
    actor_id    TEXT,
    changes     TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS audit_entity_idx ON audit_log(entity_type, entity_id, created_at);

CREATE TRIGGER IF NOT EXISTS audit_log_no_update BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;

PRAGMA user_version = 1;
";
