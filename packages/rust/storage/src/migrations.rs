//! SQL migration definitions for the run database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: runs, entries",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per pipeline run written to the database
CREATE TABLE IF NOT EXISTS runs (
    id           TEXT PRIMARY KEY,
    label        TEXT NOT NULL,
    field_order  TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);

-- Records of a run, as JSON objects
CREATE TABLE IF NOT EXISTS entries (
    run_id   TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    data     TEXT NOT NULL,
    PRIMARY KEY (run_id, position)
);

CREATE INDEX IF NOT EXISTS idx_runs_created_at ON runs(created_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
