//! libSQL storage layer (offline mode) and output sinks.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! pipeline run and one JSON document per record of that run. Together with
//! [`JsonLinesSink`] and [`CsvSink`] it implements the [`Sink`] contract the
//! CLI writes pipeline output through.
//!
//! **Access rules:**
//! - `run` writes through [`Storage::open`]
//! - `runs` lists through [`Storage::open_readonly`]

mod migrations;
mod sink;

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use hanjadeck_shared::{HanjaDeckError, Record, Result};
use libsql::{Connection, Database, params};
use tracing::{debug, instrument};
use uuid::Uuid;

pub use sink::{CsvSink, JsonLinesSink, Sink};

/// Label of runs written without an explicit one.
pub const DEFAULT_RUN_LABEL: &str = "run";

/// A stored run, as listed by [`Storage::list_runs`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: String,
    pub label: String,
    pub field_order: Vec<String>,
    pub record_count: u64,
    pub created_at: String,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    label: String,
}

fn storage_err(e: impl std::fmt::Display) -> HanjaDeckError {
    HanjaDeckError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HanjaDeckError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
            label: DEFAULT_RUN_LABEL.to_string(),
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HanjaDeckError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            label: DEFAULT_RUN_LABEL.to_string(),
        })
    }

    /// Set the label runs written through [`Sink::write`] are stored under.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    HanjaDeckError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(HanjaDeckError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Insert a run row and return its id.
    pub async fn insert_run(
        &self,
        label: &str,
        field_order: &[String],
        record_count: usize,
    ) -> Result<String> {
        self.check_writable()?;
        insert_run_row(&self.conn, label, field_order, record_count).await
    }

    /// Store a run row and all its records in one transaction. On failure
    /// nothing of the run is kept.
    #[instrument(skip_all, fields(label = %label, records = records.len()))]
    pub async fn store_run(
        &self,
        label: &str,
        field_order: &[String],
        records: &[Record],
    ) -> Result<String> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        let written = async {
            let run_id = insert_run_row(&tx, label, field_order, records.len()).await?;
            insert_entry_rows(&tx, &run_id, records).await?;
            Ok::<_, HanjaDeckError>(run_id)
        }
        .await;

        match written {
            Ok(run_id) => {
                tx.commit().await.map_err(storage_err)?;
                Ok(run_id)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// List runs, newest first.
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, label, field_order, record_count, created_at
                 FROM runs ORDER BY created_at DESC, id DESC",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let order_json = row.get::<String>(2).map_err(storage_err)?;
            runs.push(RunSummary {
                id: row.get::<String>(0).map_err(storage_err)?,
                label: row.get::<String>(1).map_err(storage_err)?,
                field_order: serde_json::from_str(&order_json)
                    .map_err(|e| HanjaDeckError::parse(format!("run field order: {e}")))?,
                record_count: row.get::<i64>(3).map_err(storage_err)?.max(0) as u64,
                created_at: row.get::<String>(4).map_err(storage_err)?,
            });
        }
        Ok(runs)
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunSummary>> {
        Ok(self
            .list_runs()
            .await?
            .into_iter()
            .find(|run| run.id == run_id))
    }

    // -----------------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------------

    /// Store `records` under `run_id`, in order, in a single transaction.
    #[instrument(skip_all, fields(run_id = %run_id, records = records.len()))]
    pub async fn insert_entries(&self, run_id: &str, records: &[Record]) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        match insert_entry_rows(&tx, run_id, records).await {
            Ok(()) => tx.commit().await.map_err(storage_err)?,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        }
        debug!("entries stored");
        Ok(())
    }

    /// Records of a run in their original order, holding only the run's
    /// stored field order.
    pub async fn entries_for_run(&self, run_id: &str) -> Result<Vec<Record>> {
        let run = self
            .get_run(run_id)
            .await?
            .ok_or_else(|| HanjaDeckError::Storage(format!("no such run: {run_id}")))?;

        let mut rows = self
            .conn
            .query(
                "SELECT data FROM entries WHERE run_id = ?1 ORDER BY position",
                params![run_id],
            )
            .await
            .map_err(storage_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let data = row.get::<String>(0).map_err(storage_err)?;
            let record: Record = serde_json::from_str(&data)
                .map_err(|e| HanjaDeckError::parse(format!("stored entry: {e}")))?;
            records.push(record.select(&run.field_order));
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Row helpers, shared by plain and transactional writes
// ---------------------------------------------------------------------------

async fn insert_run_row(
    conn: &Connection,
    label: &str,
    field_order: &[String],
    record_count: usize,
) -> Result<String> {
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();
    let order_json =
        serde_json::to_string(field_order).map_err(|e| HanjaDeckError::parse(e.to_string()))?;

    conn.execute(
        "INSERT INTO runs (id, label, field_order, record_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.as_str(),
            label,
            order_json.as_str(),
            record_count as i64,
            now.as_str()
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(id)
}

async fn insert_entry_rows(conn: &Connection, run_id: &str, records: &[Record]) -> Result<()> {
    for (position, record) in records.iter().enumerate() {
        let data =
            serde_json::to_string(record).map_err(|e| HanjaDeckError::parse(e.to_string()))?;
        conn.execute(
            "INSERT INTO entries (run_id, position, data) VALUES (?1, ?2, ?3)",
            params![run_id, position as i64, data.as_str()],
        )
        .await
        .map_err(storage_err)?;
    }
    Ok(())
}

#[async_trait]
impl Sink for Storage {
    async fn write(&self, field_order: &[String], records: &[Record]) -> Result<()> {
        let run_id = self.store_run(&self.label, field_order, records).await?;
        tracing::info!(run_id = %run_id, records = records.len(), "run stored");
        Ok(())
    }

    fn name(&self) -> &str {
        "libsql"
    }
}
