//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding processed artifacts
//! and the pipeline configuration key/value map.
//!
//! **Access rules:**
//! - processing and config commands: read-write via [`Storage::open`]
//! - `list` / `show`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use triage_shared::{
    ArtifactId, ArtifactRecord, PipelineConfig, ProcessingResult, Result, TriageError,
};

/// Timestamp format for every stored date (fixed width, sorts lexically).
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    ///
    /// Applies pending migrations and seeds any missing configuration keys
    /// with their defaults.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TriageError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        storage.seed_default_config().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TriageError::NotFound(format!(
                "database {} (nothing has been processed yet)",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        TriageError::Storage(format!(
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
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Insert default values for configuration keys that are not set yet.
    async fn seed_default_config(&self) -> Result<()> {
        let now = timestamp(&Utc::now());
        for (key, value) in PipelineConfig::default().to_map()? {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)",
                    params![key.as_str(), value.as_str(), now.as_str()],
                )
                .await
                .map_err(|e| TriageError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TriageError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Artifact operations
    // -----------------------------------------------------------------------

    /// Insert a new artifact record.
    pub async fn insert_artifact(&self, record: &ArtifactRecord) -> Result<()> {
        self.check_writable()?;
        let result = &record.result;
        self.conn
            .execute(
                "INSERT INTO artifacts (id, kind, source, extracted_content, recommendation, summary,
                                        rationale, provider, model, was_truncated, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.id.to_string(),
                    record.kind.as_str(),
                    record.source.as_str(),
                    result.extracted_content.as_str(),
                    result.recommendation.as_str(),
                    result.summary.as_str(),
                    result.rationale.as_str(),
                    result.provider_id.as_deref(),
                    result.model_id.as_deref(),
                    i64::from(result.was_truncated),
                    timestamp(&record.created_at),
                    timestamp(&record.updated_at),
                ],
            )
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;
        debug!(id = %record.id, recommendation = %result.recommendation, "artifact stored");
        Ok(())
    }

    /// Get an artifact by ID.
    pub async fn get_artifact(&self, id: &ArtifactId) -> Result<Option<ArtifactRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, source, extracted_content, recommendation, summary, rationale,
                        provider, model, was_truncated, created_at, updated_at
                 FROM artifacts WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(TriageError::Storage(e.to_string())),
        }
    }

    /// List all artifacts, newest first.
    pub async fn list_artifacts(&self) -> Result<Vec<ArtifactRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, source, extracted_content, recommendation, summary, rationale,
                        provider, model, was_truncated, created_at, updated_at
                 FROM artifacts ORDER BY created_at DESC, id DESC",
                params![],
            )
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?
        {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }

    /// Replace the model-derived fields of an artifact. Extracted content,
    /// kind, source, and `created_at` are left as they are.
    pub async fn update_verdict(&self, id: &ArtifactId, result: &ProcessingResult) -> Result<()> {
        self.check_writable()?;
        let now = timestamp(&Utc::now());
        let changed = self
            .conn
            .execute(
                "UPDATE artifacts
                 SET recommendation = ?1, summary = ?2, rationale = ?3, provider = ?4,
                     model = ?5, was_truncated = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    result.recommendation.as_str(),
                    result.summary.as_str(),
                    result.rationale.as_str(),
                    result.provider_id.as_deref(),
                    result.model_id.as_deref(),
                    i64::from(result.was_truncated),
                    now.as_str(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        if changed == 0 {
            return Err(TriageError::NotFound(format!("artifact {id}")));
        }
        Ok(())
    }

    /// Delete an artifact by ID. Returns whether a record was removed.
    pub async fn delete_artifact(&self, id: &ArtifactId) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute("DELETE FROM artifacts WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Configuration operations
    // -----------------------------------------------------------------------

    /// The whole configuration map.
    pub async fn get_config(&self) -> Result<BTreeMap<String, String>> {
        let mut rows = self
            .conn
            .query("SELECT key, value FROM config", params![])
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?;

        let mut map = BTreeMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| TriageError::Storage(e.to_string()))?
        {
            let key: String = row
                .get(0)
                .map_err(|e| TriageError::Storage(e.to_string()))?;
            let value: String = row
                .get(1)
                .map_err(|e| TriageError::Storage(e.to_string()))?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Upsert every entry of `map`. Keys not present are left untouched.
    pub async fn set_config(&self, map: &BTreeMap<String, String>) -> Result<()> {
        self.check_writable()?;
        let now = timestamp(&Utc::now());
        for (key, value) in map {
            self.conn
                .execute(
                    "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                       value = excluded.value,
                       updated_at = excluded.updated_at",
                    params![key.as_str(), value.as_str(), now.as_str()],
                )
                .await
                .map_err(|e| TriageError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    /// Current pipeline configuration snapshot.
    pub async fn load_pipeline_config(&self) -> Result<PipelineConfig> {
        PipelineConfig::from_map(&self.get_config().await?)
    }

    /// Validate and persist a pipeline configuration.
    pub async fn save_pipeline_config(&self, config: &PipelineConfig) -> Result<()> {
        config.validate()?;
        self.set_config(&config.to_map()?).await
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TriageError::Storage(format!("invalid date: {e}")))
}

/// Map a `SELECT id, kind, source, ... updated_at` row to a record.
fn row_to_record(row: &libsql::Row) -> Result<ArtifactRecord> {
    let text = |idx: i32| {
        row.get::<String>(idx)
            .map_err(|e| TriageError::Storage(e.to_string()))
    };

    Ok(ArtifactRecord {
        id: text(0)?.parse()?,
        kind: text(1)?.parse()?,
        source: text(2)?,
        result: ProcessingResult {
            extracted_content: text(3)?,
            recommendation: text(4)?.parse()?,
            summary: text(5)?,
            rationale: text(6)?,
            provider_id: row.get::<String>(7).ok(),
            model_id: row.get::<String>(8).ok(),
            was_truncated: row.get::<i64>(9).unwrap_or(0) != 0,
        },
        created_at: parse_timestamp(&text(10)?)?,
        updated_at: parse_timestamp(&text(11)?)?,
    })
}
