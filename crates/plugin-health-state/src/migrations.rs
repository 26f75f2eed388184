//! SurrealDB schema migrations and initialization
//!
//! Sets up the `plugins` and `scores` tables with their indexes. Safe to run
//! on every connection.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

/// Initialize all tables.
pub async fn init_schema(db: &Surreal<Any>) -> StorageResult<()> {
    info!("Initializing plugin health schema");

    init_plugins_table(db).await?;
    init_scores_table(db).await?;

    info!("Plugin health schema initialization complete");
    Ok(())
}

async fn run(db: &Surreal<Any>, table: &str, sql: &str) -> StorageResult<()> {
    db.query(sql)
        .await
        .and_then(|res| res.check())
        .map_err(|e| StorageError::SchemaSetup(format!("{table}: {e}")))?;
    Ok(())
}

/// Initialize `plugins` table
///
/// Schema:
/// ```text
/// TABLE plugins {
///   name:               STRING (record key, unique)
///   version:            STRING
///   scm:                STRING?
///   release_timestamp:  DATETIME?
///   details:            OBJECT (probe key -> probe result)
/// }
/// ```
///
/// Rows are upserted whole; a plugin is never deleted by the engines.
async fn init_plugins_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing plugins table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS plugins SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_plugin_name ON TABLE plugins COLUMNS name UNIQUE;
    "#;

    run(db, "plugins", sql).await
}

/// Initialize `scores` table
///
/// Schema:
/// ```text
/// TABLE scores {
///   score_id:     STRING (unique)
///   plugin:       STRING (indexed)
///   computed_at:  DATETIME (indexed)
///   value:        INT (0..=100)
///   details:      OBJECT (scoring key -> score result)
/// }
/// ```
///
/// History is append-only; retention is handled outside this crate.
async fn init_scores_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing scores table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS scores SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_score_id ON TABLE scores COLUMNS score_id UNIQUE;

        -- Latest score per plugin
        DEFINE INDEX IF NOT EXISTS idx_plugin_computed_at ON TABLE scores COLUMNS plugin, computed_at;
    "#;

    run(db, "scores", sql).await
}
