//! SurrealDB-backed PluginStore and ScoreStore implementations
//!
//! Uses private row types for persistence, converting to/from the model
//! types at the boundary.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::debug;

use crate::connection::{connect, StoreConfig};
use crate::error::StorageError;
use crate::model::{Plugin, ProbeResult};
use crate::score::{Score, ScoreId, ScoreResult};
use crate::storage_traits::{PluginStore, ScoreStore, StorageResult};

/// Serializes chrono DateTime to the SurrealDB datetime type so that
/// ordering happens on instants rather than strings.
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde::Serialize::serialize(&SurrealDatetime::from(*date), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde::Serialize::serialize(&date.map(SurrealDatetime::from), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

fn backend(e: surrealdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

// ---------------------------------------------------------------------------
// SurrealPluginStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PluginRow {
    name: String,
    version: String,
    scm: Option<String>,
    #[serde(default, with = "surreal_datetime_opt")]
    release_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    details: BTreeMap<String, ProbeResult>,
}

impl From<&Plugin> for PluginRow {
    fn from(p: &Plugin) -> Self {
        Self {
            name: p.name.clone(),
            version: p.version.clone(),
            scm: p.scm.clone(),
            release_timestamp: p.release_timestamp,
            details: p.details.clone(),
        }
    }
}

impl From<PluginRow> for Plugin {
    fn from(row: PluginRow) -> Self {
        let mut plugin = Plugin::new(row.name, row.version, row.scm, row.release_timestamp);
        plugin.details = row.details;
        plugin
    }
}

/// SurrealDB-backed implementation of [`PluginStore`].
#[derive(Clone)]
pub struct SurrealPluginStore {
    db: Surreal<Any>,
}

impl SurrealPluginStore {
    /// Wrap an already migrated connection.
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        Ok(Self::new(connect(&StoreConfig::Memory).await?))
    }
}

#[async_trait]
impl PluginStore for SurrealPluginStore {
    async fn save_plugin(&self, plugin: &Plugin) -> StorageResult<()> {
        debug!(plugin = %plugin.name, "saving plugin");

        self.db
            .query("UPSERT type::thing('plugins', $name) CONTENT $row")
            .bind(("name", plugin.name.clone()))
            .bind(("row", PluginRow::from(plugin)))
            .await
            .and_then(|res| res.check())
            .map_err(backend)?;
        Ok(())
    }

    async fn find_plugin(&self, name: &str) -> StorageResult<Option<Plugin>> {
        let mut res = self
            .db
            .query("SELECT * FROM plugins WHERE name = $name")
            .bind(("name", name.to_string()))
            .await
            .map_err(backend)?;

        let rows: Vec<PluginRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next().map(Plugin::from))
    }

    async fn list_plugins(&self) -> StorageResult<Vec<Plugin>> {
        let mut res = self
            .db
            .query("SELECT * FROM plugins ORDER BY name ASC")
            .await
            .map_err(backend)?;

        let rows: Vec<PluginRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(Plugin::from).collect())
    }
}

// ---------------------------------------------------------------------------
// SurrealScoreStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScoreRow {
    score_id: String,
    plugin: String,
    #[serde(with = "surreal_datetime")]
    computed_at: DateTime<Utc>,
    value: u8,
    #[serde(default)]
    details: BTreeMap<String, ScoreResult>,
}

impl From<&Score> for ScoreRow {
    fn from(s: &Score) -> Self {
        Self {
            score_id: s.id().0.clone(),
            plugin: s.plugin().to_string(),
            computed_at: s.computed_at(),
            value: s.value(),
            details: s.details().clone(),
        }
    }
}

impl From<ScoreRow> for Score {
    fn from(row: ScoreRow) -> Self {
        Score::restore(
            ScoreId(row.score_id),
            row.plugin,
            row.computed_at,
            row.details.into_values(),
        )
    }
}

/// SurrealDB-backed implementation of [`ScoreStore`].
#[derive(Clone)]
pub struct SurrealScoreStore {
    db: Surreal<Any>,
}

impl SurrealScoreStore {
    /// Wrap an already migrated connection.
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        Ok(Self::new(connect(&StoreConfig::Memory).await?))
    }

    async fn select(&self, sql: &'static str, plugin: Option<&str>) -> StorageResult<Vec<Score>> {
        let mut query = self.db.query(sql);
        if let Some(plugin) = plugin {
            query = query.bind(("plugin", plugin.to_string()));
        }
        let mut res = query.await.map_err(backend)?;
        let rows: Vec<ScoreRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(Score::from).collect())
    }
}

#[async_trait]
impl ScoreStore for SurrealScoreStore {
    async fn save_score(&self, score: &Score) -> StorageResult<()> {
        debug!(plugin = %score.plugin(), score_id = %score.id(), value = score.value(), "saving score");

        self.db
            .query("CREATE scores CONTENT $row")
            .bind(("row", ScoreRow::from(score)))
            .await
            .and_then(|res| res.check())
            .map_err(backend)?;
        Ok(())
    }

    async fn latest_score(&self, plugin: &str) -> StorageResult<Option<Score>> {
        let scores = self
            .select(
                "SELECT * FROM scores WHERE plugin = $plugin ORDER BY computed_at DESC LIMIT 1",
                Some(plugin),
            )
            .await?;
        Ok(scores.into_iter().next())
    }

    async fn latest_scores(&self) -> StorageResult<Vec<Score>> {
        let scores = self
            .select("SELECT * FROM scores ORDER BY computed_at DESC", None)
            .await?;

        // Rows arrive newest first: the first row seen per plugin wins.
        let mut latest: BTreeMap<String, Score> = BTreeMap::new();
        for score in scores {
            latest.entry(score.plugin().to_string()).or_insert(score);
        }
        Ok(latest.into_values().collect())
    }

    async fn score_history(&self, plugin: &str) -> StorageResult<Vec<Score>> {
        self.select(
            "SELECT * FROM scores WHERE plugin = $plugin ORDER BY computed_at DESC",
            Some(plugin),
        )
        .await
    }
}
