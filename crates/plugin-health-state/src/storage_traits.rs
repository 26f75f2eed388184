//! Storage trait definitions for plugin health scoring
//!
//! These traits define the persistence collaborators of the engines:
//! - `PluginStore`: plugins and their probe detail maps (upsert by name)
//! - `ScoreStore`: append-only score history per plugin
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::Plugin;
use crate::score::Score;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// PluginStore
// ---------------------------------------------------------------------------

/// Plugin persistence.
///
/// Guarantees:
/// - `save_plugin` replaces any plugin stored under the same name.
/// - `list_plugins` returns every plugin ordered by name.
#[async_trait]
pub trait PluginStore: Send + Sync {
    /// Insert or replace a plugin.
    async fn save_plugin(&self, plugin: &Plugin) -> StorageResult<()>;

    /// Look a plugin up by name.
    async fn find_plugin(&self, name: &str) -> StorageResult<Option<Plugin>>;

    /// All plugins, ordered by name.
    async fn list_plugins(&self) -> StorageResult<Vec<Plugin>>;
}

// ---------------------------------------------------------------------------
// ScoreStore
// ---------------------------------------------------------------------------

/// Score history.
///
/// Semantics:
/// - `save_score` appends; earlier scores are never overwritten.
/// - "latest" means greatest `computed_at`.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Append a computed score.
    async fn save_score(&self, score: &Score) -> StorageResult<()>;

    /// Most recent score for a plugin, if any.
    async fn latest_score(&self, plugin: &str) -> StorageResult<Option<Score>>;

    /// Most recent score of every scored plugin, ordered by plugin name.
    async fn latest_scores(&self) -> StorageResult<Vec<Score>>;

    /// Full history for a plugin (newest first).
    async fn score_history(&self, plugin: &str) -> StorageResult<Vec<Score>>;
}
