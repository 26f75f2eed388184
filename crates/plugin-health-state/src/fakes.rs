//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryPluginStore` and `MemoryScoreStore` that satisfy the
//! trait contracts without any external dependencies.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::Plugin;
use crate::score::Score;
use crate::storage_traits::*;

fn lock<T>(m: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| StorageError::Backend("in-memory store lock poisoned".to_string()))
}

// ---------------------------------------------------------------------------
// MemoryPluginStore
// ---------------------------------------------------------------------------

/// In-memory plugin store backed by a `BTreeMap<name, Plugin>`.
#[derive(Debug, Default)]
pub struct MemoryPluginStore {
    plugins: Mutex<BTreeMap<String, Plugin>>,
}

impl MemoryPluginStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with the given plugins.
    pub fn with_plugins(plugins: impl IntoIterator<Item = Plugin>) -> Self {
        let map = plugins.into_iter().map(|p| (p.name.clone(), p)).collect();
        Self {
            plugins: Mutex::new(map),
        }
    }
}

#[async_trait]
impl PluginStore for MemoryPluginStore {
    async fn save_plugin(&self, plugin: &Plugin) -> StorageResult<()> {
        let mut plugins = lock(&self.plugins)?;
        plugins.insert(plugin.name.clone(), plugin.clone());
        Ok(())
    }

    async fn find_plugin(&self, name: &str) -> StorageResult<Option<Plugin>> {
        let plugins = lock(&self.plugins)?;
        Ok(plugins.get(name).cloned())
    }

    async fn list_plugins(&self) -> StorageResult<Vec<Plugin>> {
        let plugins = lock(&self.plugins)?;
        Ok(plugins.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryScoreStore
// ---------------------------------------------------------------------------

/// In-memory score history backed by a `HashMap<plugin, Vec<Score>>`.
///
/// Each plugin maps to its scores in insertion order (newest last).
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    scores: Mutex<HashMap<String, Vec<Score>>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of scores ever saved.
    pub fn saved_count(&self) -> usize {
        self.scores
            .lock()
            .map(|s| s.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

fn newest(history: &[Score]) -> Option<&Score> {
    history.iter().max_by_key(|s| s.computed_at())
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn save_score(&self, score: &Score) -> StorageResult<()> {
        let mut scores = lock(&self.scores)?;
        scores
            .entry(score.plugin().to_string())
            .or_default()
            .push(score.clone());
        Ok(())
    }

    async fn latest_score(&self, plugin: &str) -> StorageResult<Option<Score>> {
        let scores = lock(&self.scores)?;
        Ok(scores.get(plugin).and_then(|h| newest(h)).cloned())
    }

    async fn latest_scores(&self) -> StorageResult<Vec<Score>> {
        let scores = lock(&self.scores)?;
        let mut latest: Vec<Score> = scores.values().filter_map(|h| newest(h)).cloned().collect();
        latest.sort_by(|a, b| a.plugin().cmp(b.plugin()));
        Ok(latest)
    }

    async fn score_history(&self, plugin: &str) -> StorageResult<Vec<Score>> {
        let scores = lock(&self.scores)?;
        let mut history = scores.get(plugin).cloned().unwrap_or_default();
        history.sort_by_key(|s| std::cmp::Reverse(s.computed_at()));
        Ok(history)
    }
}
