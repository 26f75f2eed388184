//! Score engine: incremental recomputation of plugin scores.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use plugin_health_state::{Plugin, PluginStore, Score, ScoreResult, ScoreStore};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{warn, Instrument};

use super::{Scoring, ScoringRegistry};
use crate::error::{HealthError, Result, ScoringError};
use crate::metrics::METRICS;
use crate::obs;
use crate::probes::engine::DEFAULT_MAX_CONCURRENT;
use crate::probes::panic_message;

/// Outcome of [`ScoreEngine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreRunSummary {
    /// Plugins that received a new score.
    pub computed: usize,
    /// Plugins whose previous score was still current.
    pub reused: usize,
    /// Plugins that could not be scored or saved.
    pub failed: usize,
    pub cancelled: bool,
}

enum Outcome {
    Computed(Score),
    Reused(Score),
}

impl Outcome {
    fn into_score(self) -> Score {
        match self {
            Outcome::Computed(score) | Outcome::Reused(score) => score,
        }
    }
}

/// A scoring must be re-applied when it has no previous result, when the
/// previous result was written by another version, or when a probe record
/// it reads is newer than the previous score.
pub fn is_stale(scoring: &dyn Scoring, plugin: &Plugin, previous: Option<&Score>) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    let Some(result) = previous.result(scoring.key()) else {
        return true;
    };
    if result.version() != scoring.version() {
        return true;
    }
    scoring
        .dependencies()
        .iter()
        .filter_map(|key| plugin.record(key))
        .any(|record| record.timestamp > previous.computed_at())
}

fn apply_guarded(scoring: &dyn Scoring, plugin: &Plugin) -> std::result::Result<ScoreResult, ScoringError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| scoring.apply(plugin)))
        .unwrap_or_else(|payload| Err(ScoringError::Panicked(panic_message(payload.as_ref()))))
}

#[derive(Clone)]
struct Scorer {
    registry: Arc<ScoringRegistry>,
    scores: Arc<dyn ScoreStore>,
}

impl Scorer {
    async fn score(&self, plugin: &Plugin) -> Result<Outcome> {
        let previous = self.scores.latest_score(&plugin.name).await?;
        let mut results = Vec::with_capacity(self.registry.len());
        let mut reapplied = 0;

        for scoring in self.registry.iter() {
            let scoring = scoring.as_ref();
            let prior = previous.as_ref().and_then(|s| s.result(scoring.key()));
            if !is_stale(scoring, plugin, previous.as_ref()) {
                results.extend(prior.cloned());
                continue;
            }
            match apply_guarded(scoring, plugin) {
                Ok(result) => {
                    reapplied += 1;
                    results.push(result);
                }
                Err(e) => {
                    obs::emit_scoring_failed(&plugin.name, scoring.key(), &e);
                    results.extend(prior.cloned());
                }
            }
        }

        if reapplied == 0 {
            let score = previous.ok_or_else(|| HealthError::NothingToScore(plugin.name.clone()))?;
            obs::emit_score_reused(&plugin.name, score.value());
            METRICS.inc_scores_reused();
            return Ok(Outcome::Reused(score));
        }

        let score = Score::new(plugin.name.clone(), Utc::now(), results);
        if let Err(e) = self.scores.save_score(&score).await {
            obs::emit_score_save_failed(&plugin.name, &e);
            METRICS.inc_save_failures();
            return Err(e.into());
        }
        obs::emit_score_computed(&plugin.name, score.value(), reapplied);
        METRICS.inc_scores_computed();
        Ok(Outcome::Computed(score))
    }
}

pub struct ScoreEngine {
    scorer: Scorer,
    plugins: Arc<dyn PluginStore>,
    max_concurrent: usize,
    cancel: Option<watch::Receiver<bool>>,
}

impl ScoreEngine {
    pub fn new(
        registry: Arc<ScoringRegistry>,
        plugins: Arc<dyn PluginStore>,
        scores: Arc<dyn ScoreStore>,
    ) -> Self {
        Self {
            scorer: Scorer { registry, scores },
            plugins,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cancel: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Score one plugin. Returns the previous score untouched when nothing
    /// it depends on changed.
    pub async fn run_on(&self, plugin: &Plugin) -> Result<Score> {
        self.scorer
            .score(plugin)
            .instrument(obs::pass_span("score"))
            .await
            .map(Outcome::into_score)
    }

    /// Score every stored plugin.
    pub async fn run(&self) -> Result<ScoreRunSummary> {
        self.run_all().instrument(obs::pass_span("score")).await
    }

    async fn run_all(&self) -> Result<ScoreRunSummary> {
        let started = Instant::now();
        let plugins = self.plugins.list_plugins().await?;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut summary = ScoreRunSummary::default();

        for plugin in plugins {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let scorer = self.scorer.clone();
            tasks.spawn(
                async move {
                    let _permit = permit;
                    let outcome = scorer.score(&plugin).await;
                    (plugin.name, outcome)
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Outcome::Computed(_)))) => summary.computed += 1,
                Ok((_, Ok(Outcome::Reused(_)))) => summary.reused += 1,
                Ok((name, Err(e))) => {
                    summary.failed += 1;
                    warn!(plugin = %name, error = %e, "plugin not scored");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(error = %e, "score task aborted");
                }
            }
        }

        METRICS.flush();
        obs::emit_score_pass_finished(
            summary.computed,
            summary.reused,
            summary.failed,
            started.elapsed().as_millis() as u64,
        );
        Ok(summary)
    }
}
