//! Raw counts over the stored plugins and their latest scores.

use std::collections::BTreeMap;

use plugin_health_state::{PluginStore, ScoreStore};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoringTally {
    /// Latest scores holding a result for this scoring.
    pub results: u64,
    /// Of those, results at 100.
    pub full_marks: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub plugins: u64,
    pub scored_plugins: u64,
    /// Plugins holding a record for each probe key.
    pub probes: BTreeMap<String, u64>,
    pub scorings: BTreeMap<String, ScoringTally>,
    /// Mean of the latest score values, 0 when nothing is scored.
    pub average_score: f64,
}

pub async fn collect(plugins: &dyn PluginStore, scores: &dyn ScoreStore) -> Result<HealthReport> {
    let mut report = HealthReport::default();

    for plugin in plugins.list_plugins().await? {
        report.plugins += 1;
        for key in plugin.details.keys() {
            *report.probes.entry(key.clone()).or_default() += 1;
        }
    }

    let latest = scores.latest_scores().await?;
    let mut total = 0u64;
    for score in &latest {
        total += u64::from(score.value());
        for (key, result) in score.details() {
            let tally = report.scorings.entry(key.clone()).or_default();
            tally.results += 1;
            if result.value() >= 100.0 {
                tally.full_marks += 1;
            }
        }
    }
    report.scored_plugins = latest.len() as u64;
    if !latest.is_empty() {
        report.average_score = total as f64 / latest.len() as f64;
    }
    Ok(report)
}
