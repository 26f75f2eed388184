//! Scorings: weighted interpretations of probe records.
//!
//! A scoring is a list of [`Component`]s, each reading the record of one of
//! its accepted probes and giving a 0..=100 verdict. The scoring's value is the rounded weighted
//! average of its components. Scorings are pure functions of the plugin's
//! detail map.

pub mod engine;
pub mod standard;

use std::sync::Arc;

use plugin_health_state::{weighted_average, ComponentResult, Plugin, ProbeResult, Resolution, ScoreResult};

use crate::error::ScoringError;

pub use engine::{ScoreEngine, ScoreRunSummary};

/// What a component concluded from its probe record.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub value: u8,
    pub reasons: Vec<String>,
    pub resolutions: Vec<Resolution>,
}

impl Verdict {
    pub fn new(value: u8, reason: impl Into<String>) -> Self {
        Self {
            value,
            reasons: vec![reason.into()],
            resolutions: Vec::new(),
        }
    }

    pub fn pass(reason: impl Into<String>) -> Self {
        Self::new(100, reason)
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::new(0, reason)
    }

    pub fn with_resolution(mut self, text: impl Into<String>, link: impl Into<String>) -> Self {
        self.resolutions.push(Resolution::new(text, link));
        self
    }

    fn into_result(self, weight: f32) -> ComponentResult {
        let mut result = ComponentResult::new(self.value, weight, self.reasons);
        result.resolutions = self.resolutions;
        result
    }
}

pub type Evaluate = fn(&ProbeResult) -> Result<Verdict, ScoringError>;

/// One weighted criterion of a scoring.
///
/// Usually backed by a single probe. With several probes (Dependabot or
/// Renovate) every stored record is evaluated and the best verdict wins.
#[derive(Clone, Copy)]
pub struct Component {
    pub probes: &'static [&'static str],
    /// 0..=1
    pub weight: f32,
    pub evaluate: Evaluate,
}

impl Component {
    pub fn apply(&self, plugin: &Plugin) -> Result<ComponentResult, ScoringError> {
        let mut best: Option<Verdict> = None;
        for record in self.probes.iter().filter_map(|key| plugin.record(key)) {
            let verdict = (self.evaluate)(record)?;
            if best.as_ref().map_or(true, |b| verdict.value > b.value) {
                best = Some(verdict);
            }
        }
        match best {
            Some(verdict) => Ok(verdict.into_result(self.weight)),
            None => Ok(ComponentResult::new(
                0,
                self.weight,
                vec![format!("{} has not been executed.", self.probes.join(" or "))],
            )),
        }
    }
}

/// Rejects a record whose message the component does not know.
pub(crate) fn unexpected(record: &ProbeResult) -> ScoringError {
    ScoringError::MalformedRecord {
        probe: record.id.clone(),
        detail: format!("unexpected message '{}'", record.message),
    }
}

pub trait Scoring: Send + Sync {
    fn key(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Share of this scoring in the plugin's score, 0..=1.
    fn weight(&self) -> f32;

    /// Bumping the version forces re-evaluation of every stored result.
    fn version(&self) -> u32 {
        1
    }

    fn components(&self) -> &[Component];

    /// Probe keys this scoring reads, in component order, deduplicated.
    fn dependencies(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = Vec::new();
        for probe in self.components().iter().flat_map(|c| c.probes) {
            if !keys.contains(probe) {
                keys.push(probe);
            }
        }
        keys
    }

    fn apply(&self, plugin: &Plugin) -> Result<ScoreResult, ScoringError> {
        let results = self
            .components()
            .iter()
            .map(|c| c.apply(plugin))
            .collect::<Result<Vec<_>, _>>()?;
        let value = weighted_average(results.iter().map(|r| (f32::from(r.value), r.weight)));
        Ok(ScoreResult::new(
            self.key(),
            value.round(),
            self.weight(),
            results,
            self.version(),
        )?)
    }
}

/// A scoring described entirely by data.
pub struct RuleScoring {
    pub key: &'static str,
    pub description: &'static str,
    pub weight: f32,
    pub version: u32,
    pub components: Vec<Component>,
}

impl Scoring for RuleScoring {
    fn key(&self) -> &'static str {
        self.key
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn components(&self) -> &[Component] {
        &self.components
    }
}

#[derive(Clone)]
pub struct ScoringRegistry {
    scorings: Vec<Arc<dyn Scoring>>,
}

impl ScoringRegistry {
    pub fn new(scorings: Vec<Arc<dyn Scoring>>) -> Self {
        Self { scorings }
    }

    /// Every built-in scoring.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(standard::adoption()),
            Arc::new(standard::deprecation()),
            Arc::new(standard::publication()),
            Arc::new(standard::security()),
            Arc::new(standard::documentation()),
            Arc::new(standard::repository_configuration()),
            Arc::new(standard::junit4_ban()),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Scoring>> {
        self.scorings.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Scoring>> {
        self.scorings.iter().find(|s| s.key() == key)
    }

    pub fn len(&self) -> usize {
        self.scorings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorings.is_empty()
    }
}
