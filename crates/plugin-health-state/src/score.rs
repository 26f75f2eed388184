//! Scoring records.
//!
//! Values live on a 0..=100 scale and weights on 0..=1 throughout: a
//! [`ComponentResult`] is folded into a [`ScoreResult`], and the
//! [`ScoreResult`]s of a pass are folded into a [`Score`] with the same
//! [`weighted_average`].

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Weighted mean of `(value, weight)` pairs.
///
/// Returns `0.0` when the weights sum to zero.
pub fn weighted_average<I>(pairs: I) -> f32
where
    I: IntoIterator<Item = (f32, f32)>,
{
    let (sum, weights) = pairs
        .into_iter()
        .fold((0.0_f32, 0.0_f32), |(sum, weights), (value, weight)| {
            (sum + value * weight, weights + weight)
        });
    if weights <= 0.0 {
        0.0
    } else {
        sum / weights
    }
}

/// A pointer to documentation that explains how to improve a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub text: String,
    pub link: String,
}

impl Resolution {
    pub fn new(text: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: link.into(),
        }
    }
}

/// Outcome of one scoring component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    /// 0..=100
    pub value: u8,
    /// 0..=1
    pub weight: f32,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
}

impl ComponentResult {
    /// Values above 100 are capped and weights are clamped into `[0, 1]`.
    pub fn new(value: u8, weight: f32, reasons: Vec<String>) -> Self {
        Self {
            value: value.min(100),
            weight: if weight.is_nan() {
                0.0
            } else {
                weight.clamp(0.0, 1.0)
            },
            reasons,
            resolutions: Vec::new(),
        }
    }

    pub fn with_resolution(mut self, text: impl Into<String>, link: impl Into<String>) -> Self {
        self.resolutions.push(Resolution::new(text, link));
        self
    }
}

/// Aggregate result of one scoring for one plugin.
///
/// Identity is the scoring `key`: a collection of results behaves like a
/// map keyed by scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ScoreResultRepr")]
pub struct ScoreResult {
    key: String,
    value: f32,
    weight: f32,
    components: Vec<ComponentResult>,
    version: u32,
}

#[derive(Deserialize)]
struct ScoreResultRepr {
    key: String,
    value: f32,
    weight: f32,
    #[serde(default)]
    components: Vec<ComponentResult>,
    version: u32,
}

impl TryFrom<ScoreResultRepr> for ScoreResult {
    type Error = ModelError;

    fn try_from(r: ScoreResultRepr) -> Result<Self, Self::Error> {
        ScoreResult::new(r.key, r.value, r.weight, r.components, r.version)
    }
}

impl ScoreResult {
    /// Rejects a weight outside `[0, 1]` and a value outside `[0, 100]`.
    pub fn new(
        key: impl Into<String>,
        value: f32,
        weight: f32,
        components: Vec<ComponentResult>,
        version: u32,
    ) -> Result<Self, ModelError> {
        let key = key.into();
        if !(0.0..=1.0).contains(&weight) {
            return Err(ModelError::InvalidWeight { key, weight });
        }
        if !(0.0..=100.0).contains(&value) {
            return Err(ModelError::InvalidValue { key, value });
        }
        Ok(Self {
            key,
            value,
            weight,
            components,
            version,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn components(&self) -> &[ComponentResult] {
        &self.components
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl PartialEq for ScoreResult {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ScoreResult {}

impl Hash for ScoreResult {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Unique identifier of a computed score
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreId(pub String);

impl ScoreId {
    /// Generate a new random ScoreId
    pub fn new() -> Self {
        ScoreId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ScoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A plugin's overall health at one point in time.
///
/// `value` is always the rounded weighted average of `details`; every way of
/// building or changing a score recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoreRepr")]
pub struct Score {
    id: ScoreId,
    plugin: String,
    computed_at: DateTime<Utc>,
    value: u8,
    details: BTreeMap<String, ScoreResult>,
}

#[derive(Deserialize)]
struct ScoreRepr {
    id: ScoreId,
    plugin: String,
    computed_at: DateTime<Utc>,
    #[serde(default)]
    details: BTreeMap<String, ScoreResult>,
}

impl From<ScoreRepr> for Score {
    fn from(r: ScoreRepr) -> Self {
        Score::restore(r.id, r.plugin, r.computed_at, r.details.into_values())
    }
}

impl Score {
    /// A fresh score with a new identity.
    pub fn new(
        plugin: impl Into<String>,
        computed_at: DateTime<Utc>,
        results: impl IntoIterator<Item = ScoreResult>,
    ) -> Self {
        Self::restore(ScoreId::new(), plugin, computed_at, results)
    }

    /// Rebuild a persisted score. Later results replace earlier ones with
    /// the same key.
    pub fn restore(
        id: ScoreId,
        plugin: impl Into<String>,
        computed_at: DateTime<Utc>,
        results: impl IntoIterator<Item = ScoreResult>,
    ) -> Self {
        let details = results
            .into_iter()
            .map(|r| (r.key.clone(), r))
            .collect::<BTreeMap<_, _>>();
        let mut score = Self {
            id,
            plugin: plugin.into(),
            computed_at,
            value: 0,
            details,
        };
        score.recompute();
        score
    }

    /// Insert or replace the result for its key.
    pub fn add_result(&mut self, result: ScoreResult) {
        self.details.insert(result.key.clone(), result);
        self.recompute();
    }

    fn recompute(&mut self) {
        let avg = weighted_average(self.details.values().map(|r| (r.value, r.weight)));
        self.value = avg.round().clamp(0.0, 100.0) as u8;
    }

    pub fn id(&self) -> &ScoreId {
        &self.id
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn details(&self) -> &BTreeMap<String, ScoreResult> {
        &self.details
    }

    pub fn result(&self, key: &str) -> Option<&ScoreResult> {
        self.details.get(key)
    }
}
