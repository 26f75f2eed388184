//! Plugin and probe result records.
//!
//! A [`Plugin`] carries a detail map from probe key to the latest
//! [`ProbeResult`] for that probe. The map only changes through
//! [`Plugin::merge`], which keeps a stored record when an incoming one
//! describes the same outcome and replaces it as soon as the outcome changes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome class of a probe execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    /// The probe ran to completion and the checked condition holds.
    Success,
    /// The probe ran to completion and found the condition unmet ("No
    /// Jenkinsfile found"). Durable like a success.
    Failure,
    /// The probe could not produce an answer this pass.
    Error,
}

/// Immutable outcome of one probe execution against one plugin.
///
/// Equality is defined by `(id, status, message, version)`: two records that
/// only differ by timestamp describe the same outcome. A changed message is a
/// changed outcome (a newer commit date, a plugin that became deprecated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Key of the probe that produced this record.
    pub id: String,
    pub message: String,
    pub status: ProbeStatus,
    pub timestamp: DateTime<Utc>,
    /// Schema version of the probe at execution time.
    pub version: u32,
}

impl ProbeResult {
    /// A completed execution stamped with the current time.
    pub fn success(id: impl Into<String>, message: impl Into<String>, version: u32) -> Self {
        Self::at(id, message, ProbeStatus::Success, version, Utc::now())
    }

    /// A negative finding stamped with the current time.
    pub fn failure(id: impl Into<String>, message: impl Into<String>, version: u32) -> Self {
        Self::at(id, message, ProbeStatus::Failure, version, Utc::now())
    }

    /// A failed execution stamped with the current time.
    pub fn error(id: impl Into<String>, message: impl Into<String>, version: u32) -> Self {
        Self::at(id, message, ProbeStatus::Error, version, Utc::now())
    }

    /// Build a record with an explicit timestamp.
    pub fn at(
        id: impl Into<String>,
        message: impl Into<String>,
        status: ProbeStatus,
        version: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            status,
            timestamp,
            version,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ProbeStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == ProbeStatus::Success
    }
}

impl PartialEq for ProbeResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.status == other.status
            && self.message == other.message
            && self.version == other.version
    }
}

impl Eq for ProbeResult {}

/// A plugin tracked by the scoring system, identified by its unique name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    /// Latest released version, as published by the catalog.
    pub version: String,
    /// Source-control URL, if the catalog declares one.
    pub scm: Option<String>,
    pub release_timestamp: Option<DateTime<Utc>>,
    /// Latest durable probe result per probe key.
    #[serde(default)]
    pub details: BTreeMap<String, ProbeResult>,
}

impl Plugin {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        scm: Option<String>,
        release_timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            scm,
            release_timestamp,
            details: BTreeMap::new(),
        }
    }

    /// Stored result for `probe_key`, if any.
    pub fn record(&self, probe_key: &str) -> Option<&ProbeResult> {
        self.details.get(probe_key)
    }

    /// Fold one probe result into the detail map.
    ///
    /// An absent or differing record is replaced. An equal record is kept as
    /// is, so its original timestamp survives. Error records are never
    /// stored.
    pub fn merge(mut self, record: ProbeResult) -> Self {
        if record.is_error() {
            tracing::debug!(
                plugin = %self.name,
                probe = %record.id,
                "refusing to merge error record"
            );
            return self;
        }
        match self.details.get(&record.id) {
            Some(existing) if *existing == record => {}
            _ => {
                self.details.insert(record.id.clone(), record);
            }
        }
        self
    }

    /// Update catalog-owned attributes, keeping the detail map.
    pub fn refresh(
        &mut self,
        version: impl Into<String>,
        scm: Option<String>,
        release_timestamp: Option<DateTime<Utc>>,
    ) {
        self.version = version.into();
        self.scm = scm;
        self.release_timestamp = release_timestamp;
    }
}
