//! Probes: named inspections producing one [`ProbeResult`] per plugin.
//!
//! A probe only answers with a [`Finding`] or a [`ProbeError`]. [`execute`]
//! is the single place where that answer becomes a record, and where a fault
//! (including a panic) becomes an error record.

pub mod catalog_probes;
mod context;
pub mod documentation;
pub mod engine;
pub mod repository;
pub mod scm;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use plugin_health_state::{Plugin, ProbeResult};

use crate::error::ProbeError;

pub use context::{PassInputs, ProbeContext};
pub use engine::{Collaborators, ProbeEngine, ProbeRunSummary};

/// What a probe concluded. A failure is a durable negative finding, not a
/// fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Success(String),
    Failure(String),
}

impl Finding {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(message.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// `success` when the condition holds, `failure` otherwise.
    pub fn holds(condition: bool, success: &str, failure: &str) -> Self {
        if condition {
            Self::success(success)
        } else {
            Self::failure(failure)
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Failure(m) => m,
        }
    }

    fn into_record(self, key: &str, version: u32) -> ProbeResult {
        match self {
            Self::Success(m) => ProbeResult::success(key, m, version),
            Self::Failure(m) => ProbeResult::failure(key, m, version),
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Unique key; also the key of the record in the plugin detail map.
    fn key(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Execution priority, ascending.
    fn order(&self) -> i32;

    /// Only re-run when the plugin was released after the stored record.
    fn requires_release(&self) -> bool {
        false
    }

    /// Only re-run when the repository has a commit newer than the stored
    /// record.
    fn is_source_related(&self) -> bool {
        false
    }

    /// Whether the engine must prepare a checkout before this probe.
    fn needs_checkout(&self) -> bool {
        self.is_source_related()
    }

    /// Bumping the version invalidates every stored record of this probe.
    fn version(&self) -> u32 {
        1
    }

    /// Keys of probes whose stored records must be successes before this one
    /// runs.
    fn requirements(&self) -> &'static [&'static str] {
        &[]
    }

    /// Inspect the plugin and describe the finding.
    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError>;
}

/// Re-run policy.
///
/// A probe runs when it has no stored record, when the stored record is an
/// error or was written by another probe version, or when it declares no
/// freshness gate at all. A gated probe otherwise runs only if its gate
/// reports something newer than the stored record: the release timestamp
/// for release-gated probes, the last commit for source-related ones. An
/// unknown last commit never opens the source gate.
pub fn should_run(probe: &dyn Probe, plugin: &Plugin, last_commit_at: Option<DateTime<Utc>>) -> bool {
    let Some(previous) = plugin.record(probe.key()) else {
        return true;
    };
    if previous.is_error() || previous.version != probe.version() {
        return true;
    }
    if !probe.requires_release() && !probe.is_source_related() {
        return true;
    }
    let released_since = probe.requires_release()
        && plugin
            .release_timestamp
            .is_some_and(|released| released > previous.timestamp);
    let committed_since = probe.is_source_related()
        && last_commit_at.is_some_and(|commit| commit > previous.timestamp);
    released_since || committed_since
}

fn requirements_met(probe: &dyn Probe, plugin: &Plugin) -> bool {
    probe
        .requirements()
        .iter()
        .all(|key| plugin.record(key).is_some_and(ProbeResult::is_success))
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run one probe and turn its answer into a record. Never fails.
pub async fn execute(probe: &dyn Probe, plugin: &Plugin, ctx: &ProbeContext) -> ProbeResult {
    if !requirements_met(probe, plugin) {
        let err = ProbeError::RequirementsNotMet {
            probe: probe.key().to_string(),
            plugin: plugin.name.clone(),
        };
        return ProbeResult::error(probe.key(), err.to_string(), probe.version());
    }

    let outcome = AssertUnwindSafe(probe.apply(plugin, ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(ProbeError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(finding) => finding.into_record(probe.key(), probe.version()),
        Err(err) => ProbeResult::error(probe.key(), err.to_string(), probe.version()),
    }
}

/// Probes in execution order.
#[derive(Clone)]
pub struct ProbeRegistry {
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// Sort once by `order`; equal orders keep their declaration order.
    pub fn new(mut probes: Vec<Arc<dyn Probe>>) -> Self {
        probes.sort_by_key(|p| p.order());
        Self { probes }
    }

    /// Every built-in probe.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(catalog_probes::UpForAdoptionProbe),
            Arc::new(catalog_probes::DeprecationProbe),
            Arc::new(catalog_probes::PublicationProbe),
            Arc::new(catalog_probes::SecurityWarningsProbe),
            Arc::new(scm::ScmLinkProbe),
            Arc::new(repository::LastCommitDateProbe),
            Arc::new(scm::RepositoryArchivedProbe),
            Arc::new(documentation::DocumentationMigrationProbe),
            Arc::new(repository::JenkinsfileProbe),
            Arc::new(repository::ContributingGuidelinesProbe),
            Arc::new(repository::DependabotProbe),
            Arc::new(repository::RenovateProbe),
            Arc::new(repository::Junit4BanProbe),
            Arc::new(repository::ContinuousDeliveryProbe),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Probe>> {
        self.probes.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Probe>> {
        self.probes.iter().find(|p| p.key() == key)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StubProbe;
    use super::*;
    use chrono::Duration;
    use plugin_health_state::ProbeStatus;

    fn plugin_with(record: Option<ProbeResult>, released: Option<DateTime<Utc>>) -> Plugin {
        let mut p = Plugin::new("mailer", "1.0", None, released);
        if let Some(r) = record {
            p.details.insert(r.id.clone(), r);
        }
        p
    }

    fn stored(key: &str, age_days: i64, version: u32) -> ProbeResult {
        ProbeResult::at(
            key,
            "stored",
            ProbeStatus::Success,
            version,
            Utc::now() - Duration::days(age_days),
        )
    }

    #[test]
    fn runs_without_previous_record() {
        let probe = StubProbe { release: true, ..StubProbe::new("p") };
        assert!(should_run(&probe, &plugin_with(None, None), None));
    }

    #[test]
    fn release_gated_probe_skips_without_newer_release() {
        let probe = StubProbe { release: true, ..StubProbe::new("p") };
        let older_release = Utc::now() - Duration::days(20);
        let p = plugin_with(Some(stored("p", 10, 1)), Some(older_release));
        assert!(!should_run(&probe, &p, None));

        let p = plugin_with(Some(stored("p", 10, 1)), None);
        assert!(!should_run(&probe, &p, None));
    }

    #[test]
    fn release_gated_probe_runs_after_newer_release() {
        let probe = StubProbe { release: true, ..StubProbe::new("p") };
        let newer_release = Utc::now() - Duration::days(1);
        let p = plugin_with(Some(stored("p", 10, 1)), Some(newer_release));
        assert!(should_run(&probe, &p, None));
    }

    #[test]
    fn source_gated_probe_follows_last_commit() {
        let probe = StubProbe { source: true, ..StubProbe::new("p") };
        let p = plugin_with(Some(stored("p", 10, 1)), None);
        assert!(!should_run(&probe, &p, None));
        assert!(!should_run(&probe, &p, Some(Utc::now() - Duration::days(30))));
        assert!(should_run(&probe, &p, Some(Utc::now() - Duration::days(2))));
    }

    #[test]
    fn version_bump_forces_rerun() {
        let probe = StubProbe { release: true, version: 2, ..StubProbe::new("p") };
        let p = plugin_with(Some(stored("p", 10, 1)), None);
        assert!(should_run(&probe, &p, None));
    }

    #[test]
    fn stored_error_forces_rerun() {
        let probe = StubProbe { source: true, ..StubProbe::new("p") };
        let mut err = stored("p", 10, 1);
        err.status = ProbeStatus::Error;
        assert!(should_run(&probe, &plugin_with(Some(err), None), None));
    }

    #[test]
    fn ungated_probe_always_runs() {
        let probe = StubProbe::new("p");
        let p = plugin_with(Some(stored("p", 1, 1)), None);
        assert!(should_run(&probe, &p, None));
    }

    fn empty_ctx() -> ProbeContext {
        ProbeContext::new(
            PassInputs {
                catalog: Arc::default(),
                documentation: Arc::default(),
                host: Arc::new(crate::fakes::StaticHost::default()),
            },
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn negative_finding_becomes_failure_record() {
        let probe = StubProbe {
            answer: |_| Ok(Finding::failure("No Jenkinsfile found")),
            ..StubProbe::new("jenkinsfile")
        };
        let record = execute(&probe, &plugin_with(None, None), &empty_ctx()).await;
        assert_eq!(record.status, ProbeStatus::Failure);
        assert_eq!(record.message, "No Jenkinsfile found");
    }

    #[tokio::test]
    async fn requirement_must_be_a_success() {
        let probe = StubProbe {
            requires: &["scm"],
            ..StubProbe::new("archived")
        };
        let mut invalid = stored("scm", 1, 1);
        invalid.status = ProbeStatus::Failure;
        let record = execute(&probe, &plugin_with(Some(invalid), None), &empty_ctx()).await;
        assert!(record.is_error());

        let valid = stored("scm", 1, 1);
        let record = execute(&probe, &plugin_with(Some(valid), None), &empty_ctx()).await;
        assert_eq!(record.status, ProbeStatus::Success);
    }

    #[test]
    fn stored_failure_is_gated_like_success() {
        let probe = StubProbe { source: true, ..StubProbe::new("p") };
        let mut failure = stored("p", 10, 1);
        failure.status = ProbeStatus::Failure;
        assert!(!should_run(&probe, &plugin_with(Some(failure), None), None));
    }

    #[test]
    fn registry_sorts_stably_by_order() {
        let registry = ProbeRegistry::new(vec![
            Arc::new(StubProbe { order: 2, ..StubProbe::new("c") }),
            Arc::new(StubProbe { order: 1, ..StubProbe::new("b") }),
            Arc::new(StubProbe { order: 2, ..StubProbe::new("a") }),
            Arc::new(StubProbe { order: 0, ..StubProbe::new("d") }),
        ]);
        let keys: Vec<_> = registry.iter().map(|p| p.key()).collect();
        assert_eq!(keys, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn standard_registry_has_unique_keys_and_satisfiable_requirements() {
        let registry = ProbeRegistry::standard();
        let keys: Vec<_> = registry.iter().map(|p| p.key()).collect();
        let mut unique = keys.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), keys.len());

        for (idx, probe) in registry.iter().enumerate() {
            for req in probe.requirements() {
                let pos = keys.iter().position(|k| k == req).unwrap();
                assert!(pos < idx, "{} requires later probe {}", probe.key(), req);
                let required = registry.get(req).unwrap();
                assert!(required.order() < probe.order());
            }
        }
    }
}
