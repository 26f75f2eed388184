//! Structured observability hooks for probe and score passes.
//!
//! This module provides:
//! - A pass-scoped tracing span for each engine run
//! - Emission functions for the lifecycle events of both engines
//!
//! Every event carries an `event` field so log pipelines can filter on it.

use tracing::{info, warn};

/// Span covering one whole pass. Attach it with
/// [`tracing::Instrument::instrument`] so it follows the pass future across
/// worker threads.
///
/// ```ignore
/// engine.run_inner().instrument(pass_span("probe")).await
/// ```
pub fn pass_span(pass: &str) -> tracing::Span {
    tracing::info_span!("plugin_health.pass", pass = %pass)
}

pub fn emit_probe_pass_started(plugins: usize, probes: usize) {
    info!(event = "probe.pass_started", plugins = plugins, probes = probes);
}

pub fn emit_probe_pass_finished(processed: usize, failed: usize, cancelled: bool, duration_ms: u64) {
    info!(
        event = "probe.pass_finished",
        processed = processed,
        failed = failed,
        cancelled = cancelled,
        duration_ms = duration_ms,
    );
}

pub fn emit_probe_executed(plugin: &str, probe: &str, message: &str) {
    tracing::debug!(event = "probe.executed", plugin = %plugin, probe = %probe, message = %message);
}

pub fn emit_probe_skipped(plugin: &str, probe: &str) {
    tracing::trace!(event = "probe.skipped", plugin = %plugin, probe = %probe);
}

/// Warn level: a probe produced an error record that will not be kept.
pub fn emit_probe_failed(plugin: &str, probe: &str, error: &dyn std::fmt::Display) {
    warn!(event = "probe.failed", plugin = %plugin, probe = %probe, error = %error);
}

pub fn emit_plugin_save_failed(plugin: &str, error: &dyn std::fmt::Display) {
    warn!(event = "plugin.save_failed", plugin = %plugin, error = %error);
}

pub fn emit_score_computed(plugin: &str, value: u8, reapplied: usize) {
    info!(event = "score.computed", plugin = %plugin, value = value, reapplied = reapplied);
}

pub fn emit_score_reused(plugin: &str, value: u8) {
    tracing::debug!(event = "score.reused", plugin = %plugin, value = value);
}

pub fn emit_scoring_failed(plugin: &str, scoring: &str, error: &dyn std::fmt::Display) {
    warn!(event = "scoring.failed", plugin = %plugin, scoring = %scoring, error = %error);
}

pub fn emit_score_save_failed(plugin: &str, error: &dyn std::fmt::Display) {
    warn!(event = "score.save_failed", plugin = %plugin, error = %error);
}

pub fn emit_score_pass_finished(computed: usize, reused: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "score.pass_finished",
        computed = computed,
        reused = reused,
        failed = failed,
        duration_ms = duration_ms,
    );
}
