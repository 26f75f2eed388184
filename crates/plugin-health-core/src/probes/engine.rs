//! Probe engine: one sequential probe pass per plugin, plugins in parallel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use plugin_health_state::{Plugin, PluginStore};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{warn, Instrument};

use super::{execute, should_run, PassInputs, ProbeContext, ProbeRegistry};
use crate::catalog::{CatalogSource, DocumentationIndex};
use crate::error::{HealthError, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::source::{RepositoryHost, SourceControl};

/// Default number of plugins probed at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// External services the probes depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogSource>,
    pub documentation: Arc<dyn DocumentationIndex>,
    pub source: Arc<dyn SourceControl>,
    pub host: Arc<dyn RepositoryHost>,
}

/// Outcome of [`ProbeEngine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeRunSummary {
    /// Plugins probed and saved.
    pub processed: usize,
    /// Plugins whose pass could not be completed or saved.
    pub failed: usize,
    /// The pass stopped early on request.
    pub cancelled: bool,
}

pub struct ProbeEngine {
    registry: Arc<ProbeRegistry>,
    plugins: Arc<dyn PluginStore>,
    collaborators: Collaborators,
    max_concurrent: usize,
    work_dir: Option<PathBuf>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Everything one plugin task needs, cloned into the task.
#[derive(Clone)]
struct Worker {
    registry: Arc<ProbeRegistry>,
    plugins: Arc<dyn PluginStore>,
    source: Arc<dyn SourceControl>,
    inputs: PassInputs,
    work_dir: Option<PathBuf>,
}

impl ProbeEngine {
    pub fn new(
        registry: Arc<ProbeRegistry>,
        plugins: Arc<dyn PluginStore>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            registry,
            plugins,
            collaborators,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            work_dir: None,
            cancel: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Parent directory for per-plugin scratch space.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Stop starting new plugins once the flag turns `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fetch the batch-wide inputs. Any failure here is fatal for the pass.
    async fn prepare(&self) -> Result<Worker> {
        let catalog = self.collaborators.catalog.fetch().await?;
        let documentation = self.collaborators.documentation.fetch().await?;
        Ok(Worker {
            registry: Arc::clone(&self.registry),
            plugins: Arc::clone(&self.plugins),
            source: Arc::clone(&self.collaborators.source),
            inputs: PassInputs {
                catalog: Arc::new(catalog),
                documentation: Arc::new(documentation),
                host: Arc::clone(&self.collaborators.host),
            },
            work_dir: self.work_dir.clone(),
        })
    }

    /// Probe every stored plugin.
    pub async fn run(&self) -> Result<ProbeRunSummary> {
        self.run_all().instrument(obs::pass_span("probe")).await
    }

    async fn run_all(&self) -> Result<ProbeRunSummary> {
        let started = Instant::now();
        let worker = self.prepare().await?;
        let plugins = self.plugins.list_plugins().await?;
        obs::emit_probe_pass_started(plugins.len(), self.registry.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut summary = ProbeRunSummary::default();

        for plugin in plugins {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let worker = worker.clone();
            tasks.spawn(
                async move {
                    let _permit = permit;
                    let name = plugin.name.clone();
                    (name, worker.process(plugin).await)
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => summary.processed += 1,
                Ok((name, Err(e))) => {
                    summary.failed += 1;
                    warn!(plugin = %name, error = %e, "plugin probe pass failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(error = %e, "probe task aborted");
                }
            }
        }

        METRICS.flush();
        obs::emit_probe_pass_finished(
            summary.processed,
            summary.failed,
            summary.cancelled,
            started.elapsed().as_millis() as u64,
        );
        Ok(summary)
    }

    /// Probe a single stored plugin and return it as saved.
    pub async fn run_on(&self, name: &str) -> Result<Plugin> {
        async {
            let plugin = self
                .plugins
                .find_plugin(name)
                .await?
                .ok_or_else(|| HealthError::PluginNotFound(name.to_string()))?;
            let worker = self.prepare().await?;
            let plugin = worker.process(plugin).await;
            METRICS.flush();
            plugin
        }
        .instrument(obs::pass_span("probe"))
        .await
    }
}

impl Worker {
    async fn process(&self, mut plugin: Plugin) -> Result<Plugin> {
        if let Some(entry) = self.inputs.catalog.plugin(&plugin.name) {
            entry.refresh(&mut plugin);
        }
        let plugin = self.probe(plugin).await?;

        if let Err(e) = self.plugins.save_plugin(&plugin).await {
            obs::emit_plugin_save_failed(&plugin.name, &e);
            METRICS.inc_save_failures();
            return Err(e.into());
        }
        METRICS.inc_plugins_processed();
        Ok(plugin)
    }

    /// Run every probe in order, folding each kept record into the plugin
    /// before the next probe looks at it.
    async fn probe(&self, mut plugin: Plugin) -> Result<Plugin> {
        let mut ctx = ProbeContext::new(self.inputs.clone(), self.work_dir.as_deref())
            .map_err(HealthError::Scratch)?;

        for probe in self.registry.iter() {
            let probe = probe.as_ref();
            if probe.needs_checkout() {
                ctx.ensure_checkout(&plugin, self.source.as_ref()).await;
            }
            if !should_run(probe, &plugin, ctx.last_commit_at()) {
                obs::emit_probe_skipped(&plugin.name, probe.key());
                METRICS.inc_probes_skipped();
                continue;
            }

            let record = execute(probe, &plugin, &ctx).await;
            METRICS.inc_probes_executed();
            if record.is_error() {
                obs::emit_probe_failed(&plugin.name, probe.key(), &record.message);
                METRICS.inc_probes_failed();
                continue;
            }
            obs::emit_probe_executed(&plugin.name, probe.key(), &record.message);
            plugin = plugin.merge(record);
        }

        ctx.close();
        Ok(plugin)
    }
}
