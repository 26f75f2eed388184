//! Plugin Health - scheduler-facing CLI
//!
//! The `plugin-health` command drives the probe and score passes against the
//! configured SurrealDB store.
//!
//! ## Commands
//!
//! - `catalog sync`: Track every plugin published by the update-center
//! - `probes run`: Probe all plugins, or one with `--plugin`
//! - `scores run`: Recompute scores that went stale
//! - `report`: Raw counts over probe records and latest scores
//! - `show`: One plugin's details and latest score, or every score with `--history`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plugin_health_core::{
    collect, sync_catalog, telemetry, Collaborators, GitCli, GitHubHost, HealthConfig,
    HttpCatalogSource, HttpDocumentationIndex, ProbeEngine, ProbeRegistry, ScoreEngine,
    ScoringRegistry,
};
use plugin_health_state::{
    connect, Plugin, PluginStore, Score, ScoreStore, SurrealPluginStore, SurrealScoreStore,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "plugin-health")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plugin health probes and scores", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./plugin-health.toml when present)
    #[arg(long, global = true, env = "PLUGIN_HEALTH_CONFIG")]
    config: Option<PathBuf>,

    /// Plugins processed at the same time
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update-center catalog operations
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Probe operations
    Probes {
        #[command(subcommand)]
        action: ProbesAction,
    },

    /// Score operations
    Scores {
        #[command(subcommand)]
        action: ScoresAction,
    },

    /// Inspect the scoring set
    Scorings {
        #[command(subcommand)]
        action: ScoringsAction,
    },

    /// Print probe and scoring counts as JSON
    Report,

    /// Print a plugin's details and latest score as JSON
    Show {
        /// Plugin name
        name: String,

        /// Include every stored score, newest first
        #[arg(long)]
        history: bool,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Create or refresh a tracked plugin for every catalog entry
    Sync,
}

#[derive(Subcommand)]
enum ProbesAction {
    /// Run the probe set
    Run {
        /// Only probe this plugin
        #[arg(long)]
        plugin: Option<String>,
    },
    /// List the probe set in execution order
    List,
}

#[derive(Subcommand)]
enum ScoresAction {
    /// Recompute stale scores
    Run {
        /// Only score this plugin
        #[arg(long)]
        plugin: Option<String>,
    },
}

#[derive(Subcommand)]
enum ScoringsAction {
    /// List the scoring set with weights and versions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    let mut config = HealthConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(n) = cli.max_concurrent {
        config.max_concurrent = n;
    }

    match cli.command {
        Commands::Probes {
            action: ProbesAction::List,
        } => {
            print_lines(probe_lines(&ProbeRegistry::standard()));
            Ok(())
        }
        Commands::Scorings {
            action: ScoringsAction::List,
        } => {
            print_lines(scoring_lines(&ScoringRegistry::standard()));
            Ok(())
        }
        command => {
            let app = App::connect(config).await?;
            app.dispatch(command).await
        }
    }
}

/// Everything a database-backed command needs.
struct App {
    config: HealthConfig,
    http: reqwest::Client,
    plugins: Arc<dyn PluginStore>,
    scores: Arc<dyn ScoreStore>,
}

impl App {
    async fn connect(config: HealthConfig) -> Result<Self> {
        let db = connect(&config.store_config())
            .await
            .context("Failed to connect to plugin health database")?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("plugin-health/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            http,
            plugins: Arc::new(SurrealPluginStore::new(db.clone())),
            scores: Arc::new(SurrealScoreStore::new(db)),
        })
    }

    async fn dispatch(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Catalog {
                action: CatalogAction::Sync,
            } => self.cmd_catalog_sync().await,
            Commands::Probes {
                action: ProbesAction::Run { plugin },
            } => self.cmd_probes_run(plugin.as_deref()).await,
            Commands::Scores {
                action: ScoresAction::Run { plugin },
            } => self.cmd_scores_run(plugin.as_deref()).await,
            Commands::Report => cmd_report(self.plugins.as_ref(), self.scores.as_ref()).await,
            Commands::Show { name, history } => {
                cmd_show(self.plugins.as_ref(), self.scores.as_ref(), &name, history).await
            }
            // Listed in main without a store.
            Commands::Probes {
                action: ProbesAction::List,
            }
            | Commands::Scorings {
                action: ScoringsAction::List,
            } => Ok(()),
        }
    }

    fn catalog(&self) -> HttpCatalogSource {
        HttpCatalogSource::new(self.http.clone(), self.config.update_center_url.clone())
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            catalog: Arc::new(self.catalog()),
            documentation: Arc::new(HttpDocumentationIndex::new(
                self.http.clone(),
                self.config.documentation_url.clone(),
            )),
            source: Arc::new(GitCli),
            host: Arc::new(GitHubHost::new(
                self.http.clone(),
                self.config.github_api_url.clone(),
                self.config.github_token.clone(),
            )),
        }
    }

    async fn cmd_catalog_sync(&self) -> Result<()> {
        let summary = sync_catalog(&self.catalog(), self.plugins.as_ref())
            .await
            .context("catalog sync failed")?;
        println!(
            "Synced catalog: {} created, {} updated, {} failed",
            summary.created, summary.updated, summary.failed
        );
        Ok(())
    }

    async fn cmd_probes_run(&self, plugin: Option<&str>) -> Result<()> {
        let mut engine = ProbeEngine::new(
            Arc::new(ProbeRegistry::standard()),
            Arc::clone(&self.plugins),
            self.collaborators(),
        )
        .with_max_concurrent(self.config.max_concurrent)
        .with_cancellation(interrupt_flag());
        if let Some(dir) = &self.config.work_dir {
            engine = engine.with_work_dir(dir.clone());
        }

        if let Some(name) = plugin {
            let probed = engine
                .run_on(name)
                .await
                .with_context(|| format!("Failed to probe '{}'", name))?;
            return print_json(&probed);
        }

        let summary = engine.run().await.context("probe pass failed")?;
        println!(
            "Probed {} plugins ({} failed){}",
            summary.processed,
            summary.failed,
            if summary.cancelled { ", interrupted" } else { "" }
        );
        Ok(())
    }

    async fn cmd_scores_run(&self, plugin: Option<&str>) -> Result<()> {
        let engine = ScoreEngine::new(
            Arc::new(ScoringRegistry::standard()),
            Arc::clone(&self.plugins),
            Arc::clone(&self.scores),
        )
        .with_max_concurrent(self.config.max_concurrent)
        .with_cancellation(interrupt_flag());

        if let Some(name) = plugin {
            let plugin = find_plugin(self.plugins.as_ref(), name).await?;
            let score = engine
                .run_on(&plugin)
                .await
                .with_context(|| format!("Failed to score '{}'", name))?;
            return print_json(&score);
        }

        let summary = engine.run().await.context("score pass failed")?;
        println!(
            "Scored {} plugins, {} unchanged ({} failed){}",
            summary.computed,
            summary.reused,
            summary.failed,
            if summary.cancelled { ", interrupted" } else { "" }
        );
        Ok(())
    }
}

/// Flips to `true` on the first Ctrl-C. In-flight plugins finish; no new
/// plugin starts.
fn interrupt_flag() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight plugins");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn find_plugin(store: &dyn PluginStore, name: &str) -> Result<Plugin> {
    store
        .find_plugin(name)
        .await?
        .with_context(|| format!("Plugin '{}' is not tracked. Run 'plugin-health catalog sync' first.", name))
}

async fn cmd_report(plugins: &dyn PluginStore, scores: &dyn ScoreStore) -> Result<()> {
    let report = collect(plugins, scores).await?;
    info!(plugins = report.plugins, scored = report.scored_plugins, "report collected");
    print_json(&report)
}

#[derive(Serialize)]
struct PluginView {
    plugin: Plugin,
    score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<Vec<Score>>,
}

async fn plugin_view(
    plugins: &dyn PluginStore,
    scores: &dyn ScoreStore,
    name: &str,
    history: bool,
) -> Result<PluginView> {
    let plugin = find_plugin(plugins, name).await?;
    let score = scores.latest_score(name).await?;
    let history = if history {
        Some(scores.score_history(name).await?)
    } else {
        None
    };
    Ok(PluginView {
        plugin,
        score,
        history,
    })
}

async fn cmd_show(
    plugins: &dyn PluginStore,
    scores: &dyn ScoreStore,
    name: &str,
    history: bool,
) -> Result<()> {
    print_json(&plugin_view(plugins, scores, name, history).await?)
}

fn probe_lines(registry: &ProbeRegistry) -> Vec<String> {
    registry
        .iter()
        .map(|p| format!("{:>2}  {:<34} {}", p.order(), p.key(), p.description()))
        .collect()
}

fn scoring_lines(registry: &ScoringRegistry) -> Vec<String> {
    registry
        .iter()
        .map(|s| {
            format!(
                "{:<34} weight {:.2}  v{}  {}",
                s.key(),
                s.weight(),
                s.version(),
                s.description()
            )
        })
        .collect()
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
