//! Plugin-Health-Core: probe and score engines
//!
//! ## Layer 1 - Domain Logic
//!
//! Probes inspect each tracked plugin and leave durable records on it.
//! Scorings turn those records into a weighted 0..=100 score.
//!
//! ## Key Components
//!
//! - `ProbeEngine`: sequential probe pass per plugin, plugins in parallel
//! - `ScoreEngine`: incremental score recomputation
//! - `CatalogSource` / `DocumentationIndex`: batch-wide inputs
//! - `SourceControl` / `RepositoryHost`: repository access for probes
//! - `HealthConfig`: TOML and environment configuration

pub mod catalog;
pub mod config;
pub mod error;
pub mod fakes;
pub mod ingest;
pub mod metrics;
pub mod obs;
pub mod probes;
pub mod report;
pub mod scoring;
pub mod source;
pub mod telemetry;

pub use catalog::{
    Catalog, CatalogPlugin, CatalogSource, DocumentationIndex, DocumentationUrls,
    HttpCatalogSource, HttpDocumentationIndex,
};
pub use config::HealthConfig;
pub use error::{CatalogError, HealthError, ProbeError, Result, ScoringError, SourceError};
pub use ingest::{sync_catalog, SyncSummary};
pub use probes::{Collaborators, Finding, Probe, ProbeEngine, ProbeRegistry, ProbeRunSummary};
pub use report::{collect, HealthReport, ScoringTally};
pub use scoring::{Scoring, ScoringRegistry, ScoreEngine, ScoreRunSummary};
pub use source::{Checkout, GitCli, GitHubHost, RepositoryHost, RepositoryInfo, SourceControl};
