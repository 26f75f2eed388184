//! Plugin-Health-State: persistence layer for plugin health scoring
//!
//! This crate owns the data that flows between the probe and score engines
//! and the storage backends that keep it.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: record identity, merge semantics and durable history.
//!
//! ## Key Components
//!
//! - `Plugin`: an entity with its per-probe detail map
//! - `ProbeResult`: immutable outcome of one probe execution
//! - `Score` / `ScoreResult` / `ComponentResult`: weighted scoring records
//! - `PluginStore` / `ScoreStore`: backend-agnostic storage traits
//! - `SurrealPluginStore` / `SurrealScoreStore`: SurrealDB implementations

pub mod connection;
mod error;
pub mod fakes;
pub mod migrations;
pub mod model;
pub mod score;
pub mod storage_traits;
pub mod surreal_store;

pub use connection::{connect, CloudConfig, StoreConfig};
pub use error::{ModelError, StorageError};
pub use model::{Plugin, ProbeResult, ProbeStatus};
pub use score::{weighted_average, ComponentResult, Resolution, Score, ScoreId, ScoreResult};
pub use storage_traits::{PluginStore, ScoreStore, StorageResult};
pub use surreal_store::{SurrealPluginStore, SurrealScoreStore};
