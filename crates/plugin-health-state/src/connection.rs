//! SurrealDB connection setup
//!
//! Supports in-memory, local (surrealkv), plain URL and authenticated
//! remote (WebSocket) connections. Every connection runs the schema
//! migrations before it is handed out.

use std::path::PathBuf;

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StorageError;
use crate::migrations;
use crate::storage_traits::StorageResult;

const DEFAULT_NAMESPACE: &str = "plugin_health";
const DEFAULT_DATABASE: &str = "main";
const DEFAULT_LOCAL_PATH: &str = ".plugin-health/db";

/// Credentials for an authenticated remote SurrealDB server
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "plugin_health")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "plugin_health")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Where the stores live.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Volatile `mem://` database.
    Memory,
    /// Embedded surrealkv database under the given directory.
    Local(PathBuf),
    /// Unauthenticated connection to any SurrealDB URL.
    Url(String),
    /// Authenticated remote server.
    Cloud(CloudConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local(PathBuf::from(DEFAULT_LOCAL_PATH))
    }
}

/// Open a connection, select the namespace and database, and migrate.
#[instrument(skip_all)]
pub async fn connect(config: &StoreConfig) -> StorageResult<Surreal<Any>> {
    let db = match config {
        StoreConfig::Memory => open("mem://", DEFAULT_NAMESPACE, DEFAULT_DATABASE).await?,
        StoreConfig::Url(url) => open(url, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await?,
        StoreConfig::Local(path) => {
            std::fs::create_dir_all(path).map_err(|e| {
                StorageError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let url = format!("surrealkv://{}", path.display());
            open(&url, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await?
        }
        StoreConfig::Cloud(cloud) => open_cloud(cloud).await?,
    };

    migrations::init_schema(&db).await?;
    Ok(db)
}

async fn open(url: &str, namespace: &str, database: &str) -> StorageResult<Surreal<Any>> {
    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StorageError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    db.use_ns(namespace)
        .use_db(database)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    info!(url = %url, "SurrealDB connected");
    Ok(db)
}

async fn open_cloud(config: &CloudConfig) -> StorageResult<Surreal<Any>> {
    info!(endpoint = %config.endpoint, root = config.is_root, "Connecting to SurrealDB Cloud");

    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| {
            StorageError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
        })?;

    if config.is_root {
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StorageError::Connection(format!("Root auth failed: {e}")))?;
    } else {
        db.signin(Database {
            namespace: &config.namespace,
            database: &config.database,
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StorageError::Connection(format!("DB auth failed: {e}")))?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(db)
}
