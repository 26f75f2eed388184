//! Error types for the plugin health engines.

use plugin_health_state::{ModelError, StorageError};
use thiserror::Error;

/// Failure of a single probe execution. Converted to an error record by the
/// probe engine; never propagated past it.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{probe} does not meet the criteria to be executed on {plugin}")]
    RequirementsNotMet { probe: String, plugin: String },

    #[error("{0} is not in the update-center")]
    NotInCatalog(String),

    #[error("no source checkout available for {0}")]
    NoCheckout(String),

    #[error("source control failure: {0}")]
    Source(#[from] SourceError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// Failure while evaluating a scoring for one plugin.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("malformed '{probe}' record: {detail}")]
    MalformedRecord { probe: String, detail: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("scoring panicked: {0}")]
    Panicked(String),
}

/// Failure fetching a batch-wide input.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("request to {url} failed: {detail}")]
    Http { url: String, detail: String },

    #[error("invalid payload from {url}: {detail}")]
    Decode { url: String, detail: String },
}

/// Failure of the source-control or repository-host collaborators.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("git {command} failed: {detail}")]
    Git { command: String, detail: String },

    #[error("invalid commit date '{0}'")]
    CommitDate(String),

    #[error("repository host request failed: {0}")]
    Host(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level errors of the engines.
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("no scoring could be computed for {0}")]
    NothingToScore(String),

    #[error("scratch space unavailable: {0}")]
    Scratch(std::io::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, HealthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_not_met_display() {
        let err = ProbeError::RequirementsNotMet {
            probe: "jenkinsfile".to_string(),
            plugin: "mailer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "jenkinsfile does not meet the criteria to be executed on mailer"
        );
    }

    #[test]
    fn catalog_error_wraps_into_health_error() {
        let err: HealthError = CatalogError::Http {
            url: "https://updates.example/uc.json".to_string(),
            detail: "timeout".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "catalog unavailable: request to https://updates.example/uc.json failed: timeout"
        );
    }

    #[test]
    fn nothing_to_score_display() {
        let err = HealthError::NothingToScore("mailer".to_string());
        assert_eq!(err.to_string(), "no scoring could be computed for mailer");
    }
}
