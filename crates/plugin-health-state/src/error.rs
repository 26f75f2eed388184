//! Error types for plugin-health-state

use thiserror::Error;

/// Errors raised by the storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Query or driver failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored row could not be converted back into a model value
    #[error("Corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Violations of model invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid weight {weight} for scoring '{key}': must be within [0, 1]")]
    InvalidWeight { key: String, weight: f32 },

    #[error("invalid value {value} for scoring '{key}': must be within [0, 100]")]
    InvalidValue { key: String, value: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_weight_display_names_key() {
        let err = ModelError::InvalidWeight {
            key: "adoption".to_string(),
            weight: 1.5,
        };
        assert_eq!(
            err.to_string(),
            "invalid weight 1.5 for scoring 'adoption': must be within [0, 1]"
        );
    }

    #[test]
    fn corrupt_display_names_table() {
        let err = StorageError::Corrupt {
            table: "scores",
            detail: "bad weight".to_string(),
        };
        assert_eq!(err.to_string(), "Corrupt record in scores: bad weight");
    }
}
