//! Storage-specific error type wrapping sqlx errors.

use gateway_addon_domain::error::AddonError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// A stored settings blob is not valid JSON.
    #[error("JSON deserialization error")]
    Json(#[from] serde_json::Error),

    /// No database path was configured and none of the candidates exist.
    #[error("database path unknown")]
    PathUnknown,
}

impl From<StorageError> for AddonError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_to_storage_error() {
        let err: AddonError = StorageError::PathUnknown.into();
        assert!(matches!(err, AddonError::Storage(_)));
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "database path unknown"
        );
    }
}
