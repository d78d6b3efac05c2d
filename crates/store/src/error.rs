use thiserror::Error;

/// Errors that can occur when interacting with the store.
///
/// None of these are business-rule violations; callers above the store treat
/// every variant as an internal failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be mapped onto its record type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<common::ParseEnumError> for StoreError {
    fn from(err: common::ParseEnumError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
