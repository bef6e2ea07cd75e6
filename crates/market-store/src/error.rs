use thiserror::Error;

/// Errors that can occur when interacting with the market store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded into its domain type.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for market store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
