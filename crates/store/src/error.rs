use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be mapped onto its Rust type.
    #[error("Cannot decode column {column}: {reason}")]
    Decode {
        column: &'static str,
        reason: String,
    },

    /// A write would have broken a table constraint.
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
