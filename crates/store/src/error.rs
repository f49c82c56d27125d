use thiserror::Error;

/// Errors that can occur when reading or writing the booking ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A value does not fit its database column.
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
