use thiserror::Error;

/// Errors that can occur when interacting with the record store.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// A row addressed by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A stored value could not be mapped back onto the model.
    #[error("Could not decode stored {entity}: {reason}")]
    Decode { entity: &'static str, reason: String },

    /// The operation was refused by the backend.
    #[error("Record store operation '{operation}' failed: {reason}")]
    OperationFailed {
        operation: &'static str,
        reason: String,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, RecordStoreError>;
