//! Reconciliation error types.

use common::RemoteId;
use domain::ValidationError;
use record_store::RecordStoreError;
use thiserror::Error;

use crate::gateway::RemoteError;

/// Errors that can occur while coordinating remote and local writes.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The desired state violates a model invariant. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A remote call failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A local store call failed.
    #[error("Record store error: {0}")]
    Store(#[from] RecordStoreError),

    /// The local write failed after the remote write succeeded, and the
    /// remote write was undone.
    #[error("{operation} rolled back: {source}")]
    RolledBack {
        operation: &'static str,
        source: Box<SyncError>,
    },

    /// Remote objects were created but could not be removed after the
    /// local write failed.
    #[error("{operation} left remote objects without local records {remote_ids:?}: {cause}")]
    ManualCleanupRequired {
        operation: &'static str,
        remote_ids: Vec<RemoteId>,
        cause: String,
    },

    /// A remote object was deleted, the local delete failed, and the remote
    /// object could not be restored. `orphaned` is a recreated object that
    /// no local record points at.
    #[error("{operation} diverged: remote {remote_id} is gone but its local record remains (orphaned: {orphaned:?}): {cause}")]
    IrrecoverableDivergence {
        operation: &'static str,
        remote_id: RemoteId,
        orphaned: Option<RemoteId>,
        cause: String,
    },

    /// Persisted data contradicts what the engine just wrote.
    #[error("Reconciliation invariant violated: {0}")]
    Invariant(String),

    /// An addressed record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl SyncError {
    /// Returns true for states that need manual intervention.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::ManualCleanupRequired { .. } | SyncError::IrrecoverableDivergence { .. }
        )
    }

    /// Returns the message to show the user.
    ///
    /// Fatal errors only expose the remote ids support needs to clean up.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Validation(e) => e.to_string(),
            SyncError::Remote(e) => format!("The commerce platform could not complete the request: {e}"),
            SyncError::RolledBack { source, .. } => source.user_message(),
            SyncError::ManualCleanupRequired { remote_ids, .. } => support_message(remote_ids),
            SyncError::IrrecoverableDivergence {
                remote_id,
                orphaned,
                ..
            } => {
                let mut ids = vec![remote_id.clone()];
                ids.extend(orphaned.iter().cloned());
                support_message(&ids)
            }
            SyncError::NotFound { entity, .. } => format!("The requested {entity} does not exist"),
            SyncError::Store(_) | SyncError::Invariant(_) => {
                "An unexpected error occurred. Please try again".to_string()
            }
        }
    }
}

fn support_message(remote_ids: &[RemoteId]) -> String {
    let ids: Vec<&str> = remote_ids.iter().map(RemoteId::as_str).collect();
    format!(
        "Something went wrong and needs manual attention. Please contact support and mention: {}",
        ids.join(", ")
    )
}

/// Convenience type alias for reconciliation results.
pub type Result<T> = std::result::Result<T, SyncError>;
