//! Dual-write coordination between the remote platform and the local store.
//!
//! Remote state is always written first. When the local write that follows
//! fails, a single compensating remote call undoes the remote write:
//!
//! ```text
//! create:  create_remote ──► create_local ──✗──► compensate_remote ──┬─► RolledBack
//!                                                                    └─► ManualCleanupRequired
//! delete:  delete_remote ──► delete_local ──✗──► recreate_remote ────┬─► RolledBack
//!                                                                    └─► IrrecoverableDivergence
//! ```

use std::future::Future;

use common::RemoteId;

use crate::error::{Result, SyncError};
use crate::gateway::{RemoteError, RemoteGateway, RemoteResource, ResourceKind};

/// A compensating remote call that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Remote objects still alive without a local record.
    pub remote_ids: Vec<RemoteId>,
    pub cause: String,
}

/// A compensating recreate that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecreateFailure {
    /// Recreated remote object no local record points at.
    pub orphaned: Option<RemoteId>,
    pub cause: String,
}

impl From<SyncError> for RecreateFailure {
    fn from(e: SyncError) -> Self {
        Self {
            orphaned: None,
            cause: e.to_string(),
        }
    }
}

/// Creates a remote object, then its local record.
///
/// If `create_local` fails, `compensate_remote` runs exactly once with the
/// handle `create_remote` produced. A failure of `create_remote` itself is
/// returned unchanged and nothing else runs.
pub async fn create_with_compensation<H, T, CR, FR, CL, FL, CC, FC>(
    operation: &'static str,
    create_remote: CR,
    create_local: CL,
    compensate_remote: CC,
) -> Result<T>
where
    H: Clone,
    CR: FnOnce() -> FR,
    FR: Future<Output = Result<H>>,
    CL: FnOnce(H) -> FL,
    FL: Future<Output = Result<T>>,
    CC: FnOnce(H) -> FC,
    FC: Future<Output = std::result::Result<(), CleanupFailure>>,
{
    metrics::counter!("dual_write_total", "operation" => operation, "path" => "create")
        .increment(1);

    let handle = create_remote().await?;

    let local_err = match create_local(handle.clone()).await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    tracing::warn!(operation, error = %local_err, "local write failed, deleting remote object");
    metrics::counter!("dual_write_compensations_total", "operation" => operation).increment(1);

    match compensate_remote(handle).await {
        Ok(()) => Err(SyncError::RolledBack {
            operation,
            source: Box::new(local_err),
        }),
        Err(failure) => {
            metrics::counter!("dual_write_fatal_total", "operation" => operation).increment(1);
            tracing::error!(
                operation,
                remote_ids = ?failure.remote_ids,
                error = %local_err,
                cleanup_error = %failure.cause,
                "remote objects orphaned, manual cleanup required"
            );
            Err(SyncError::ManualCleanupRequired {
                operation,
                remote_ids: failure.remote_ids,
                cause: format!("{local_err}; cleanup failed: {}", failure.cause),
            })
        }
    }
}

/// Deletes a remote object, then its local record.
///
/// A remote object that is already gone counts as deleted. If `delete_local`
/// fails after the remote delete went through, `recreate_remote` runs exactly
/// once; it must also point every local reference at the new identity. A
/// recreated object left without a local reference is reported as orphaned.
pub async fn delete_with_compensation<CR, FR, CL, FL, CC, FC>(
    operation: &'static str,
    remote_id: &RemoteId,
    delete_remote: CR,
    delete_local: CL,
    recreate_remote: CC,
) -> Result<()>
where
    CR: FnOnce() -> FR,
    FR: Future<Output = std::result::Result<(), RemoteError>>,
    CL: FnOnce() -> FL,
    FL: Future<Output = Result<()>>,
    CC: FnOnce() -> FC,
    FC: Future<Output = std::result::Result<RemoteId, RecreateFailure>>,
{
    metrics::counter!("dual_write_total", "operation" => operation, "path" => "delete")
        .increment(1);

    let remote_deleted = match delete_remote().await {
        Ok(()) => true,
        Err(e) if e.is_not_found() => {
            tracing::info!(operation, %remote_id, "remote object already gone");
            false
        }
        Err(e) => return Err(e.into()),
    };

    let local_err = match delete_local().await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    // Nothing was removed remotely, so there is nothing to restore.
    if !remote_deleted {
        return Err(local_err);
    }

    tracing::warn!(operation, %remote_id, error = %local_err, "local delete failed, recreating remote object");
    metrics::counter!("dual_write_compensations_total", "operation" => operation).increment(1);

    match recreate_remote().await {
        Ok(new_id) => {
            tracing::info!(operation, old = %remote_id, new = %new_id, "remote object recreated");
            Err(SyncError::RolledBack {
                operation,
                source: Box::new(local_err),
            })
        }
        Err(failure) => {
            metrics::counter!("dual_write_fatal_total", "operation" => operation).increment(1);
            tracing::error!(
                operation,
                %remote_id,
                orphaned = ?failure.orphaned,
                error = %local_err,
                recreate_error = %failure.cause,
                "remote object deleted but local record kept, state diverged"
            );
            Err(SyncError::IrrecoverableDivergence {
                operation,
                remote_id: remote_id.clone(),
                orphaned: failure.orphaned,
                cause: format!("{local_err}; recreate failed: {}", failure.cause),
            })
        }
    }
}

/// Pairs remote calls on a [`RemoteGateway`] with local writes.
#[derive(Debug, Clone)]
pub struct DualWriteCoordinator<R> {
    gateway: R,
}

impl<R: RemoteGateway> DualWriteCoordinator<R> {
    /// Creates a new coordinator.
    pub fn new(gateway: R) -> Self {
        Self { gateway }
    }

    /// Gets a reference to the underlying gateway.
    pub fn gateway(&self) -> &R {
        &self.gateway
    }

    /// Creates one remote object, then runs `create_local` with its identity.
    pub async fn create<T, CL, FL>(
        &self,
        operation: &'static str,
        resource: RemoteResource,
        create_local: CL,
    ) -> Result<T>
    where
        CL: FnOnce(RemoteId) -> FL,
        FL: Future<Output = Result<T>>,
    {
        let kind = resource.kind();
        let gateway = &self.gateway;
        let resource = &resource;
        create_with_compensation(
            operation,
            move || async move { Ok(gateway.create(resource).await?) },
            create_local,
            move |id: RemoteId| self.delete_all(kind, vec![id]),
        )
        .await
    }

    /// Creates several remote objects, then runs one `create_local` with
    /// their identities in input order.
    pub async fn create_many<T, CL, FL>(
        &self,
        operation: &'static str,
        resources: Vec<RemoteResource>,
        create_local: CL,
    ) -> Result<T>
    where
        CL: FnOnce(Vec<RemoteId>) -> FL,
        FL: Future<Output = Result<T>>,
    {
        let resources = &resources;
        create_with_compensation(
            operation,
            move || self.create_batch(operation, resources),
            create_local,
            move |ids: Vec<RemoteId>| async move {
                let mut orphaned = Vec::new();
                let mut causes = Vec::new();
                for (resource, id) in resources.iter().zip(ids) {
                    if let Err(failure) = self.delete_all(resource.kind(), vec![id]).await {
                        orphaned.extend(failure.remote_ids);
                        causes.push(failure.cause);
                    }
                }
                if orphaned.is_empty() {
                    Ok(())
                } else {
                    Err(CleanupFailure {
                        remote_ids: orphaned,
                        cause: causes.join("; "),
                    })
                }
            },
        )
        .await
    }

    /// Deletes a remote object, then runs `delete_local`.
    ///
    /// On local failure `recreate` is created again and `repoint` receives
    /// the new identity to update local references. If `repoint` fails the
    /// new identity is reported as orphaned.
    pub async fn delete<CL, FL, CP, FP>(
        &self,
        operation: &'static str,
        kind: ResourceKind,
        remote_id: &RemoteId,
        recreate: RemoteResource,
        delete_local: CL,
        repoint: CP,
    ) -> Result<()>
    where
        CL: FnOnce() -> FL,
        FL: Future<Output = Result<()>>,
        CP: FnOnce(RemoteId) -> FP,
        FP: Future<Output = Result<()>>,
    {
        let gateway = &self.gateway;
        delete_with_compensation(
            operation,
            remote_id,
            move || gateway.delete(kind, remote_id),
            delete_local,
            move || async move {
                let new_id = gateway
                    .create(&recreate)
                    .await
                    .map_err(|e| RecreateFailure::from(SyncError::from(e)))?;
                match repoint(new_id.clone()).await {
                    Ok(()) => Ok(new_id),
                    Err(e) => Err(RecreateFailure {
                        cause: format!(
                            "recreated {kind} {new_id} but could not point local records at it: {e}"
                        ),
                        orphaned: Some(new_id),
                    }),
                }
            },
        )
        .await
    }

    /// Creates remote objects one after another.
    ///
    /// A failure part-way deletes the objects already created. If that
    /// cleanup fails too, the survivors are reported for manual cleanup.
    async fn create_batch(
        &self,
        operation: &'static str,
        resources: &[RemoteResource],
    ) -> Result<Vec<RemoteId>> {
        let mut created: Vec<(ResourceKind, RemoteId)> = Vec::with_capacity(resources.len());
        for resource in resources {
            match self.gateway.create(resource).await {
                Ok(id) => created.push((resource.kind(), id)),
                Err(create_err) => {
                    if created.is_empty() {
                        return Err(create_err.into());
                    }

                    tracing::warn!(
                        operation,
                        created = created.len(),
                        error = %create_err,
                        "remote batch create failed part-way, deleting created objects"
                    );
                    metrics::counter!("dual_write_compensations_total", "operation" => operation)
                        .increment(1);

                    let mut orphaned = Vec::new();
                    for (kind, id) in created {
                        if let Err(failure) = self.delete_all(kind, vec![id]).await {
                            orphaned.extend(failure.remote_ids);
                        }
                    }
                    if orphaned.is_empty() {
                        return Err(create_err.into());
                    }

                    metrics::counter!("dual_write_fatal_total", "operation" => operation)
                        .increment(1);
                    tracing::error!(operation, remote_ids = ?orphaned, "remote objects orphaned, manual cleanup required");
                    return Err(SyncError::ManualCleanupRequired {
                        operation,
                        remote_ids: orphaned,
                        cause: create_err.to_string(),
                    });
                }
            }
        }
        Ok(created.into_iter().map(|(_, id)| id).collect())
    }

    /// Deletes remote objects of one kind, one attempt each.
    async fn delete_all(
        &self,
        kind: ResourceKind,
        ids: Vec<RemoteId>,
    ) -> std::result::Result<(), CleanupFailure> {
        let mut orphaned = Vec::new();
        let mut causes = Vec::new();
        for id in ids {
            match self.gateway.delete(kind, &id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    causes.push(e.to_string());
                    orphaned.push(id);
                }
            }
        }
        if orphaned.is_empty() {
            Ok(())
        } else {
            Err(CleanupFailure {
                remote_ids: orphaned,
                cause: causes.join("; "),
            })
        }
    }
}
