//! Fulfillment services, one per actor, paired with a remote object.

use common::{ActorId, RemoteId};
use domain::FulfillmentService;
use record_store::{RecordStore, RecordTransaction};

use crate::coordinator::DualWriteCoordinator;
use crate::error::{Result, SyncError};
use crate::gateway::{RemoteGateway, RemoteResource, ResourceKind};
use crate::local::transaction;

/// Keeps the remote and local halves of fulfillment services together.
pub struct FulfillmentManager<S, R> {
    store: S,
    coordinator: DualWriteCoordinator<R>,
    name: String,
    callback_url: String,
}

impl<S, R> FulfillmentManager<S, R>
where
    S: RecordStore,
    R: RemoteGateway,
{
    /// Creates a manager that registers services under `name` and `callback_url`.
    pub fn new(
        store: S,
        gateway: R,
        name: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            coordinator: DualWriteCoordinator::new(gateway),
            name: name.into(),
            callback_url: callback_url.into(),
        }
    }

    /// Returns the fulfillment service of `owner`, creating it if needed.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create(&self, owner: ActorId) -> Result<FulfillmentService> {
        if let Some(existing) = self.find(owner).await? {
            return Ok(existing);
        }

        let store = &self.store;
        let service = self
            .coordinator
            .create(
                "create fulfillment service",
                self.resource(owner),
                move |remote_id| {
                    transaction(store, move |tx| {
                        Box::pin(async move {
                            Ok(tx.insert_fulfillment_service(owner, &remote_id).await?)
                        })
                    })
                },
            )
            .await?;

        tracing::info!(remote_id = %service.remote_id, "fulfillment service created");
        Ok(service)
    }

    /// Deletes the fulfillment service of `owner`.
    ///
    /// The local record must exist and point at `remote_id`; otherwise
    /// nothing is called remotely.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, owner: ActorId, remote_id: &RemoteId) -> Result<()> {
        match self.find(owner).await? {
            Some(existing) if existing.remote_id == *remote_id => {}
            _ => {
                return Err(SyncError::NotFound {
                    entity: "fulfillment service",
                    id: remote_id.to_string(),
                });
            }
        }

        let store = &self.store;
        self.coordinator
            .delete(
                "delete fulfillment service",
                ResourceKind::FulfillmentService,
                remote_id,
                self.resource(owner),
                move || {
                    transaction(store, move |tx| {
                        Box::pin(async move {
                            tx.delete_fulfillment_service(owner).await?;
                            Ok(())
                        })
                    })
                },
                move |new_id| {
                    transaction(store, move |tx| {
                        Box::pin(async move {
                            Ok(tx.update_fulfillment_service_remote_id(owner, &new_id).await?)
                        })
                    })
                },
            )
            .await?;

        tracing::info!("fulfillment service deleted");
        Ok(())
    }

    async fn find(&self, owner: ActorId) -> Result<Option<FulfillmentService>> {
        transaction(&self.store, move |tx| {
            Box::pin(async move { Ok(tx.find_fulfillment_service(owner).await?) })
        })
        .await
    }

    fn resource(&self, owner: ActorId) -> RemoteResource {
        RemoteResource::FulfillmentService {
            owner,
            name: self.name.clone(),
            callback_url: self.callback_url.clone(),
        }
    }
}
