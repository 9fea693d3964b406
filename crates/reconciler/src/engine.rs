//! Caller-facing facade over the reconciliation services.

use common::{ActorId, PartnershipRequestId, PriceListId, RemoteId};
use domain::{FulfillmentService, Partnership, PartnershipRequest, RelationshipState, RequestKind};
use record_store::RecordStore;

use crate::config::Config;
use crate::error::Result;
use crate::fulfillment::FulfillmentManager;
use crate::gateway::RemoteGateway;
use crate::partnership::{AccessOutcome, PartnershipEngine, SubmitRequest};
use crate::price_list::{DesiredPriceList, PriceListService, ReconcileOutcome};

/// Bundles the price-list, partnership and fulfillment services over one
/// record store and one remote gateway.
pub struct SyncEngine<S, R> {
    price_lists: PriceListService<S, R>,
    partnerships: PartnershipEngine<S>,
    fulfillment: FulfillmentManager<S, R>,
}

impl<S, R> SyncEngine<S, R>
where
    S: RecordStore + Clone,
    R: RemoteGateway + Clone,
{
    /// Creates an engine; fulfillment services are registered with the
    /// name and callback from `config`.
    pub fn new(store: S, gateway: R, config: &Config) -> Self {
        Self {
            price_lists: PriceListService::new(store.clone(), gateway.clone()),
            partnerships: PartnershipEngine::new(store.clone()),
            fulfillment: FulfillmentManager::new(
                store,
                gateway,
                config.fulfillment_service_name.clone(),
                config.fulfillment_callback_url.clone(),
            ),
        }
    }

    /// Returns the price-list service.
    pub fn price_lists(&self) -> &PriceListService<S, R> {
        &self.price_lists
    }

    /// Returns the partnership engine.
    pub fn partnerships(&self) -> &PartnershipEngine<S> {
        &self.partnerships
    }

    /// Returns the fulfillment manager.
    pub fn fulfillment(&self) -> &FulfillmentManager<S, R> {
        &self.fulfillment
    }

    pub async fn reconcile_price_list(
        &self,
        price_list_id: PriceListId,
        desired: DesiredPriceList,
    ) -> Result<ReconcileOutcome> {
        self.price_lists.reconcile(price_list_id, desired).await
    }

    pub async fn create_price_list_and_attach(
        &self,
        desired: DesiredPriceList,
        owner: ActorId,
    ) -> Result<ReconcileOutcome> {
        self.price_lists.create_and_attach(owner, desired).await
    }

    pub async fn delete_price_lists(&self, owner: ActorId, ids: &[PriceListId]) -> Result<u64> {
        self.price_lists.delete_price_lists(owner, ids).await
    }

    pub async fn approve_partnership_requests(
        &self,
        ids: &[PartnershipRequestId],
        kind: RequestKind,
    ) -> Result<Vec<Partnership>> {
        self.partnerships.approve(ids, kind).await
    }

    pub async fn submit_partnership_request(
        &self,
        request: SubmitRequest,
    ) -> Result<PartnershipRequest> {
        self.partnerships.submit(request).await
    }

    pub async fn reject_partnership_requests(&self, ids: &[PartnershipRequestId]) -> Result<u64> {
        self.partnerships.reject(ids).await
    }

    pub async fn request_access(
        &self,
        retailer_id: ActorId,
        supplier_id: ActorId,
        price_list_ids: Vec<PriceListId>,
        message: impl Into<String>,
    ) -> Result<AccessOutcome> {
        self.partnerships
            .request_access(retailer_id, supplier_id, price_list_ids, message.into())
            .await
    }

    pub async fn relationship_state(
        &self,
        retailer_id: ActorId,
        supplier_id: ActorId,
    ) -> Result<RelationshipState> {
        self.partnerships
            .relationship_state(retailer_id, supplier_id)
            .await
    }

    pub async fn get_or_create_fulfillment_service(
        &self,
        owner: ActorId,
    ) -> Result<FulfillmentService> {
        self.fulfillment.get_or_create(owner).await
    }

    pub async fn delete_fulfillment_service(&self, owner: ActorId, remote_id: &RemoteId) -> Result<()> {
        self.fulfillment.delete(owner, remote_id).await
    }
}
