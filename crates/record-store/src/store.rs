use async_trait::async_trait;
use common::{
    ActorId, PartnershipId, PartnershipRequestId, PriceListId, ProductId, RemoteId, VariantId,
};
use domain::{
    FulfillmentService, NewPartnership, NewPartnershipRequest, NewProduct, NewVariant,
    Partnership, PartnershipRequest, PriceList, PriceListSettings, Product, RequestStatus, Variant,
    VariantUpdate,
};
use futures_util::future::BoxFuture;

use crate::{RecordStoreError, RequestQuery, Result};

/// Core trait for local record store implementations.
///
/// Every read and write goes through a [`RecordTransaction`]. Changes made
/// through a transaction become visible only when it is committed; dropping
/// or rolling it back discards them. All implementations must be thread-safe
/// (Send + Sync).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The transaction handle type of this store.
    type Tx: RecordTransaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A transaction-scoped handle on the local record store.
///
/// Bulk operations either apply to every row they address or fail as a whole.
#[async_trait]
pub trait RecordTransaction: Send {
    /// Commits every change made through this handle.
    async fn commit(self) -> Result<()>;

    /// Discards every change made through this handle.
    async fn rollback(self) -> Result<()>;

    // -- Price lists --

    /// Retrieves the price lists with the given ids. Unknown ids are skipped.
    async fn find_price_lists(&mut self, ids: &[PriceListId]) -> Result<Vec<PriceList>>;

    /// Retrieves a price list by id.
    async fn find_price_list(&mut self, id: PriceListId) -> Result<Option<PriceList>> {
        Ok(self.find_price_lists(&[id]).await?.into_iter().next())
    }

    /// Retrieves the general price list of a supplier, if any.
    async fn find_general_price_list(&mut self, supplier_id: ActorId) -> Result<Option<PriceList>>;

    /// Inserts a new price list.
    async fn insert_price_list(
        &mut self,
        supplier_id: ActorId,
        settings: &PriceListSettings,
    ) -> Result<PriceList>;

    /// Replaces the settings of a price list.
    async fn update_price_list(
        &mut self,
        id: PriceListId,
        settings: &PriceListSettings,
    ) -> Result<PriceList>;

    /// Deletes price lists owned by `supplier_id`.
    ///
    /// Cascades to products, variants and partnership links. Requests left
    /// without any price list are deleted as well. Returns the number of
    /// price lists deleted.
    async fn delete_price_lists(
        &mut self,
        supplier_id: ActorId,
        ids: &[PriceListId],
    ) -> Result<u64>;

    // -- Products --

    /// Retrieves every product of a price list.
    async fn products_for_price_list(&mut self, price_list_id: PriceListId)
    -> Result<Vec<Product>>;

    /// Inserts products.
    async fn insert_products(&mut self, products: Vec<NewProduct>) -> Result<Vec<Product>>;

    /// Points a product at a different remote listing.
    async fn update_product_listing(&mut self, id: ProductId, listing_id: &RemoteId)
    -> Result<()>;

    /// Deletes products and, by cascade, their variants.
    async fn delete_products(&mut self, ids: &[ProductId]) -> Result<u64>;

    // -- Variants --

    /// Retrieves every variant of every product of a price list.
    async fn variants_for_price_list(&mut self, price_list_id: PriceListId)
    -> Result<Vec<Variant>>;

    /// Inserts variants. Every parent product must exist.
    async fn insert_variants(&mut self, variants: Vec<NewVariant>) -> Result<Vec<Variant>>;

    /// Applies new values to existing variants.
    async fn update_variants(&mut self, updates: Vec<VariantUpdate>) -> Result<u64>;

    /// Deletes variants.
    async fn delete_variants(&mut self, ids: &[VariantId]) -> Result<u64>;

    // -- Partnerships --

    /// Retrieves the partnership between a supplier and a retailer, if any.
    async fn find_partnership(
        &mut self,
        supplier_id: ActorId,
        retailer_id: ActorId,
    ) -> Result<Option<Partnership>>;

    /// Retrieves every partnership of a supplier.
    async fn partnerships_for_supplier(&mut self, supplier_id: ActorId)
    -> Result<Vec<Partnership>>;

    /// Inserts a partnership.
    async fn insert_partnership(&mut self, partnership: NewPartnership) -> Result<Partnership>;

    /// Links price lists to a partnership. Already linked lists are ignored.
    async fn attach_price_lists(
        &mut self,
        partnership_id: PartnershipId,
        price_list_ids: &[PriceListId],
    ) -> Result<()>;

    /// Unlinks a price list from partnerships.
    async fn detach_price_list(
        &mut self,
        partnership_ids: &[PartnershipId],
        price_list_id: PriceListId,
    ) -> Result<u64>;

    // -- Partnership requests --

    /// Retrieves requests by id. Unknown ids are skipped.
    async fn find_partnership_requests(
        &mut self,
        ids: &[PartnershipRequestId],
    ) -> Result<Vec<PartnershipRequest>>;

    /// Retrieves requests matching a query, oldest first.
    async fn query_partnership_requests(
        &mut self,
        query: &RequestQuery,
    ) -> Result<Vec<PartnershipRequest>>;

    /// Inserts a request.
    async fn insert_partnership_request(
        &mut self,
        request: NewPartnershipRequest,
    ) -> Result<PartnershipRequest>;

    /// Replaces the message and status of a request.
    async fn update_partnership_request(
        &mut self,
        id: PartnershipRequestId,
        message: &str,
        status: RequestStatus,
    ) -> Result<PartnershipRequest>;

    /// Deletes requests.
    async fn delete_partnership_requests(&mut self, ids: &[PartnershipRequestId]) -> Result<u64>;

    // -- Fulfillment services --

    /// Retrieves the fulfillment service of an actor, if any.
    async fn find_fulfillment_service(
        &mut self,
        owner_id: ActorId,
    ) -> Result<Option<FulfillmentService>>;

    /// Inserts the fulfillment service of an actor.
    async fn insert_fulfillment_service(
        &mut self,
        owner_id: ActorId,
        remote_id: &RemoteId,
    ) -> Result<FulfillmentService>;

    /// Points an actor's fulfillment service at a different remote object.
    async fn update_fulfillment_service_remote_id(
        &mut self,
        owner_id: ActorId,
        remote_id: &RemoteId,
    ) -> Result<()>;

    /// Deletes the fulfillment service of an actor.
    async fn delete_fulfillment_service(&mut self, owner_id: ActorId) -> Result<u64>;
}

/// Runs `f` inside one transaction of `store`.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. The
/// closure must own everything it captures:
///
/// ```ignore
/// let ids = ids.to_vec();
/// with_transaction(&store, move |tx| {
///     Box::pin(async move { Ok(tx.delete_products(&ids).await?) })
/// })
/// .await?;
/// ```
pub async fn with_transaction<S, T, E, F>(store: &S, f: F) -> std::result::Result<T, E>
where
    S: RecordStore,
    E: From<RecordStoreError>,
    F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, std::result::Result<T, E>>,
{
    let mut tx = store.begin().await?;
    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
