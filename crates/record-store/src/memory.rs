use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    ActorId, FulfillmentServiceId, PartnershipId, PartnershipRequestId, PriceListId, ProductId,
    RemoteId, VariantId,
};
use domain::{
    FulfillmentService, NewPartnership, NewPartnershipRequest, NewProduct, NewVariant,
    Partnership, PartnershipRequest, PriceList, PriceListSettings, Product, RequestStatus, Variant,
    VariantUpdate,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    RecordStoreError, RequestQuery, Result,
    store::{RecordStore, RecordTransaction},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    price_lists: Vec<PriceList>,
    products: Vec<Product>,
    variants: Vec<Variant>,
    partnerships: Vec<Partnership>,
    requests: Vec<PartnershipRequest>,
    fulfillment_services: Vec<FulfillmentService>,
}

/// In-memory record store implementation for testing.
///
/// A transaction holds the store lock for its whole lifetime and works on a
/// private copy of the tables, which replaces the shared tables on commit.
/// Individual operations can be made to fail with [`fail_on`](Self::fail_on).
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<RwLock<HashSet<&'static str>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryRecordStore {
    /// Creates a new empty in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call of the named operation fail until cleared.
    ///
    /// Operation names are the [`RecordTransaction`] method names, plus
    /// `"commit"`.
    pub fn fail_on(&self, operation: &'static str) {
        self.faults.write().unwrap().insert(operation);
    }

    /// Stops failing the named operation.
    pub fn clear_fault(&self, operation: &'static str) {
        self.faults.write().unwrap().remove(operation);
    }

    /// Returns the number of mutating calls issued so far, committed or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns all committed price lists.
    pub async fn price_lists(&self) -> Vec<PriceList> {
        self.tables.lock().await.price_lists.clone()
    }

    /// Returns all committed products.
    pub async fn products(&self) -> Vec<Product> {
        self.tables.lock().await.products.clone()
    }

    /// Returns all committed variants.
    pub async fn variants(&self) -> Vec<Variant> {
        self.tables.lock().await.variants.clone()
    }

    /// Returns all committed partnerships.
    pub async fn partnerships(&self) -> Vec<Partnership> {
        self.tables.lock().await.partnerships.clone()
    }

    /// Returns all committed partnership requests.
    pub async fn partnership_requests(&self) -> Vec<PartnershipRequest> {
        self.tables.lock().await.requests.clone()
    }

    /// Returns all committed fulfillment services.
    pub async fn fulfillment_services(&self) -> Vec<FulfillmentService> {
        self.tables.lock().await.fulfillment_services.clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
            writes: self.writes.clone(),
        })
    }
}

/// Transaction handle of [`InMemoryRecordStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Arc<RwLock<HashSet<&'static str>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryTransaction {
    fn check(&self, operation: &'static str) -> Result<()> {
        if self.faults.read().unwrap().contains(operation) {
            return Err(RecordStoreError::OperationFailed {
                operation,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn write(&self, operation: &'static str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check(operation)
    }

    fn price_list_mut(&mut self, id: PriceListId) -> Result<&mut PriceList> {
        self.working
            .price_lists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RecordStoreError::NotFound {
                entity: "price list",
                id: id.to_string(),
            })
    }

    fn fulfillment_service_mut(&mut self, owner_id: ActorId) -> Result<&mut FulfillmentService> {
        self.working
            .fulfillment_services
            .iter_mut()
            .find(|f| f.owner_id == owner_id)
            .ok_or_else(|| RecordStoreError::NotFound {
                entity: "fulfillment service",
                id: owner_id.to_string(),
            })
    }

    fn product_ids_of(&self, price_list_id: PriceListId) -> HashSet<ProductId> {
        self.working
            .products
            .iter()
            .filter(|p| p.price_list_id == price_list_id)
            .map(|p| p.id)
            .collect()
    }

    fn remove_products(&mut self, ids: &HashSet<ProductId>) -> u64 {
        let before = self.working.products.len();
        self.working.products.retain(|p| !ids.contains(&p.id));
        self.working.variants.retain(|v| !ids.contains(&v.product_id));
        (before - self.working.products.len()) as u64
    }
}

#[async_trait]
impl RecordTransaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        self.check("commit")?;
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }

    async fn find_price_lists(&mut self, ids: &[PriceListId]) -> Result<Vec<PriceList>> {
        self.check("find_price_lists")?;
        Ok(self
            .working
            .price_lists
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn find_general_price_list(&mut self, supplier_id: ActorId) -> Result<Option<PriceList>> {
        self.check("find_general_price_list")?;
        Ok(self
            .working
            .price_lists
            .iter()
            .find(|p| p.supplier_id == supplier_id && p.settings.is_general)
            .cloned())
    }

    async fn insert_price_list(
        &mut self,
        supplier_id: ActorId,
        settings: &PriceListSettings,
    ) -> Result<PriceList> {
        self.write("insert_price_list")?;
        if settings.is_general
            && self
                .working
                .price_lists
                .iter()
                .any(|p| p.supplier_id == supplier_id && p.settings.is_general)
        {
            return Err(RecordStoreError::Constraint(format!(
                "supplier {supplier_id} already has a general price list"
            )));
        }

        let price_list = PriceList {
            id: PriceListId::new(),
            supplier_id,
            settings: settings.clone(),
            created_at: Utc::now(),
        };
        self.working.price_lists.push(price_list.clone());
        Ok(price_list)
    }

    async fn update_price_list(
        &mut self,
        id: PriceListId,
        settings: &PriceListSettings,
    ) -> Result<PriceList> {
        self.write("update_price_list")?;
        let price_list = self.price_list_mut(id)?;
        price_list.settings = settings.clone();
        Ok(price_list.clone())
    }

    async fn delete_price_lists(
        &mut self,
        supplier_id: ActorId,
        ids: &[PriceListId],
    ) -> Result<u64> {
        self.write("delete_price_lists")?;
        let doomed: HashSet<PriceListId> = self
            .working
            .price_lists
            .iter()
            .filter(|p| p.supplier_id == supplier_id && ids.contains(&p.id))
            .map(|p| p.id)
            .collect();

        let products: HashSet<ProductId> = doomed
            .iter()
            .flat_map(|id| self.product_ids_of(*id))
            .collect();
        self.remove_products(&products);

        self.working.price_lists.retain(|p| !doomed.contains(&p.id));
        for partnership in &mut self.working.partnerships {
            partnership
                .price_list_ids
                .retain(|id| !doomed.contains(id));
        }
        for request in &mut self.working.requests {
            request.price_list_ids.retain(|id| !doomed.contains(id));
        }
        self.working
            .requests
            .retain(|r| !r.price_list_ids.is_empty());

        Ok(doomed.len() as u64)
    }

    async fn products_for_price_list(
        &mut self,
        price_list_id: PriceListId,
    ) -> Result<Vec<Product>> {
        self.check("products_for_price_list")?;
        Ok(self
            .working
            .products
            .iter()
            .filter(|p| p.price_list_id == price_list_id)
            .cloned()
            .collect())
    }

    async fn insert_products(&mut self, products: Vec<NewProduct>) -> Result<Vec<Product>> {
        self.write("insert_products")?;
        let mut inserted = Vec::with_capacity(products.len());
        for new in products {
            if !self
                .working
                .price_lists
                .iter()
                .any(|p| p.id == new.price_list_id)
            {
                return Err(RecordStoreError::Constraint(format!(
                    "price list {} does not exist",
                    new.price_list_id
                )));
            }
            if self
                .working
                .products
                .iter()
                .any(|p| p.price_list_id == new.price_list_id && p.remote_id == new.remote_id)
            {
                return Err(RecordStoreError::Constraint(format!(
                    "product {} is already in price list {}",
                    new.remote_id, new.price_list_id
                )));
            }

            let product = Product {
                id: ProductId::new(),
                price_list_id: new.price_list_id,
                remote_id: new.remote_id,
                listing_id: new.listing_id,
                title: new.title,
                image_url: new.image_url,
            };
            self.working.products.push(product.clone());
            inserted.push(product);
        }
        Ok(inserted)
    }

    async fn update_product_listing(
        &mut self,
        id: ProductId,
        listing_id: &RemoteId,
    ) -> Result<()> {
        self.write("update_product_listing")?;
        let product = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RecordStoreError::NotFound {
                entity: "product",
                id: id.to_string(),
            })?;
        product.listing_id = listing_id.clone();
        Ok(())
    }

    async fn delete_products(&mut self, ids: &[ProductId]) -> Result<u64> {
        self.write("delete_products")?;
        let ids: HashSet<ProductId> = ids.iter().copied().collect();
        Ok(self.remove_products(&ids))
    }

    async fn variants_for_price_list(
        &mut self,
        price_list_id: PriceListId,
    ) -> Result<Vec<Variant>> {
        self.check("variants_for_price_list")?;
        let products = self.product_ids_of(price_list_id);
        Ok(self
            .working
            .variants
            .iter()
            .filter(|v| products.contains(&v.product_id))
            .cloned()
            .collect())
    }

    async fn insert_variants(&mut self, variants: Vec<NewVariant>) -> Result<Vec<Variant>> {
        self.write("insert_variants")?;
        let mut inserted = Vec::with_capacity(variants.len());
        for new in variants {
            if !self.working.products.iter().any(|p| p.id == new.product_id) {
                return Err(RecordStoreError::Constraint(format!(
                    "product {} does not exist",
                    new.product_id
                )));
            }

            let variant = Variant {
                id: VariantId::new(),
                product_id: new.product_id,
                remote_id: new.remote_id,
                retail_price: new.pricing.retail_price,
                wholesale_price: new.pricing.wholesale_price,
                retailer_cost: new.pricing.retailer_cost,
            };
            self.working.variants.push(variant.clone());
            inserted.push(variant);
        }
        Ok(inserted)
    }

    async fn update_variants(&mut self, updates: Vec<VariantUpdate>) -> Result<u64> {
        self.write("update_variants")?;
        let mut updated = 0;
        for update in updates {
            let variant = self
                .working
                .variants
                .iter_mut()
                .find(|v| v.id == update.id)
                .ok_or_else(|| RecordStoreError::NotFound {
                    entity: "variant",
                    id: update.id.to_string(),
                })?;
            variant.product_id = update.product_id;
            variant.retail_price = update.pricing.retail_price;
            variant.wholesale_price = update.pricing.wholesale_price;
            variant.retailer_cost = update.pricing.retailer_cost;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_variants(&mut self, ids: &[VariantId]) -> Result<u64> {
        self.write("delete_variants")?;
        let before = self.working.variants.len();
        self.working.variants.retain(|v| !ids.contains(&v.id));
        Ok((before - self.working.variants.len()) as u64)
    }

    async fn find_partnership(
        &mut self,
        supplier_id: ActorId,
        retailer_id: ActorId,
    ) -> Result<Option<Partnership>> {
        self.check("find_partnership")?;
        Ok(self
            .working
            .partnerships
            .iter()
            .find(|p| p.supplier_id == supplier_id && p.retailer_id == retailer_id)
            .cloned())
    }

    async fn partnerships_for_supplier(
        &mut self,
        supplier_id: ActorId,
    ) -> Result<Vec<Partnership>> {
        self.check("partnerships_for_supplier")?;
        Ok(self
            .working
            .partnerships
            .iter()
            .filter(|p| p.supplier_id == supplier_id)
            .cloned()
            .collect())
    }

    async fn insert_partnership(&mut self, partnership: NewPartnership) -> Result<Partnership> {
        self.write("insert_partnership")?;
        if self.working.partnerships.iter().any(|p| {
            p.supplier_id == partnership.supplier_id && p.retailer_id == partnership.retailer_id
        }) {
            return Err(RecordStoreError::Constraint(format!(
                "supplier {} and retailer {} are already partners",
                partnership.supplier_id, partnership.retailer_id
            )));
        }

        let mut price_list_ids = Vec::new();
        for id in partnership.price_list_ids {
            if !price_list_ids.contains(&id) {
                price_list_ids.push(id);
            }
        }
        let partnership = Partnership {
            id: PartnershipId::new(),
            supplier_id: partnership.supplier_id,
            retailer_id: partnership.retailer_id,
            price_list_ids,
            created_at: Utc::now(),
        };
        self.working.partnerships.push(partnership.clone());
        Ok(partnership)
    }

    async fn attach_price_lists(
        &mut self,
        partnership_id: PartnershipId,
        price_list_ids: &[PriceListId],
    ) -> Result<()> {
        self.write("attach_price_lists")?;
        let partnership = self
            .working
            .partnerships
            .iter_mut()
            .find(|p| p.id == partnership_id)
            .ok_or_else(|| RecordStoreError::NotFound {
                entity: "partnership",
                id: partnership_id.to_string(),
            })?;
        for id in price_list_ids {
            if !partnership.price_list_ids.contains(id) {
                partnership.price_list_ids.push(*id);
            }
        }
        Ok(())
    }

    async fn detach_price_list(
        &mut self,
        partnership_ids: &[PartnershipId],
        price_list_id: PriceListId,
    ) -> Result<u64> {
        self.write("detach_price_list")?;
        let mut detached = 0;
        for partnership in &mut self.working.partnerships {
            if partnership_ids.contains(&partnership.id)
                && partnership.price_list_ids.contains(&price_list_id)
            {
                partnership.price_list_ids.retain(|id| *id != price_list_id);
                detached += 1;
            }
        }
        Ok(detached)
    }

    async fn find_partnership_requests(
        &mut self,
        ids: &[PartnershipRequestId],
    ) -> Result<Vec<PartnershipRequest>> {
        self.check("find_partnership_requests")?;
        Ok(self
            .working
            .requests
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn query_partnership_requests(
        &mut self,
        query: &RequestQuery,
    ) -> Result<Vec<PartnershipRequest>> {
        self.check("query_partnership_requests")?;
        Ok(self
            .working
            .requests
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn insert_partnership_request(
        &mut self,
        request: NewPartnershipRequest,
    ) -> Result<PartnershipRequest> {
        self.write("insert_partnership_request")?;
        let request = PartnershipRequest {
            id: PartnershipRequestId::new(),
            sender_id: request.sender_id,
            recipient_id: request.recipient_id,
            kind: request.kind,
            price_list_ids: request.price_list_ids,
            message: request.message,
            status: request.status,
            created_at: Utc::now(),
        };
        self.working.requests.push(request.clone());
        Ok(request)
    }

    async fn update_partnership_request(
        &mut self,
        id: PartnershipRequestId,
        message: &str,
        status: RequestStatus,
    ) -> Result<PartnershipRequest> {
        self.write("update_partnership_request")?;
        let request = self
            .working
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RecordStoreError::NotFound {
                entity: "partnership request",
                id: id.to_string(),
            })?;
        request.message = message.to_string();
        request.status = status;
        Ok(request.clone())
    }

    async fn delete_partnership_requests(&mut self, ids: &[PartnershipRequestId]) -> Result<u64> {
        self.write("delete_partnership_requests")?;
        let before = self.working.requests.len();
        self.working.requests.retain(|r| !ids.contains(&r.id));
        Ok((before - self.working.requests.len()) as u64)
    }

    async fn find_fulfillment_service(
        &mut self,
        owner_id: ActorId,
    ) -> Result<Option<FulfillmentService>> {
        self.check("find_fulfillment_service")?;
        Ok(self
            .working
            .fulfillment_services
            .iter()
            .find(|f| f.owner_id == owner_id)
            .cloned())
    }

    async fn insert_fulfillment_service(
        &mut self,
        owner_id: ActorId,
        remote_id: &RemoteId,
    ) -> Result<FulfillmentService> {
        self.write("insert_fulfillment_service")?;
        if self
            .working
            .fulfillment_services
            .iter()
            .any(|f| f.owner_id == owner_id)
        {
            return Err(RecordStoreError::Constraint(format!(
                "actor {owner_id} already has a fulfillment service"
            )));
        }

        let service = FulfillmentService {
            id: FulfillmentServiceId::new(),
            owner_id,
            remote_id: remote_id.clone(),
            created_at: Utc::now(),
        };
        self.working.fulfillment_services.push(service.clone());
        Ok(service)
    }

    async fn update_fulfillment_service_remote_id(
        &mut self,
        owner_id: ActorId,
        remote_id: &RemoteId,
    ) -> Result<()> {
        self.write("update_fulfillment_service_remote_id")?;
        self.fulfillment_service_mut(owner_id)?.remote_id = remote_id.clone();
        Ok(())
    }

    async fn delete_fulfillment_service(&mut self, owner_id: ActorId) -> Result<u64> {
        self.write("delete_fulfillment_service")?;
        let before = self.working.fulfillment_services.len();
        self.working
            .fulfillment_services
            .retain(|f| f.owner_id != owner_id);
        Ok((before - self.working.fulfillment_services.len()) as u64)
    }
}
