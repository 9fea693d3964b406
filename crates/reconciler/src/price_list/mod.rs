//! Price-list reconciliation.
//!
//! A reconciliation brings one price list in line with a caller-supplied
//! [`DesiredPriceList`] by running the phases of [`Phase::ORDER`]:
//! products are published or unpublished remotely first, variants are
//! diffed against the refreshed product mapping, and settings and retailer
//! links are written last.

pub mod desired;
pub mod pipeline;
pub mod plan;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use common::{ActorId, PartnershipId, PriceListId, ProductId, RemoteId};
use domain::{NewProduct, Partnership, PriceList, Product, ValidationError};
use record_store::{RecordStore, RecordTransaction};

use crate::coordinator::DualWriteCoordinator;
use crate::diff::diff;
use crate::error::{Result, SyncError};
use crate::gateway::{RemoteFilter, RemoteGateway, RemoteResource, RemoteStatus, ResourceKind};
use crate::local::transaction;

pub use desired::{DesiredPriceList, DesiredProduct, DesiredVariant};
pub use pipeline::{Phase, ReconcileCounts, ReconcileOutcome, ReconcileReport};
pub use plan::{VariantPlan, plan_variants};

/// Creates, reconciles and deletes price lists.
pub struct PriceListService<S, R> {
    store: S,
    coordinator: DualWriteCoordinator<R>,
}

impl<S, R> PriceListService<S, R>
where
    S: RecordStore,
    R: RemoteGateway,
{
    /// Creates a new price list service.
    pub fn new(store: S, gateway: R) -> Self {
        Self {
            store,
            coordinator: DualWriteCoordinator::new(gateway),
        }
    }

    /// Brings an existing price list in line with `desired`.
    #[tracing::instrument(skip(self, desired))]
    pub async fn reconcile(
        &self,
        price_list_id: PriceListId,
        desired: DesiredPriceList,
    ) -> Result<ReconcileOutcome> {
        let price_list = transaction(&self.store, move |tx| {
            Box::pin(async move { Ok(tx.find_price_list(price_list_id).await?) })
        })
        .await?
        .ok_or_else(|| SyncError::NotFound {
            entity: "price list",
            id: price_list_id.to_string(),
        })?;

        self.run(price_list, desired, None).await
    }

    /// Creates a price list for `owner` and reconciles it against `desired`.
    ///
    /// Everything a reconciliation validates is checked once, before the row
    /// is inserted. If a later phase fails the row stays in place, and
    /// reconciling it again converges.
    #[tracing::instrument(skip(self, desired), fields(name = %desired.settings.name))]
    pub async fn create_and_attach(
        &self,
        owner: ActorId,
        desired: DesiredPriceList,
    ) -> Result<ReconcileOutcome> {
        let current = self.validate(owner, None, &desired).await?;

        let settings = desired.settings.clone();
        let price_list = transaction(&self.store, move |tx| {
            Box::pin(async move { Ok(tx.insert_price_list(owner, &settings).await?) })
        })
        .await?;
        tracing::info!(price_list_id = %price_list.id, "price list created");

        self.run(price_list, desired, Some(current)).await
    }

    /// Deletes price lists owned by `owner` together with their remote listings.
    ///
    /// Listings are removed one product at a time with compensation; the
    /// rows are then deleted in one transaction. Returns the number of price
    /// lists deleted.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_price_lists(&self, owner: ActorId, ids: &[PriceListId]) -> Result<u64> {
        let wanted = ids.to_vec();
        let (lists, products) = transaction(&self.store, move |tx| {
            Box::pin(async move {
                let lists = tx.find_price_lists(&wanted).await?;
                let mut products = Vec::new();
                for list in &lists {
                    products.extend(tx.products_for_price_list(list.id).await?);
                }
                Ok((lists, products))
            })
        })
        .await?;

        for id in ids {
            match lists.iter().find(|l| l.id == *id) {
                None => {
                    return Err(SyncError::NotFound {
                        entity: "price list",
                        id: id.to_string(),
                    });
                }
                Some(list) if list.supplier_id != owner => {
                    return Err(ValidationError::PriceListNotOwned {
                        price_list: list.id,
                        supplier: owner,
                    }
                    .into());
                }
                Some(_) => {}
            }
        }

        for product in products {
            self.unpublish(product.price_list_id, product).await?;
        }

        let ids = ids.to_vec();
        let deleted = transaction(&self.store, move |tx| {
            Box::pin(async move { Ok(tx.delete_price_lists(owner, &ids).await?) })
        })
        .await?;

        tracing::info!(deleted, "price lists deleted");
        Ok(deleted)
    }

    /// Runs every phase. `validated` holds the products of a list that was
    /// validated just before it was created, and stands in for the Validate
    /// phase.
    async fn run(
        &self,
        price_list: PriceList,
        desired: DesiredPriceList,
        validated: Option<Vec<Product>>,
    ) -> Result<ReconcileOutcome> {
        let started = Instant::now();
        let mut run = Run::new(self, price_list, desired);
        run.validated = validated;

        for phase in Phase::ORDER {
            tracing::debug!(%phase, "phase started");
            if let Err(e) = run.execute(phase).await {
                tracing::warn!(%phase, price_list_id = %run.price_list.id, error = %e, "reconciliation stopped");
                return Err(e);
            }
            run.report.phases.push(phase);
        }

        metrics::histogram!("reconcile_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            price_list_id = %run.price_list.id,
            counts = ?run.report.counts,
            "price list reconciled"
        );

        Ok(ReconcileOutcome {
            price_list: run.price_list,
            report: run.report,
        })
    }

    /// Read-only checks shared by creation and reconciliation.
    ///
    /// The remote catalog status query and the local reads run concurrently.
    /// Returns the products currently persisted for the list.
    async fn validate(
        &self,
        supplier: ActorId,
        price_list: Option<&PriceList>,
        desired: &DesiredPriceList,
    ) -> Result<Vec<Product>> {
        desired.validate()?;

        let price_list_id = price_list.map(|p| p.id);
        let filter = RemoteFilter::ids(desired.products.iter().map(|p| p.remote_id.clone()));
        let gateway = self.coordinator.gateway();

        let remote = async {
            if filter.ids.is_empty() {
                return Ok::<_, SyncError>(Vec::new());
            }
            Ok(gateway.query(ResourceKind::Product, &filter).await?)
        };
        let local = transaction(&self.store, move |tx| {
            Box::pin(async move {
                let current = match price_list_id {
                    Some(id) => tx.products_for_price_list(id).await?,
                    None => Vec::new(),
                };
                let general = tx.find_general_price_list(supplier).await?;
                let partnerships = tx.partnerships_for_supplier(supplier).await?;
                Ok((current, general, partnerships))
            })
        });

        let (records, (current, general, partnerships)) = tokio::try_join!(remote, local)?;

        if desired.settings.is_general
            && let Some(general) = general
            && Some(general.id) != price_list_id
        {
            return Err(ValidationError::DuplicateGeneralPriceList.into());
        }

        let persisted: HashSet<&RemoteId> = current.iter().map(|p| &p.remote_id).collect();
        let available: HashSet<&RemoteId> = records
            .iter()
            .filter(|r| r.status == RemoteStatus::Active)
            .map(|r| &r.id)
            .collect();
        for product in &desired.products {
            if !persisted.contains(&product.remote_id) && !available.contains(&product.remote_id) {
                return Err(ValidationError::UnknownProduct {
                    product: product.remote_id.clone(),
                }
                .into());
            }
        }

        for retailer in &desired.retailer_ids {
            if !partnerships.iter().any(|p| p.retailer_id == *retailer) {
                return Err(ValidationError::NotPartnered {
                    retailer: *retailer,
                }
                .into());
            }
        }

        Ok(current)
    }

    /// Publishes products remotely, then inserts their rows in one transaction.
    async fn publish(&self, price_list_id: PriceListId, products: Vec<DesiredProduct>) -> Result<usize> {
        let resources = products
            .iter()
            .map(|p| RemoteResource::ProductListing {
                product: p.remote_id.clone(),
                price_list: price_list_id,
            })
            .collect();
        let store = &self.store;

        let inserted = self
            .coordinator
            .create_many("publish products", resources, move |listing_ids| {
                let rows: Vec<NewProduct> = products
                    .into_iter()
                    .zip(listing_ids)
                    .map(|(p, listing_id)| NewProduct {
                        price_list_id,
                        remote_id: p.remote_id,
                        listing_id,
                        title: p.title,
                        image_url: p.image_url,
                    })
                    .collect();
                transaction(store, move |tx| {
                    Box::pin(async move { Ok(tx.insert_products(rows).await?) })
                })
            })
            .await?;

        Ok(inserted.len())
    }

    /// Unpublishes one product remotely, then deletes its row and variants.
    async fn unpublish(&self, price_list_id: PriceListId, product: Product) -> Result<()> {
        let product_id = product.id;
        let store = &self.store;

        self.coordinator
            .delete(
                "unpublish product",
                ResourceKind::ProductListing,
                &product.listing_id,
                RemoteResource::ProductListing {
                    product: product.remote_id.clone(),
                    price_list: price_list_id,
                },
                move || {
                    transaction(store, move |tx| {
                        Box::pin(async move {
                            tx.delete_products(&[product_id]).await?;
                            Ok(())
                        })
                    })
                },
                move |listing_id| {
                    transaction(store, move |tx| {
                        Box::pin(async move {
                            Ok(tx.update_product_listing(product_id, &listing_id).await?)
                        })
                    })
                },
            )
            .await
    }
}

/// State carried between the phases of one reconciliation.
struct Run<'a, S, R> {
    service: &'a PriceListService<S, R>,
    price_list: PriceList,
    desired: DesiredPriceList,
    report: ReconcileReport,
    validated: Option<Vec<Product>>,
    current_products: Vec<Product>,
    products_to_add: Vec<DesiredProduct>,
    products_to_remove: Vec<Product>,
    product_ids: HashMap<RemoteId, ProductId>,
    variant_plan: VariantPlan,
}

impl<'a, S, R> Run<'a, S, R>
where
    S: RecordStore,
    R: RemoteGateway,
{
    fn new(service: &'a PriceListService<S, R>, price_list: PriceList, desired: DesiredPriceList) -> Self {
        Self {
            service,
            price_list,
            desired,
            report: ReconcileReport::default(),
            validated: None,
            current_products: Vec::new(),
            products_to_add: Vec::new(),
            products_to_remove: Vec::new(),
            product_ids: HashMap::new(),
            variant_plan: VariantPlan::default(),
        }
    }

    async fn execute(&mut self, phase: Phase) -> Result<()> {
        let store = &self.service.store;
        let price_list_id = self.price_list.id;

        match phase {
            Phase::Validate => {
                self.current_products = match self.validated.take() {
                    Some(products) => products,
                    None => {
                        self.service
                            .validate(self.price_list.supplier_id, Some(&self.price_list), &self.desired)
                            .await?
                    }
                };
            }

            Phase::ProductDiff => {
                let changes = diff(
                    "product",
                    &self.desired.products,
                    &self.current_products,
                    |p| p.remote_id.clone(),
                    |p| p.remote_id.clone(),
                )?;
                self.products_to_add = changes.to_add.into_iter().cloned().collect();
                self.products_to_remove = changes.to_remove.into_iter().cloned().collect();
            }

            Phase::ProductApply => {
                for product in std::mem::take(&mut self.products_to_remove) {
                    self.service.unpublish(price_list_id, product).await?;
                    self.report.counts.products_removed += 1;
                }

                let to_add = std::mem::take(&mut self.products_to_add);
                if !to_add.is_empty() {
                    self.report.counts.products_added += self.service.publish(price_list_id, to_add).await?;
                }
            }

            Phase::IdentityRemap => {
                let products = transaction(store, move |tx| {
                    Box::pin(async move { Ok(tx.products_for_price_list(price_list_id).await?) })
                })
                .await?;
                self.product_ids = products.into_iter().map(|p| (p.remote_id, p.id)).collect();
            }

            Phase::VariantDiff => {
                let current = transaction(store, move |tx| {
                    Box::pin(async move { Ok(tx.variants_for_price_list(price_list_id).await?) })
                })
                .await?;
                self.variant_plan = plan_variants(
                    &self.desired.settings,
                    &self.desired,
                    &current,
                    &self.product_ids,
                )?;
            }

            Phase::VariantApply => {
                let plan = std::mem::take(&mut self.variant_plan);
                if plan.is_empty() {
                    return Ok(());
                }

                let counts = &mut self.report.counts;
                counts.variants_added += plan.to_add.len();
                counts.variants_updated += plan.to_update.len();
                counts.variants_removed += plan.to_remove.len();

                transaction(store, move |tx| {
                    Box::pin(async move {
                        tx.delete_variants(&plan.to_remove).await?;
                        tx.update_variants(plan.to_update).await?;
                        tx.insert_variants(plan.to_add).await?;
                        Ok(())
                    })
                })
                .await?;
            }

            Phase::SettingsApply => {
                let supplier = self.price_list.supplier_id;
                let settings = self.desired.settings.clone();
                let retailers = self.desired.retailer_ids.clone();

                let (price_list, attached, detached) = transaction(store, move |tx| {
                    Box::pin(async move {
                        if settings.is_general
                            && let Some(general) = tx.find_general_price_list(supplier).await?
                            && general.id != price_list_id
                        {
                            return Err(ValidationError::DuplicateGeneralPriceList.into());
                        }

                        let updated = tx.update_price_list(price_list_id, &settings).await?;

                        let partnerships = tx.partnerships_for_supplier(supplier).await?;
                        let linked: Vec<&Partnership> = partnerships
                            .iter()
                            .filter(|p| p.price_list_ids.contains(&price_list_id))
                            .collect();
                        let changes = diff("retailer", &retailers, &linked, |r| *r, |p| p.retailer_id)?;

                        for retailer in &changes.to_add {
                            let partnership = partnerships
                                .iter()
                                .find(|p| p.retailer_id == **retailer)
                                .ok_or(ValidationError::NotPartnered {
                                    retailer: **retailer,
                                })?;
                            tx.attach_price_lists(partnership.id, &[price_list_id]).await?;
                        }

                        let unlinked: Vec<PartnershipId> =
                            changes.to_remove.iter().map(|p| p.id).collect();
                        if !unlinked.is_empty() {
                            tx.detach_price_list(&unlinked, price_list_id).await?;
                        }

                        Ok((updated, changes.to_add.len(), unlinked.len()))
                    })
                })
                .await?;

                self.price_list = price_list;
                self.report.counts.retailers_attached += attached;
                self.report.counts.retailers_detached += detached;
            }
        }

        Ok(())
    }
}
