//! Integration tests for price-list reconciliation.
//!
//! These tests drive the engine against the in-memory record store and
//! remote gateway, injecting failures to exercise compensation.

use common::{ActorId, PriceListId, RemoteId};
use domain::{
    Margin, Money, NewPartnership, Partnership, PriceListSettings, ValidationError,
};
use reconciler::{
    Config, DesiredPriceList, DesiredProduct, DesiredVariant, InMemoryRemoteGateway, Phase,
    ReconcileOutcome, RemoteResource, ResourceKind, SyncEngine, SyncError,
};
use record_store::{InMemoryRecordStore, RecordTransaction, with_transaction};

const P1: &str = "gid://shop/Product/1";
const P2: &str = "gid://shop/Product/2";
const P3: &str = "gid://shop/Product/3";

struct Harness {
    store: InMemoryRecordStore,
    gateway: InMemoryRemoteGateway,
    engine: SyncEngine<InMemoryRecordStore, InMemoryRemoteGateway>,
}

/// Helper to create an engine whose remote catalog holds `catalog`
fn harness(catalog: &[&str]) -> Harness {
    let store = InMemoryRecordStore::new();
    let gateway = InMemoryRemoteGateway::with_catalog(catalog.iter().copied());
    let engine = SyncEngine::new(store.clone(), gateway.clone(), &Config::default());
    Harness {
        store,
        gateway,
        engine,
    }
}

fn wholesale_variant(remote: &str, retail: i64, wholesale: i64) -> DesiredVariant {
    DesiredVariant::new(remote, Money::from_cents(retail)).wholesale(Money::from_cents(wholesale))
}

async fn partner(store: &InMemoryRecordStore, supplier: ActorId, retailer: ActorId) -> Partnership {
    with_transaction(store, move |tx| {
        Box::pin(async move {
            tx.insert_partnership(NewPartnership {
                supplier_id: supplier,
                retailer_id: retailer,
                price_list_ids: vec![],
            })
            .await
        })
    })
    .await
    .unwrap()
}

async fn create(h: &Harness, owner: ActorId, desired: DesiredPriceList) -> ReconcileOutcome {
    h.engine
        .create_price_list_and_attach(desired, owner)
        .await
        .unwrap()
}

mod reconcile {
    use super::*;

    #[tokio::test]
    async fn wholesale_scenario_removes_adds_and_reprices() {
        let h = harness(&[P1, P2, P3]);
        let supplier = ActorId::new();

        let initial = DesiredPriceList::new(PriceListSettings::wholesale("Wholesale"))
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 1000, 300)))
            .product(DesiredProduct::new(P2, "Cup").variant(wholesale_variant("v2", 800, 400)));
        let created = create(&h, supplier, initial).await;
        let price_list_id = created.price_list.id;

        let p1_listing = h
            .store
            .products()
            .await
            .into_iter()
            .find(|p| p.remote_id == RemoteId::from(P1))
            .unwrap()
            .listing_id;

        let desired = DesiredPriceList::new(PriceListSettings::wholesale("Wholesale"))
            .product(DesiredProduct::new(P2, "Cup").variant(wholesale_variant("v2", 800, 500)))
            .product(DesiredProduct::new(P3, "Bowl").variant(wholesale_variant("v3", 1200, 700)));
        let outcome = h
            .engine
            .reconcile_price_list(price_list_id, desired)
            .await
            .unwrap();

        let counts = outcome.report.counts;
        assert_eq!(counts.products_removed, 1);
        assert_eq!(counts.products_added, 1);
        assert_eq!(counts.variants_added, 1);
        assert_eq!(counts.variants_updated, 1);
        assert_eq!(counts.variants_removed, 0);

        // p1 is gone on both sides
        assert!(!h.gateway.contains(&p1_listing));
        let products = h.store.products().await;
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| p.remote_id != RemoteId::from(P1)));

        // p3 exists remotely and locally
        let p3 = products
            .iter()
            .find(|p| p.remote_id == RemoteId::from(P3))
            .unwrap();
        assert_eq!(
            h.gateway.resource(&p3.listing_id),
            Some(RemoteResource::ProductListing {
                product: RemoteId::from(P3),
                price_list: price_list_id,
            })
        );

        // p2's variant now costs 5.00
        let variants = h.store.variants().await;
        assert_eq!(variants.len(), 2);
        let v2 = variants
            .iter()
            .find(|v| v.remote_id == RemoteId::from("v2"))
            .unwrap();
        assert_eq!(v2.wholesale_price, Some(Money::from_cents(500)));
        assert_eq!(v2.retailer_cost, Money::from_cents(500));
        let v3 = variants
            .iter()
            .find(|v| v.remote_id == RemoteId::from("v3"))
            .unwrap();
        assert_eq!(v3.product_id, p3.id);
    }

    #[tokio::test]
    async fn phases_run_in_order_and_variants_follow_new_mapping() {
        let h = harness(&[P1, P2]);
        let supplier = ActorId::new();
        let settings = PriceListSettings::margin("Retail", Margin::new(20).unwrap());

        let initial = DesiredPriceList::new(settings.clone())
            .product(
                DesiredProduct::new(P1, "Mug")
                    .variant(DesiredVariant::new("v1", Money::from_cents(1000))),
            )
            .product(
                DesiredProduct::new(P2, "Cup")
                    .variant(DesiredVariant::new("v2", Money::from_cents(500))),
            );
        let created = create(&h, supplier, initial).await;
        assert_eq!(created.report.phases, Phase::ORDER.to_vec());

        // Remove p1 and add a second variant to the retained p2
        let desired = DesiredPriceList::new(settings).product(
            DesiredProduct::new(P2, "Cup")
                .variant(DesiredVariant::new("v2", Money::from_cents(500)))
                .variant(DesiredVariant::new("v2b", Money::from_cents(999))),
        );
        let outcome = h
            .engine
            .reconcile_price_list(created.price_list.id, desired)
            .await
            .unwrap();

        assert_eq!(outcome.report.phases, Phase::ORDER.to_vec());
        assert_eq!(outcome.report.counts.products_removed, 1);
        assert_eq!(outcome.report.counts.variants_added, 1);
        assert_eq!(outcome.report.counts.variants_updated, 0);

        let products = h.store.products().await;
        assert_eq!(products.len(), 1);
        let variants = h.store.variants().await;
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().all(|v| v.product_id == products[0].id));

        let v2b = variants
            .iter()
            .find(|v| v.remote_id == RemoteId::from("v2b"))
            .unwrap();
        assert_eq!(v2b.retailer_cost, Money::from_cents(799));
    }

    #[tokio::test]
    async fn reconciling_twice_is_a_noop() {
        let h = harness(&[P1, P2]);
        let supplier = ActorId::new();
        let retailer = ActorId::new();
        partner(&h.store, supplier, retailer).await;

        let desired = DesiredPriceList::new(PriceListSettings::wholesale("Wholesale"))
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 1000, 600)))
            .product(DesiredProduct::new(P2, "Cup").variant(wholesale_variant("v2", 800, 400)))
            .retailer(retailer);
        let created = create(&h, supplier, desired.clone()).await;
        assert!(!created.report.counts.is_noop());

        let creates = h.gateway.call_count("create", ResourceKind::ProductListing);
        let outcome = h
            .engine
            .reconcile_price_list(created.price_list.id, desired)
            .await
            .unwrap();

        assert!(outcome.report.counts.is_noop());
        assert_eq!(h.gateway.call_count("create", ResourceKind::ProductListing), creates);
        assert_eq!(h.gateway.call_count("delete", ResourceKind::ProductListing), 0);
        assert_eq!(h.store.products().await.len(), 2);
        assert_eq!(h.store.variants().await.len(), 2);
    }

    #[tokio::test]
    async fn margin_list_discards_wholesale_price() {
        let h = harness(&[P1]);
        let settings = PriceListSettings::margin("Retail", Margin::new(25).unwrap());
        let desired = DesiredPriceList::new(settings).product(
            DesiredProduct::new(P1, "Mug").variant(
                DesiredVariant::new("v1", Money::from_cents(999)).wholesale(Money::from_cents(1)),
            ),
        );

        create(&h, ActorId::new(), desired).await;

        let variants = h.store.variants().await;
        assert_eq!(variants[0].wholesale_price, None);
        assert_eq!(variants[0].retailer_cost, Money::from_cents(749));
    }

    #[tokio::test]
    async fn unknown_price_list_is_not_found() {
        let h = harness(&[]);
        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"));

        let err = h
            .engine
            .reconcile_price_list(PriceListId::new(), desired)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NotFound { entity: "price list", .. }));
    }

    #[tokio::test]
    async fn retailers_are_attached_and_detached() {
        let h = harness(&[]);
        let supplier = ActorId::new();
        let kept = ActorId::new();
        let dropped = ActorId::new();
        partner(&h.store, supplier, kept).await;
        partner(&h.store, supplier, dropped).await;

        let settings = PriceListSettings::wholesale("Partners");
        let created = create(
            &h,
            supplier,
            DesiredPriceList::new(settings.clone())
                .retailer(kept)
                .retailer(dropped),
        )
        .await;
        assert_eq!(created.report.counts.retailers_attached, 2);

        let outcome = h
            .engine
            .reconcile_price_list(
                created.price_list.id,
                DesiredPriceList::new(settings).retailer(kept),
            )
            .await
            .unwrap();
        assert_eq!(outcome.report.counts.retailers_attached, 0);
        assert_eq!(outcome.report.counts.retailers_detached, 1);

        let partnerships = h.store.partnerships().await;
        let linked = |retailer: ActorId| {
            partnerships
                .iter()
                .find(|p| p.retailer_id == retailer)
                .unwrap()
                .price_list_ids
                .contains(&created.price_list.id)
        };
        assert!(linked(kept));
        assert!(!linked(dropped));
    }

    #[tokio::test]
    async fn settings_change_is_persisted() {
        let h = harness(&[]);
        let created = create(
            &h,
            ActorId::new(),
            DesiredPriceList::new(PriceListSettings::wholesale("Before")),
        )
        .await;

        let outcome = h
            .engine
            .reconcile_price_list(
                created.price_list.id,
                DesiredPriceList::new(PriceListSettings::margin("After", Margin::new(10).unwrap())),
            )
            .await
            .unwrap();

        assert_eq!(outcome.price_list.settings.name, "After");
        assert_eq!(h.store.price_lists().await[0].settings.name, "After");
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn second_general_list_is_rejected_before_any_write() {
        let h = harness(&[P1]);
        let supplier = ActorId::new();
        let general = PriceListSettings::wholesale("General").into_general(false);
        create(&h, supplier, DesiredPriceList::new(general.clone())).await;

        let writes = h.store.write_count();
        let calls = h.gateway.calls().len();

        let desired = DesiredPriceList::new(general)
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 100, 50)));
        let err = h
            .engine
            .create_price_list_and_attach(desired, supplier)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::DuplicateGeneralPriceList)
        ));
        assert_eq!(
            err.user_message(),
            "A supplier can only have one general price list"
        );
        assert_eq!(h.store.write_count(), writes);
        assert_eq!(h.gateway.call_count("create", ResourceKind::ProductListing), 0);
        assert!(h.gateway.calls().len() <= calls + 1);
        assert_eq!(h.store.price_lists().await.len(), 1);
    }

    #[tokio::test]
    async fn flipping_general_flag_on_is_rejected_when_one_exists() {
        let h = harness(&[]);
        let supplier = ActorId::new();
        create(
            &h,
            supplier,
            DesiredPriceList::new(PriceListSettings::wholesale("General").into_general(true)),
        )
        .await;
        let private = create(
            &h,
            supplier,
            DesiredPriceList::new(PriceListSettings::wholesale("Private")),
        )
        .await;

        let writes = h.store.write_count();
        let err = h
            .engine
            .reconcile_price_list(
                private.price_list.id,
                DesiredPriceList::new(PriceListSettings::wholesale("Private").into_general(true)),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::DuplicateGeneralPriceList)
        ));
        assert_eq!(h.store.write_count(), writes);
    }

    #[tokio::test]
    async fn other_suppliers_general_list_does_not_conflict() {
        let h = harness(&[]);
        let general = PriceListSettings::wholesale("General").into_general(false);
        create(&h, ActorId::new(), DesiredPriceList::new(general.clone())).await;
        create(&h, ActorId::new(), DesiredPriceList::new(general)).await;

        assert_eq!(h.store.price_lists().await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_or_archived_catalog_product_is_rejected() {
        let h = harness(&[P1]);
        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"))
            .product(DesiredProduct::new(P2, "Ghost").variant(wholesale_variant("v", 10, 5)));

        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::UnknownProduct { .. })
        ));

        h.gateway.archive_catalog_product(P1);
        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"))
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v", 10, 5)));
        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::UnknownProduct { .. })
        ));
        assert!(h.store.price_lists().await.is_empty());
    }

    #[tokio::test]
    async fn retailer_without_partnership_is_rejected() {
        let h = harness(&[]);
        let desired =
            DesiredPriceList::new(PriceListSettings::wholesale("W")).retailer(ActorId::new());

        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::NotPartnered { .. })
        ));
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_wholesale_price_is_rejected() {
        let h = harness(&[P1]);
        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W")).product(
            DesiredProduct::new(P1, "Mug").variant(DesiredVariant::new("v1", Money::from_cents(5))),
        );

        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::WholesalePriceRequired { .. })
        ));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn price_too_large_for_margin_is_rejected() {
        let h = harness(&[P1]);
        let retail = Money::from_cents(i64::MAX / 50);
        let desired = DesiredPriceList::new(PriceListSettings::margin(
            "Retail",
            Margin::new(10).unwrap(),
        ))
        .product(DesiredProduct::new(P1, "Mug").variant(DesiredVariant::new("v1", retail)));

        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::PriceOutOfRange { price, .. }) if price == retail
        ));
        assert_eq!(h.store.write_count(), 0);
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn creation_queries_the_catalog_once() {
        let h = harness(&[P1]);
        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"))
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 100, 50)));

        let outcome = create(&h, ActorId::new(), desired.clone()).await;

        assert_eq!(outcome.report.phases, Phase::ORDER.to_vec());
        assert_eq!(h.gateway.call_count("query", ResourceKind::Product), 1);

        h.engine
            .reconcile_price_list(outcome.price_list.id, desired)
            .await
            .unwrap();
        assert_eq!(h.gateway.call_count("query", ResourceKind::Product), 2);
    }
}

mod compensation {
    use super::*;

    #[tokio::test]
    async fn failed_product_insert_deletes_each_listing_once() {
        let h = harness(&[P1, P2]);
        h.store.fail_on("insert_products");

        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"))
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 10, 5)))
            .product(DesiredProduct::new(P2, "Cup").variant(wholesale_variant("v2", 10, 5)));
        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RolledBack { .. }));
        assert!(!err.is_fatal());

        let created: Vec<RemoteId> = h
            .gateway
            .calls()
            .into_iter()
            .filter(|c| c.operation == "create")
            .filter_map(|c| c.id)
            .collect();
        let deleted: Vec<RemoteId> = h
            .gateway
            .calls()
            .into_iter()
            .filter(|c| c.operation == "delete")
            .filter_map(|c| c.id)
            .collect();
        assert_eq!(created.len(), 2);
        assert_eq!(deleted, created);
        assert_eq!(h.gateway.object_count(ResourceKind::ProductListing), 0);
        assert!(h.store.products().await.is_empty());

        // The row stays; retrying converges once the store recovers
        h.store.clear_fault("insert_products");
        let price_list_id = h.store.price_lists().await[0].id;
        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"))
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 10, 5)));
        let outcome = h
            .engine
            .reconcile_price_list(price_list_id, desired)
            .await
            .unwrap();
        assert_eq!(outcome.report.counts.products_added, 1);
    }

    #[tokio::test]
    async fn failed_cleanup_requires_manual_intervention() {
        let h = harness(&[P1]);
        h.store.fail_on("insert_products");
        h.gateway
            .set_fail_on(ResourceKind::ProductListing, "delete", true);

        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"))
            .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 10, 5)));
        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();

        let SyncError::ManualCleanupRequired { remote_ids, .. } = &err else {
            panic!("expected ManualCleanupRequired, got {err:?}");
        };
        assert_eq!(remote_ids.len(), 1);
        assert!(h.gateway.contains(&remote_ids[0]));
        assert!(err.is_fatal());
        assert!(err.user_message().contains(remote_ids[0].as_str()));
    }

    #[tokio::test]
    async fn partial_batch_failure_deletes_created_listings() {
        let h = harness(&[P1, P2, P3]);
        h.gateway.fail_creates_after(ResourceKind::ProductListing, 2);

        let desired = DesiredPriceList::new(PriceListSettings::wholesale("W"))
            .product(DesiredProduct::new(P1, "A").variant(wholesale_variant("v1", 10, 5)))
            .product(DesiredProduct::new(P2, "B").variant(wholesale_variant("v2", 10, 5)))
            .product(DesiredProduct::new(P3, "C").variant(wholesale_variant("v3", 10, 5)));
        let err = h
            .engine
            .create_price_list_and_attach(desired, ActorId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Remote(_)));
        assert_eq!(h.gateway.call_count("delete", ResourceKind::ProductListing), 2);
        assert_eq!(h.gateway.object_count(ResourceKind::ProductListing), 0);
        assert!(h.store.products().await.is_empty());
    }

    #[tokio::test]
    async fn failed_product_delete_recreates_and_repoints_listing() {
        let h = harness(&[P1]);
        let settings = PriceListSettings::wholesale("W");
        let created = create(
            &h,
            ActorId::new(),
            DesiredPriceList::new(settings.clone())
                .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 10, 5))),
        )
        .await;
        let old_listing = h.store.products().await[0].listing_id.clone();

        h.store.fail_on("delete_products");
        let err = h
            .engine
            .reconcile_price_list(created.price_list.id, DesiredPriceList::new(settings))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RolledBack { .. }));
        assert!(!h.gateway.contains(&old_listing));

        let products = h.store.products().await;
        assert_eq!(products.len(), 1);
        assert_ne!(products[0].listing_id, old_listing);
        assert!(h.gateway.contains(&products[0].listing_id));
        assert_eq!(h.store.variants().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_recreate_is_irrecoverable() {
        let h = harness(&[P1]);
        let settings = PriceListSettings::wholesale("W");
        let created = create(
            &h,
            ActorId::new(),
            DesiredPriceList::new(settings.clone())
                .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 10, 5))),
        )
        .await;
        let listing = h.store.products().await[0].listing_id.clone();

        h.store.fail_on("delete_products");
        h.gateway
            .set_fail_on(ResourceKind::ProductListing, "create", true);
        let err = h
            .engine
            .reconcile_price_list(created.price_list.id, DesiredPriceList::new(settings))
            .await
            .unwrap_err();

        let SyncError::IrrecoverableDivergence { remote_id, .. } = &err else {
            panic!("expected IrrecoverableDivergence, got {err:?}");
        };
        assert_eq!(*remote_id, listing);
        assert!(err.is_fatal());
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn deleting_lists_removes_listings_and_rows() {
        let h = harness(&[P1, P2]);
        let supplier = ActorId::new();
        let first = create(
            &h,
            supplier,
            DesiredPriceList::new(PriceListSettings::wholesale("A"))
                .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 10, 5))),
        )
        .await;
        let second = create(
            &h,
            supplier,
            DesiredPriceList::new(PriceListSettings::wholesale("B"))
                .product(DesiredProduct::new(P2, "Cup").variant(wholesale_variant("v2", 10, 5))),
        )
        .await;
        assert_eq!(h.gateway.object_count(ResourceKind::ProductListing), 2);

        let deleted = h
            .engine
            .delete_price_lists(supplier, &[first.price_list.id, second.price_list.id])
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(h.gateway.object_count(ResourceKind::ProductListing), 0);
        assert!(h.store.price_lists().await.is_empty());
        assert!(h.store.products().await.is_empty());
        assert!(h.store.variants().await.is_empty());
    }

    #[tokio::test]
    async fn deleting_another_suppliers_list_is_rejected() {
        let h = harness(&[P1]);
        let owner = ActorId::new();
        let created = create(
            &h,
            owner,
            DesiredPriceList::new(PriceListSettings::wholesale("A"))
                .product(DesiredProduct::new(P1, "Mug").variant(wholesale_variant("v1", 10, 5))),
        )
        .await;

        let err = h
            .engine
            .delete_price_lists(ActorId::new(), &[created.price_list.id])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::PriceListNotOwned { .. })
        ));
        assert_eq!(h.gateway.call_count("delete", ResourceKind::ProductListing), 0);
        assert_eq!(h.store.price_lists().await.len(), 1);
    }

    #[tokio::test]
    async fn deleting_unknown_list_is_not_found() {
        let h = harness(&[]);
        let err = h
            .engine
            .delete_price_lists(ActorId::new(), &[PriceListId::new()])
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NotFound { .. }));
    }
}
