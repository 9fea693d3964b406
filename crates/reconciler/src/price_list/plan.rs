use std::collections::HashMap;

use common::{ProductId, RemoteId, VariantId};
use domain::{NewVariant, PriceListSettings, Variant, VariantUpdate};

use super::desired::DesiredPriceList;
use crate::diff::diff;
use crate::error::{Result, SyncError};

/// Variant writes of one reconciliation, applied in a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantPlan {
    pub to_add: Vec<NewVariant>,
    pub to_update: Vec<VariantUpdate>,
    pub to_remove: Vec<VariantId>,
}

impl VariantPlan {
    /// Returns true if there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

/// Plans the variant writes that bring `current` in line with `desired`.
///
/// `product_ids` maps each product's remote id to its local id and must be
/// read after products were applied. Updates that would not change a row
/// are dropped.
pub fn plan_variants(
    settings: &PriceListSettings,
    desired: &DesiredPriceList,
    current: &[Variant],
    product_ids: &HashMap<RemoteId, ProductId>,
) -> Result<VariantPlan> {
    let wanted: Vec<_> = desired.variants().collect();
    let changes = diff(
        "variant",
        &wanted,
        current,
        |(_, v)| v.remote_id.clone(),
        |v| v.remote_id.clone(),
    )?;

    let parent = |product: &RemoteId| {
        product_ids.get(product).copied().ok_or_else(|| {
            SyncError::Invariant(format!("product {product} has no local row after apply"))
        })
    };

    let mut plan = VariantPlan::default();

    for &&(product, variant) in &changes.to_add {
        plan.to_add.push(NewVariant {
            product_id: parent(product)?,
            remote_id: variant.remote_id.clone(),
            pricing: settings.price_variant(
                &variant.remote_id,
                variant.retail_price,
                variant.wholesale_price,
            )?,
        });
    }

    for &(&(product, variant), existing) in &changes.to_update {
        let product_id = parent(product)?;
        let pricing = settings.price_variant(
            &variant.remote_id,
            variant.retail_price,
            variant.wholesale_price,
        )?;
        if product_id == existing.product_id && pricing == existing.pricing() {
            continue;
        }
        plan.to_update.push(VariantUpdate {
            id: existing.id,
            product_id,
            pricing,
        });
    }

    plan.to_remove = changes.to_remove.into_iter().map(|v| v.id).collect();
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_list::desired::{DesiredProduct, DesiredVariant};
    use domain::{Margin, Money, PricingStrategy};

    fn existing(product_id: ProductId, remote: &str, retail: i64, cost: i64) -> Variant {
        Variant {
            id: VariantId::new(),
            product_id,
            remote_id: RemoteId::from(remote),
            retail_price: Money::from_cents(retail),
            wholesale_price: None,
            retailer_cost: Money::from_cents(cost),
        }
    }

    #[test]
    fn test_plan_resolves_parents_and_skips_unchanged() {
        let settings = PriceListSettings::margin("M", Margin::new(25).unwrap());
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let ids = HashMap::from([
            (RemoteId::from("gid://shop/Product/1"), p1),
            (RemoteId::from("gid://shop/Product/2"), p2),
        ]);
        let desired = DesiredPriceList::new(settings.clone())
            .product(
                DesiredProduct::new("gid://shop/Product/1", "A")
                    .variant(DesiredVariant::new("v1", Money::from_cents(1000)))
                    .variant(DesiredVariant::new("v2", Money::from_cents(2000))),
            )
            .product(
                DesiredProduct::new("gid://shop/Product/2", "B")
                    .variant(DesiredVariant::new("v3", Money::from_cents(999))),
            );
        let unchanged = existing(p1, "v1", 1000, 750);
        let repriced = existing(p1, "v2", 1800, 1350);
        let stale = existing(p2, "v9", 100, 75);

        let plan = plan_variants(
            &settings,
            &desired,
            &[unchanged, repriced.clone(), stale.clone()],
            &ids,
        )
        .unwrap();

        assert_eq!(plan.to_add.len(), 1);
        assert_eq!(plan.to_add[0].product_id, p2);
        assert_eq!(plan.to_add[0].pricing.retailer_cost, Money::from_cents(749));
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].id, repriced.id);
        assert_eq!(plan.to_update[0].pricing.retailer_cost, Money::from_cents(1500));
        assert_eq!(plan.to_remove, vec![stale.id]);
    }

    #[test]
    fn test_missing_parent_mapping_is_an_invariant_failure() {
        let settings = PriceListSettings::wholesale("W");
        let desired = DesiredPriceList::new(settings.clone()).product(
            DesiredProduct::new("gid://shop/Product/1", "A").variant(
                DesiredVariant::new("v1", Money::from_cents(500)).wholesale(Money::from_cents(300)),
            ),
        );

        let err = plan_variants(&settings, &desired, &[], &HashMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::Invariant(_)));
    }

    #[test]
    fn test_strategy_change_reprices_every_variant() {
        let settings = PriceListSettings::wholesale("W");
        assert_eq!(settings.strategy, PricingStrategy::Wholesale);
        let p1 = ProductId::new();
        let ids = HashMap::from([(RemoteId::from("gid://shop/Product/1"), p1)]);
        let desired = DesiredPriceList::new(settings.clone()).product(
            DesiredProduct::new("gid://shop/Product/1", "A").variant(
                DesiredVariant::new("v1", Money::from_cents(1000))
                    .wholesale(Money::from_cents(600)),
            ),
        );

        let plan = plan_variants(&settings, &desired, &[existing(p1, "v1", 1000, 750)], &ids)
            .unwrap();

        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(
            plan.to_update[0].pricing.wholesale_price,
            Some(Money::from_cents(600))
        );
        assert_eq!(plan.to_update[0].pricing.retailer_cost, Money::from_cents(600));
    }
}
