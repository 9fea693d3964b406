//! Products and variants published through a price list.

use common::{PriceListId, ProductId, RemoteId, VariantId};
use serde::{Deserialize, Serialize};

use crate::price_list::VariantPricing;
use crate::value_objects::Money;

/// A catalog product published into a price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub price_list_id: PriceListId,

    /// Remote catalog identity; the natural key when diffing.
    pub remote_id: RemoteId,

    /// Remote listing created when the product was published to the list.
    pub listing_id: RemoteId,

    pub title: String,
    pub image_url: Option<String>,
}

/// A product row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub price_list_id: PriceListId,
    pub remote_id: RemoteId,
    pub listing_id: RemoteId,
    pub title: String,
    pub image_url: Option<String>,
}

/// A variant of a published product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub remote_id: RemoteId,
    pub retail_price: Money,
    /// Only populated under the wholesale strategy.
    pub wholesale_price: Option<Money>,
    pub retailer_cost: Money,
}

impl Variant {
    /// Returns the pricing fields of this variant.
    pub fn pricing(&self) -> VariantPricing {
        VariantPricing {
            retail_price: self.retail_price,
            wholesale_price: self.wholesale_price,
            retailer_cost: self.retailer_cost,
        }
    }
}

/// A variant row to insert. The parent product must already be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    pub product_id: ProductId,
    pub remote_id: RemoteId,
    pub pricing: VariantPricing,
}

/// New values for an existing variant row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantUpdate {
    pub id: VariantId,
    pub product_id: ProductId,
    pub pricing: VariantPricing,
}
