//! Caller-supplied desired state of a price list.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use common::{ActorId, RemoteId};
use domain::{Money, PriceListSettings, ValidationError};
use serde::{Deserialize, Serialize};

/// Settings, nested catalog and retailer set a price list should end up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredPriceList {
    pub settings: PriceListSettings,
    #[serde(default)]
    pub products: Vec<DesiredProduct>,
    #[serde(default)]
    pub retailer_ids: Vec<ActorId>,
}

impl DesiredPriceList {
    /// Creates a desired state with no products and no retailers.
    pub fn new(settings: PriceListSettings) -> Self {
        Self {
            settings,
            products: Vec::new(),
            retailer_ids: Vec::new(),
        }
    }

    /// Adds a product.
    pub fn product(mut self, product: DesiredProduct) -> Self {
        self.products.push(product);
        self
    }

    /// Adds a retailer the list should be shared with.
    pub fn retailer(mut self, retailer_id: ActorId) -> Self {
        self.retailer_ids.push(retailer_id);
        self
    }

    /// Iterates over every desired variant with the remote id of its product.
    pub fn variants(&self) -> impl Iterator<Item = (&RemoteId, &DesiredVariant)> {
        self.products
            .iter()
            .flat_map(|p| p.variants.iter().map(move |v| (&p.remote_id, v)))
    }

    /// Checks everything that can be checked without reading any store.
    ///
    /// Covers the settings, key uniqueness of products, variants and
    /// retailers, and the pricing of every variant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.settings.validate()?;

        ensure_unique("product", self.products.iter().map(|p| &p.remote_id))?;
        ensure_unique("variant", self.variants().map(|(_, v)| &v.remote_id))?;
        ensure_unique("retailer", self.retailer_ids.iter())?;

        for (_, variant) in self.variants() {
            self.settings.price_variant(
                &variant.remote_id,
                variant.retail_price,
                variant.wholesale_price,
            )?;
        }
        Ok(())
    }
}

/// A catalog product that should be published through the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredProduct {
    pub remote_id: RemoteId,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub variants: Vec<DesiredVariant>,
}

impl DesiredProduct {
    /// Creates a product without variants.
    pub fn new(remote_id: impl Into<RemoteId>, title: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            title: title.into(),
            image_url: None,
            variants: Vec::new(),
        }
    }

    /// Sets the image url.
    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Adds a variant.
    pub fn variant(mut self, variant: DesiredVariant) -> Self {
        self.variants.push(variant);
        self
    }
}

/// Desired prices of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredVariant {
    pub remote_id: RemoteId,
    pub retail_price: Money,
    #[serde(default)]
    pub wholesale_price: Option<Money>,
}

impl DesiredVariant {
    /// Creates a variant with only a retail price.
    pub fn new(remote_id: impl Into<RemoteId>, retail_price: Money) -> Self {
        Self {
            remote_id: remote_id.into(),
            retail_price,
            wholesale_price: None,
        }
    }

    /// Sets the wholesale price.
    pub fn wholesale(mut self, price: Money) -> Self {
        self.wholesale_price = Some(price);
        self
    }
}

fn ensure_unique<'a, K>(
    entity: &'static str,
    keys: impl Iterator<Item = &'a K>,
) -> Result<(), ValidationError>
where
    K: Eq + Hash + Display + 'a,
{
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(ValidationError::DuplicateKey {
                entity,
                key: key.to_string(),
            });
        }
    }
    Ok(())
}
