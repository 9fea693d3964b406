//! Price lists and their pricing rules.

use chrono::{DateTime, Utc};
use common::{ActorId, PriceListId, RemoteId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value_objects::{Margin, Money};

/// How retailer cost is derived for the variants of a price list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingStrategy {
    /// Retailer keeps a percentage of the retail price.
    Margin,
    /// Supplier sets an explicit wholesale price per variant.
    Wholesale,
}

impl PricingStrategy {
    /// Returns the persisted name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingStrategy::Margin => "MARGIN",
            PricingStrategy::Wholesale => "WHOLESALE",
        }
    }
}

impl std::fmt::Display for PricingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PricingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MARGIN" => Ok(PricingStrategy::Margin),
            "WHOLESALE" => Ok(PricingStrategy::Wholesale),
            other => Err(format!("unknown pricing strategy: {other}")),
        }
    }
}

/// The mutable settings of a price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceListSettings {
    /// Display name shown to retailers.
    pub name: String,

    /// Whether every partner of the supplier can see this list.
    pub is_general: bool,

    /// Pricing strategy.
    pub strategy: PricingStrategy,

    /// Retailer margin, present iff the strategy is `Margin`.
    pub margin: Option<Margin>,

    /// Whether imports need supplier approval, present iff `is_general`.
    pub requires_approval: Option<bool>,
}

impl PriceListSettings {
    /// Settings for a private list priced by margin.
    pub fn margin(name: impl Into<String>, margin: Margin) -> Self {
        Self {
            name: name.into(),
            is_general: false,
            strategy: PricingStrategy::Margin,
            margin: Some(margin),
            requires_approval: None,
        }
    }

    /// Settings for a private list priced by wholesale price.
    pub fn wholesale(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_general: false,
            strategy: PricingStrategy::Wholesale,
            margin: None,
            requires_approval: None,
        }
    }

    /// Turns these settings into a general list with the given approval flag.
    pub fn into_general(mut self, requires_approval: bool) -> Self {
        self.is_general = true;
        self.requires_approval = Some(requires_approval);
        self
    }

    /// Checks the field-level invariants of the settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        match (self.strategy, self.margin) {
            (PricingStrategy::Margin, None) => return Err(ValidationError::MarginRequired),
            (PricingStrategy::Wholesale, Some(_)) => {
                return Err(ValidationError::MarginNotAllowed);
            }
            _ => {}
        }

        match (self.is_general, self.requires_approval) {
            (true, None) => Err(ValidationError::ApprovalFlagRequired),
            (false, Some(_)) => Err(ValidationError::ApprovalFlagNotAllowed),
            _ => Ok(()),
        }
    }

    /// Computes the stored pricing of a variant under these settings.
    ///
    /// A wholesale price supplied under the margin strategy is discarded.
    pub fn price_variant(
        &self,
        variant: &RemoteId,
        retail_price: Money,
        wholesale_price: Option<Money>,
    ) -> Result<VariantPricing, ValidationError> {
        if let Some(price) = [Some(retail_price), wholesale_price]
            .into_iter()
            .flatten()
            .find(Money::is_negative)
        {
            return Err(ValidationError::NegativePrice {
                variant: variant.clone(),
                price,
            });
        }

        match self.strategy {
            PricingStrategy::Margin => {
                let margin = self.margin.ok_or(ValidationError::MarginRequired)?;
                let retailer_cost = retail_price.less_margin(margin).ok_or_else(|| {
                    ValidationError::PriceOutOfRange {
                        variant: variant.clone(),
                        price: retail_price,
                    }
                })?;
                Ok(VariantPricing {
                    retail_price,
                    wholesale_price: None,
                    retailer_cost,
                })
            }
            PricingStrategy::Wholesale => {
                let wholesale =
                    wholesale_price.ok_or_else(|| ValidationError::WholesalePriceRequired {
                        variant: variant.clone(),
                    })?;
                Ok(VariantPricing {
                    retail_price,
                    wholesale_price: Some(wholesale),
                    retailer_cost: wholesale,
                })
            }
        }
    }
}

/// Pricing fields stored on a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPricing {
    pub retail_price: Money,
    pub wholesale_price: Option<Money>,
    pub retailer_cost: Money,
}

/// A persisted price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: PriceListId,
    pub supplier_id: ActorId,
    pub settings: PriceListSettings,
    pub created_at: DateTime<Utc>,
}

impl PriceList {
    /// Returns true if retailers can import from this list without a request.
    pub fn allows_direct_import(&self) -> bool {
        self.settings.is_general && self.settings.requires_approval == Some(false)
    }
}
