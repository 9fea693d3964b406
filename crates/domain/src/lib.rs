//! Domain model for supplier price lists and retailer partnerships.
//!
//! This crate holds the persisted shapes and their invariants:
//! - Price lists with margin or wholesale pricing
//! - Products and variants published through a price list
//! - Partnerships and the directional requests that precede them
//! - Fulfillment services paired with a remote object

pub mod catalog;
pub mod error;
pub mod fulfillment;
pub mod partnership;
pub mod price_list;
pub mod value_objects;

pub use catalog::{NewProduct, NewVariant, Product, Variant, VariantUpdate};
pub use error::ValidationError;
pub use fulfillment::FulfillmentService;
pub use partnership::{
    NewPartnership, NewPartnershipRequest, Partnership, PartnershipRequest, RelationshipState,
    RequestKind, RequestStatus,
};
pub use price_list::{PriceList, PriceListSettings, PricingStrategy, VariantPricing};
pub use value_objects::{Margin, Money};
