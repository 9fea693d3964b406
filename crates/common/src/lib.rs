//! Shared identifier types for the dual-write workspace.

mod types;

pub use types::{
    ActorId, FulfillmentServiceId, PartnershipId, PartnershipRequestId, PriceListId, ProductId,
    RemoteId, VariantId,
};
