//! Domain validation errors.

use common::{ActorId, PriceListId, RemoteId};
use thiserror::Error;

use crate::partnership::RequestKind;
use crate::value_objects::Money;

/// A desired state that violates a model invariant.
///
/// Validation failures are raised before any remote or local mutation and
/// carry messages meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Price list name is blank.
    #[error("Price list name cannot be empty")]
    EmptyName,

    /// A supplier already owns a general price list.
    #[error("A supplier can only have one general price list")]
    DuplicateGeneralPriceList,

    /// The margin strategy was chosen without a margin.
    #[error("A margin is required when pricing by margin")]
    MarginRequired,

    /// A margin was provided for a wholesale price list.
    #[error("A margin cannot be set when pricing by wholesale price")]
    MarginNotAllowed,

    /// Margin outside `0..=100`.
    #[error("Margin must be between 0 and 100 percent, got {percent}")]
    InvalidMargin { percent: u32 },

    /// A general price list is missing its import-approval flag.
    #[error("A general price list must specify whether imports require approval")]
    ApprovalFlagRequired,

    /// A private price list carries an import-approval flag.
    #[error("Only a general price list can specify whether imports require approval")]
    ApprovalFlagNotAllowed,

    /// A variant has no wholesale price under the wholesale strategy.
    #[error("Variant {variant} needs a wholesale price")]
    WholesalePriceRequired { variant: RemoteId },

    /// A price below zero.
    #[error("Variant {variant} has a negative price ({price})")]
    NegativePrice { variant: RemoteId, price: Money },

    /// A price too large to derive the retailer cost from.
    #[error("Variant {variant} price {price} is out of range")]
    PriceOutOfRange { variant: RemoteId, price: Money },

    /// The same natural key appears twice in a desired collection.
    #[error("{entity} {key} appears more than once")]
    DuplicateKey { entity: &'static str, key: String },

    /// A product to add does not exist in the remote catalog.
    #[error("Product {product} no longer exists in the catalog")]
    UnknownProduct { product: RemoteId },

    /// A retailer was attached to a price list without a partnership.
    #[error("Retailer {retailer} is not a partner of this supplier")]
    NotPartnered { retailer: ActorId },

    /// A price list is not owned by the expected supplier.
    #[error("Price list {price_list} does not belong to supplier {supplier}")]
    PriceListNotOwned {
        price_list: PriceListId,
        supplier: ActorId,
    },

    /// A partnership request without price lists.
    #[error("A partnership request must reference at least one price list")]
    NoPriceLists,

    /// An actor addressed a request to itself.
    #[error("An actor cannot send a partnership request to itself")]
    SelfRequest,

    /// Approval was asked for requests of a different direction.
    #[error("Request {request} was initiated by the {actual} side, expected {expected}")]
    RequestKindMismatch {
        request: String,
        expected: RequestKind,
        actual: RequestKind,
    },
}
