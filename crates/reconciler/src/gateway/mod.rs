//! Remote platform gateway trait and in-memory implementation.

pub mod memory;

use async_trait::async_trait;
use common::{ActorId, PriceListId, RemoteId};
use thiserror::Error;

pub use memory::InMemoryRemoteGateway;

/// Kinds of remote objects the engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A catalog product. Owned by the merchant, only ever queried.
    Product,
    /// Publication of a catalog product into a price list.
    ProductListing,
    /// The fulfillment capability of an actor.
    FulfillmentService,
}

impl ResourceKind {
    /// Returns the remote type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Product => "Product",
            ResourceKind::ProductListing => "ProductListing",
            ResourceKind::FulfillmentService => "FulfillmentService",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input of a remote create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteResource {
    /// Publishes `product` into a price list.
    ProductListing {
        product: RemoteId,
        price_list: PriceListId,
    },
    /// Registers the fulfillment service of an actor.
    FulfillmentService {
        owner: ActorId,
        name: String,
        callback_url: String,
    },
}

impl RemoteResource {
    /// Returns the kind of object this input creates.
    pub fn kind(&self) -> ResourceKind {
        match self {
            RemoteResource::ProductListing { .. } => ResourceKind::ProductListing,
            RemoteResource::FulfillmentService { .. } => ResourceKind::FulfillmentService,
        }
    }
}

/// Filter of a remote query. An empty id list matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFilter {
    pub ids: Vec<RemoteId>,
}

impl RemoteFilter {
    /// Filters to the given remote ids.
    pub fn ids(ids: impl IntoIterator<Item = RemoteId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

/// Lifecycle status reported for a remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Active,
    Archived,
}

/// A remote object returned by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: RemoteId,
    pub kind: ResourceKind,
    pub status: RemoteStatus,
}

/// Typed failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The platform refused the call.
    #[error("Remote {operation} of {kind} rejected: {message}")]
    Rejected {
        kind: ResourceKind,
        operation: &'static str,
        message: String,
    },

    /// The addressed object does not exist.
    #[error("Remote {kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: RemoteId },

    /// The platform could not be reached or timed out.
    #[error("Remote {operation} of {kind} unavailable: {message}")]
    Unavailable {
        kind: ResourceKind,
        operation: &'static str,
        message: String,
    },
}

impl RemoteError {
    /// Returns true if the addressed object is absent rather than the call failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Trait for the remote commerce platform.
///
/// Every call is one named remote operation that either succeeds or fails
/// with a [`RemoteError`]. Timeouts and transport retries belong to the
/// implementation.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Creates a remote object and returns its identity.
    async fn create(&self, resource: &RemoteResource) -> Result<RemoteId, RemoteError>;

    /// Deletes a remote object.
    async fn delete(&self, kind: ResourceKind, id: &RemoteId) -> Result<(), RemoteError>;

    /// Looks up remote objects. Unknown ids are absent from the result.
    async fn query(
        &self,
        kind: ResourceKind,
        filter: &RemoteFilter,
    ) -> Result<Vec<RemoteRecord>, RemoteError>;
}
