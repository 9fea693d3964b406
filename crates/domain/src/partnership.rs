//! Partnerships between suppliers and retailers, and the requests that lead to them.

use chrono::{DateTime, Utc};
use common::{ActorId, PartnershipId, PartnershipRequestId, PriceListId};
use serde::{Deserialize, Serialize};

/// Which side initiated a partnership request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    /// A retailer asked a supplier for access to price lists.
    Retailer,
    /// A supplier offered price lists to a retailer.
    Supplier,
}

impl RequestKind {
    /// Returns the direction a mirror-image request would have.
    pub fn opposite(&self) -> RequestKind {
        match self {
            RequestKind::Retailer => RequestKind::Supplier,
            RequestKind::Supplier => RequestKind::Retailer,
        }
    }

    /// Returns the persisted name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Retailer => "RETAILER",
            RequestKind::Supplier => "SUPPLIER",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RETAILER" => Ok(RequestKind::Retailer),
            "SUPPLIER" => Ok(RequestKind::Supplier),
            other => Err(format!("unknown request kind: {other}")),
        }
    }
}

/// Status of a stored partnership request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Rejected,
}

impl RequestStatus {
    /// Returns the persisted name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "REJECTED" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// A confirmed relationship between one supplier and one retailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: PartnershipId,
    pub supplier_id: ActorId,
    pub retailer_id: ActorId,
    pub price_list_ids: Vec<PriceListId>,
    pub created_at: DateTime<Utc>,
}

/// A partnership row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPartnership {
    pub supplier_id: ActorId,
    pub retailer_id: ActorId,
    pub price_list_ids: Vec<PriceListId>,
}

/// A stored proposal from one actor to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnershipRequest {
    pub id: PartnershipRequestId,
    pub sender_id: ActorId,
    pub recipient_id: ActorId,
    pub kind: RequestKind,
    pub price_list_ids: Vec<PriceListId>,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl PartnershipRequest {
    /// Resolves the (retailer, supplier) pair this request is about.
    pub fn retailer_and_supplier(&self) -> (ActorId, ActorId) {
        match self.kind {
            RequestKind::Retailer => (self.sender_id, self.recipient_id),
            RequestKind::Supplier => (self.recipient_id, self.sender_id),
        }
    }

    /// Returns true if `other` describes the same relationship from the opposite side.
    pub fn is_mirror_of(&self, other: &PartnershipRequest) -> bool {
        self.sender_id == other.recipient_id
            && self.recipient_id == other.sender_id
            && self.kind == other.kind.opposite()
            && self
                .price_list_ids
                .iter()
                .any(|id| other.price_list_ids.contains(id))
    }
}

/// A partnership request row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPartnershipRequest {
    pub sender_id: ActorId,
    pub recipient_id: ActorId,
    pub kind: RequestKind,
    pub price_list_ids: Vec<PriceListId>,
    pub message: String,
    pub status: RequestStatus,
}

/// Where the relationship between two actors stands.
///
/// State transitions:
/// ```text
/// NoRequest ──► Pending ──┬──► Partnered
///                         └──► Rejected
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RelationshipState {
    /// Neither side has asked.
    #[default]
    NoRequest,

    /// One or both sides have a pending request.
    Pending { directions: Vec<RequestKind> },

    /// A partnership exists (terminal state).
    Partnered,

    /// The latest request was rejected (terminal state).
    Rejected,
}

impl RelationshipState {
    /// Returns true if a request can still be approved.
    pub fn can_approve(&self) -> bool {
        matches!(self, RelationshipState::Pending { .. })
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RelationshipState::Partnered | RelationshipState::Rejected
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipState::NoRequest => "NoRequest",
            RelationshipState::Pending { .. } => "Pending",
            RelationshipState::Partnered => "Partnered",
            RelationshipState::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for RelationshipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
