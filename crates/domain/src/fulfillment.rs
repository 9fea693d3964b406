//! Fulfillment services registered on the remote platform.

use chrono::{DateTime, Utc};
use common::{ActorId, FulfillmentServiceId, RemoteId};
use serde::{Deserialize, Serialize};

/// The local half of a remote fulfillment service.
///
/// Exactly one exists per actor, and only while its remote counterpart exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentService {
    pub id: FulfillmentServiceId,
    pub owner_id: ActorId,
    pub remote_id: RemoteId,
    pub created_at: DateTime<Utc>,
}
