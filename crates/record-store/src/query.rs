use common::{ActorId, PriceListId};
use domain::{PartnershipRequest, RequestKind, RequestStatus};

/// Builder for filtering partnership requests.
///
/// Every field left as `None` matches any value. `price_list_ids` matches
/// requests referencing at least one of the given price lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    /// Filter by sender.
    pub sender_id: Option<ActorId>,

    /// Filter by recipient.
    pub recipient_id: Option<ActorId>,

    /// Filter by initiating side.
    pub kind: Option<RequestKind>,

    /// Filter by status.
    pub status: Option<RequestStatus>,

    /// Filter to requests sharing at least one of these price lists.
    pub price_list_ids: Option<Vec<PriceListId>>,
}

impl RequestQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for pending requests between a sender and a recipient.
    pub fn pending_between(sender_id: ActorId, recipient_id: ActorId) -> Self {
        Self {
            sender_id: Some(sender_id),
            recipient_id: Some(recipient_id),
            status: Some(RequestStatus::Pending),
            ..Default::default()
        }
    }

    /// Creates a query matching the pending mirror image of `request`.
    pub fn mirror_of(request: &PartnershipRequest) -> Self {
        Self::pending_between(request.recipient_id, request.sender_id)
            .kind(request.kind.opposite())
            .overlapping(request.price_list_ids.clone())
    }

    /// Filters by sender.
    pub fn sender(mut self, sender_id: ActorId) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    /// Filters by recipient.
    pub fn recipient(mut self, recipient_id: ActorId) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    /// Filters by initiating side.
    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filters by status.
    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters to requests sharing at least one of these price lists.
    pub fn overlapping(mut self, price_list_ids: Vec<PriceListId>) -> Self {
        self.price_list_ids = Some(price_list_ids);
        self
    }

    /// Returns true if `request` satisfies every filter of this query.
    pub fn matches(&self, request: &PartnershipRequest) -> bool {
        if let Some(sender) = self.sender_id
            && request.sender_id != sender
        {
            return false;
        }
        if let Some(recipient) = self.recipient_id
            && request.recipient_id != recipient
        {
            return false;
        }
        if let Some(kind) = self.kind
            && request.kind != kind
        {
            return false;
        }
        if let Some(status) = self.status
            && request.status != status
        {
            return false;
        }
        if let Some(ref ids) = self.price_list_ids
            && !request.price_list_ids.iter().any(|id| ids.contains(id))
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::PartnershipRequestId;

    fn request(sender: ActorId, recipient: ActorId, lists: Vec<PriceListId>) -> PartnershipRequest {
        PartnershipRequest {
            id: PartnershipRequestId::new(),
            sender_id: sender,
            recipient_id: recipient,
            kind: RequestKind::Retailer,
            price_list_ids: lists,
            message: "hello".to_string(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let r = request(ActorId::new(), ActorId::new(), vec![PriceListId::new()]);
        assert!(RequestQuery::new().matches(&r));
    }

    #[test]
    fn query_builder_chain() {
        let sender = ActorId::new();
        let recipient = ActorId::new();
        let list = PriceListId::new();
        let query = RequestQuery::new()
            .sender(sender)
            .recipient(recipient)
            .kind(RequestKind::Supplier)
            .status(RequestStatus::Rejected)
            .overlapping(vec![list]);

        assert_eq!(query.sender_id, Some(sender));
        assert_eq!(query.recipient_id, Some(recipient));
        assert_eq!(query.kind, Some(RequestKind::Supplier));
        assert_eq!(query.status, Some(RequestStatus::Rejected));
        assert_eq!(query.price_list_ids, Some(vec![list]));
    }

    #[test]
    fn mirror_query_swaps_parties_and_kind() {
        let retailer = ActorId::new();
        let supplier = ActorId::new();
        let shared = PriceListId::new();
        let original = request(retailer, supplier, vec![shared]);

        let query = RequestQuery::mirror_of(&original);
        assert_eq!(query.sender_id, Some(supplier));
        assert_eq!(query.recipient_id, Some(retailer));
        assert_eq!(query.kind, Some(RequestKind::Supplier));
        assert_eq!(query.status, Some(RequestStatus::Pending));

        let mut mirror = request(supplier, retailer, vec![PriceListId::new(), shared]);
        mirror.kind = RequestKind::Supplier;
        assert!(query.matches(&mirror));
        assert!(!query.matches(&original));
    }

    #[test]
    fn overlap_filter_requires_a_shared_price_list() {
        let r = request(ActorId::new(), ActorId::new(), vec![PriceListId::new()]);
        let query = RequestQuery::new().overlapping(vec![PriceListId::new()]);
        assert!(!query.matches(&r));
    }
}
