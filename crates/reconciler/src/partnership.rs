//! Partnership reconciliation.
//!
//! Either side of a supplier/retailer pair can propose a partnership
//! independently, so two pending requests may describe the same relationship
//! from opposite directions. Approving one side retires its mirror in the
//! same local transaction that creates the partnership.

use std::collections::HashSet;

use common::{ActorId, PartnershipRequestId, PriceListId};
use domain::{
    NewPartnership, NewPartnershipRequest, Partnership, PartnershipRequest, PriceList,
    RelationshipState, RequestKind, RequestStatus, ValidationError,
};
use record_store::{RecordStore, RecordTransaction, RequestQuery};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::local::transaction;

/// Input of [`PartnershipEngine::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub sender_id: ActorId,
    pub recipient_id: ActorId,
    pub kind: RequestKind,
    pub price_list_ids: Vec<PriceListId>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: RequestStatus,
}

impl SubmitRequest {
    /// Creates a pending request with an empty message.
    pub fn new(
        sender_id: ActorId,
        recipient_id: ActorId,
        kind: RequestKind,
        price_list_ids: Vec<PriceListId>,
    ) -> Self {
        Self {
            sender_id,
            recipient_id,
            kind,
            price_list_ids,
            message: String::new(),
            status: RequestStatus::Pending,
        }
    }

    /// Sets the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the status.
    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = status;
        self
    }

    /// Resolves the supplier side of the request.
    fn supplier_id(&self) -> ActorId {
        match self.kind {
            RequestKind::Retailer => self.recipient_id,
            RequestKind::Supplier => self.sender_id,
        }
    }
}

/// Result of a retailer asking for access to price lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Every list allowed direct import; the partnership exists now.
    Partnered(Partnership),
    /// At least one list needs approval; a request was submitted.
    Requested(PartnershipRequest),
}

/// Manages partnership requests and the partnerships they turn into.
pub struct PartnershipEngine<S> {
    store: S,
}

impl<S: RecordStore> PartnershipEngine<S> {
    /// Creates a new partnership engine.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a request, or updates the pending one it supersedes.
    ///
    /// A pending request with the same sender, recipient and kind that shares
    /// a price list gets the new message and status; otherwise a new request
    /// is inserted.
    #[tracing::instrument(skip(self, request), fields(sender = %request.sender_id, recipient = %request.recipient_id, kind = %request.kind))]
    pub async fn submit(&self, request: SubmitRequest) -> Result<PartnershipRequest> {
        validate_parties(request.sender_id, request.recipient_id, &request.price_list_ids)?;

        let stored = transaction(&self.store, move |tx| {
            Box::pin(async move {
                owned_price_lists(&mut *tx, request.supplier_id(), &request.price_list_ids).await?;

                let query = RequestQuery::pending_between(request.sender_id, request.recipient_id)
                    .kind(request.kind)
                    .overlapping(request.price_list_ids.clone());
                let existing = tx.query_partnership_requests(&query).await?;

                match existing.into_iter().next() {
                    Some(pending) => Ok(tx
                        .update_partnership_request(pending.id, &request.message, request.status)
                        .await?),
                    None => Ok(tx
                        .insert_partnership_request(NewPartnershipRequest {
                            sender_id: request.sender_id,
                            recipient_id: request.recipient_id,
                            kind: request.kind,
                            price_list_ids: request.price_list_ids,
                            message: request.message,
                            status: request.status,
                        })
                        .await?),
                }
            })
        })
        .await?;

        tracing::info!(request_id = %stored.id, "partnership request stored");
        Ok(stored)
    }

    /// Approves requests initiated by the `kind` side.
    ///
    /// In one transaction: deletes the requests and their pending mirrors,
    /// and creates one partnership per request with that request's price
    /// lists. An existing partnership for the pair is extended instead.
    /// Either everything is written or nothing is.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len(), kind = %kind))]
    pub async fn approve(
        &self,
        ids: &[PartnershipRequestId],
        kind: RequestKind,
    ) -> Result<Vec<Partnership>> {
        let ids = unique(ids);

        let (partnerships, mirrors) = transaction(&self.store, move |tx| {
            Box::pin(async move {
                let requests = load_requests(&mut *tx, &ids).await?;
                if let Some(request) = requests.iter().find(|r| r.kind != kind) {
                    return Err(ValidationError::RequestKindMismatch {
                        request: request.id.to_string(),
                        expected: kind,
                        actual: request.kind,
                    }
                    .into());
                }

                let mut retired = ids.clone();
                for request in &requests {
                    for mirror in tx
                        .query_partnership_requests(&RequestQuery::mirror_of(request))
                        .await?
                    {
                        if !retired.contains(&mirror.id) {
                            tracing::debug!(request_id = %request.id, mirror_id = %mirror.id, "discarding mirror request");
                            retired.push(mirror.id);
                        }
                    }
                }
                let mirrors = retired.len() - ids.len();
                tx.delete_partnership_requests(&retired).await?;

                let mut partnerships = Vec::with_capacity(requests.len());
                for request in &requests {
                    let (retailer_id, supplier_id) = request.retailer_and_supplier();
                    partnerships.push(
                        link(&mut *tx, supplier_id, retailer_id, &request.price_list_ids).await?,
                    );
                }

                Ok((partnerships, mirrors))
            })
        })
        .await?;

        metrics::counter!("partnership_requests_approved_total", "kind" => kind.as_str())
            .increment(partnerships.len() as u64);
        tracing::info!(
            partnerships = partnerships.len(),
            mirrors,
            "partnership requests approved"
        );

        Ok(partnerships)
    }

    /// Rejects requests by deleting them. Returns the number deleted.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn reject(&self, ids: &[PartnershipRequestId]) -> Result<u64> {
        let ids = unique(ids);
        let deleted = transaction(&self.store, move |tx| {
            Box::pin(async move {
                load_requests(&mut *tx, &ids).await?;
                Ok(tx.delete_partnership_requests(&ids).await?)
            })
        })
        .await?;

        tracing::info!(deleted, "partnership requests rejected");
        Ok(deleted)
    }

    /// Gives a retailer access to a supplier's price lists.
    ///
    /// If every list is general and open for direct import, the partnership
    /// is created or extended right away. Otherwise a retailer-initiated
    /// request is submitted.
    #[tracing::instrument(skip(self, price_list_ids, message))]
    pub async fn request_access(
        &self,
        retailer_id: ActorId,
        supplier_id: ActorId,
        price_list_ids: Vec<PriceListId>,
        message: String,
    ) -> Result<AccessOutcome> {
        validate_parties(retailer_id, supplier_id, &price_list_ids)?;

        let lists = price_list_ids.clone();
        let partnership = transaction(&self.store, move |tx| {
            Box::pin(async move {
                let owned = owned_price_lists(&mut *tx, supplier_id, &lists).await?;
                if !owned.iter().all(PriceList::allows_direct_import) {
                    return Ok(None);
                }
                Ok(Some(link(&mut *tx, supplier_id, retailer_id, &lists).await?))
            })
        })
        .await?;

        if let Some(partnership) = partnership {
            tracing::info!(partnership_id = %partnership.id, "direct import granted");
            return Ok(AccessOutcome::Partnered(partnership));
        }

        let request = SubmitRequest::new(retailer_id, supplier_id, RequestKind::Retailer, price_list_ids)
            .message(message);
        self.submit(request).await.map(AccessOutcome::Requested)
    }

    /// Reports where the relationship between a retailer and a supplier stands.
    pub async fn relationship_state(
        &self,
        retailer_id: ActorId,
        supplier_id: ActorId,
    ) -> Result<RelationshipState> {
        transaction(&self.store, move |tx| {
            Box::pin(async move {
                if tx.find_partnership(supplier_id, retailer_id).await?.is_some() {
                    return Ok(RelationshipState::Partnered);
                }

                let mut requests = tx
                    .query_partnership_requests(
                        &RequestQuery::new()
                            .sender(retailer_id)
                            .recipient(supplier_id)
                            .kind(RequestKind::Retailer),
                    )
                    .await?;
                requests.extend(
                    tx.query_partnership_requests(
                        &RequestQuery::new()
                            .sender(supplier_id)
                            .recipient(retailer_id)
                            .kind(RequestKind::Supplier),
                    )
                    .await?,
                );

                let mut directions: Vec<RequestKind> = requests
                    .iter()
                    .filter(|r| r.status == RequestStatus::Pending)
                    .map(|r| r.kind)
                    .collect();
                directions.dedup();

                Ok(if !directions.is_empty() {
                    RelationshipState::Pending { directions }
                } else if requests.iter().any(|r| r.status == RequestStatus::Rejected) {
                    RelationshipState::Rejected
                } else {
                    RelationshipState::NoRequest
                })
            })
        })
        .await
    }
}

fn unique(ids: &[PartnershipRequestId]) -> Vec<PartnershipRequestId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn validate_parties(
    sender_id: ActorId,
    recipient_id: ActorId,
    price_list_ids: &[PriceListId],
) -> std::result::Result<(), ValidationError> {
    if price_list_ids.is_empty() {
        return Err(ValidationError::NoPriceLists);
    }
    if sender_id == recipient_id {
        return Err(ValidationError::SelfRequest);
    }
    Ok(())
}

/// Loads price lists and checks that `supplier_id` owns every one of them.
async fn owned_price_lists<T: RecordTransaction>(
    tx: &mut T,
    supplier_id: ActorId,
    ids: &[PriceListId],
) -> Result<Vec<PriceList>> {
    let lists = tx.find_price_lists(ids).await?;
    for id in ids {
        match lists.iter().find(|l| l.id == *id) {
            None => {
                return Err(SyncError::NotFound {
                    entity: "price list",
                    id: id.to_string(),
                });
            }
            Some(list) if list.supplier_id != supplier_id => {
                return Err(ValidationError::PriceListNotOwned {
                    price_list: list.id,
                    supplier: supplier_id,
                }
                .into());
            }
            Some(_) => {}
        }
    }
    Ok(lists)
}

/// Loads requests in the order of `ids`. Every id must exist.
async fn load_requests<T: RecordTransaction>(
    tx: &mut T,
    ids: &[PartnershipRequestId],
) -> Result<Vec<PartnershipRequest>> {
    let mut found = tx.find_partnership_requests(ids).await?;
    let mut ordered = Vec::with_capacity(ids.len());
    for id in ids {
        let position = found
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| SyncError::NotFound {
                entity: "partnership request",
                id: id.to_string(),
            })?;
        ordered.push(found.swap_remove(position));
    }
    Ok(ordered)
}

/// Creates the partnership of a pair, or links more price lists to it.
async fn link<T: RecordTransaction>(
    tx: &mut T,
    supplier_id: ActorId,
    retailer_id: ActorId,
    price_list_ids: &[PriceListId],
) -> Result<Partnership> {
    match tx.find_partnership(supplier_id, retailer_id).await? {
        Some(existing) => {
            tx.attach_price_lists(existing.id, price_list_ids).await?;
            tx.find_partnership(supplier_id, retailer_id)
                .await?
                .ok_or_else(|| {
                    SyncError::Invariant(format!("partnership {} vanished while linking", existing.id))
                })
        }
        None => Ok(tx
            .insert_partnership(NewPartnership {
                supplier_id,
                retailer_id,
                price_list_ids: price_list_ids.to_vec(),
            })
            .await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplier_side_follows_kind() {
        let retailer = ActorId::new();
        let supplier = ActorId::new();
        let lists = vec![PriceListId::new()];

        let asked = SubmitRequest::new(retailer, supplier, RequestKind::Retailer, lists.clone());
        assert_eq!(asked.supplier_id(), supplier);

        let offered = SubmitRequest::new(supplier, retailer, RequestKind::Supplier, lists);
        assert_eq!(offered.supplier_id(), supplier);
    }

    #[test]
    fn test_parties_must_differ_and_name_lists() {
        let actor = ActorId::new();
        assert_eq!(
            validate_parties(actor, ActorId::new(), &[]),
            Err(ValidationError::NoPriceLists)
        );
        assert_eq!(
            validate_parties(actor, actor, &[PriceListId::new()]),
            Err(ValidationError::SelfRequest)
        );
        assert!(validate_parties(actor, ActorId::new(), &[PriceListId::new()]).is_ok());
    }
}
