use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::RemoteId;

use super::{
    RemoteError, RemoteFilter, RemoteGateway, RemoteRecord, RemoteResource, RemoteStatus,
    ResourceKind,
};

/// One call received by [`InMemoryRemoteGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub operation: &'static str,
    pub kind: ResourceKind,
    /// Created or deleted identity; `None` for queries and failed creates.
    pub id: Option<RemoteId>,
}

#[derive(Debug, Default)]
struct InMemoryRemoteState {
    catalog: BTreeMap<RemoteId, RemoteStatus>,
    objects: HashMap<RemoteId, RemoteResource>,
    next_id: u32,
    failures: HashSet<(ResourceKind, &'static str)>,
    creates_before_failure: Option<(ResourceKind, usize)>,
    calls: Vec<RemoteCall>,
}

/// In-memory remote platform for testing.
///
/// Holds a catalog of merchant products and every object created through
/// it. Calls can be made to fail per kind and operation, and every call is
/// recorded so tests can assert what was sent and how often.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemoteGateway {
    state: Arc<RwLock<InMemoryRemoteState>>,
}

impl InMemoryRemoteGateway {
    /// Creates a new empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway whose catalog holds the given active products.
    pub fn with_catalog<I, T>(products: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RemoteId>,
    {
        let gateway = Self::new();
        for product in products {
            gateway.add_catalog_product(product);
        }
        gateway
    }

    /// Adds an active product to the catalog.
    pub fn add_catalog_product(&self, id: impl Into<RemoteId>) {
        self.state
            .write()
            .unwrap()
            .catalog
            .insert(id.into(), RemoteStatus::Active);
    }

    /// Marks a catalog product as archived.
    pub fn archive_catalog_product(&self, id: impl Into<RemoteId>) {
        self.state
            .write()
            .unwrap()
            .catalog
            .insert(id.into(), RemoteStatus::Archived);
    }

    /// Configures every `operation` ("create", "delete" or "query") on `kind` to fail.
    pub fn set_fail_on(&self, kind: ResourceKind, operation: &'static str, fail: bool) {
        let mut state = self.state.write().unwrap();
        if fail {
            state.failures.insert((kind, operation));
        } else {
            state.failures.remove(&(kind, operation));
        }
    }

    /// Lets `successes` more creates of `kind` through, then fails every later one.
    pub fn fail_creates_after(&self, kind: ResourceKind, successes: usize) {
        self.state.write().unwrap().creates_before_failure = Some((kind, successes));
    }

    /// Returns true if an object with this id currently exists.
    pub fn contains(&self, id: &RemoteId) -> bool {
        self.state.read().unwrap().objects.contains_key(id)
    }

    /// Returns the input an existing object was created from.
    pub fn resource(&self, id: &RemoteId) -> Option<RemoteResource> {
        self.state.read().unwrap().objects.get(id).cloned()
    }

    /// Returns the number of existing objects of `kind`.
    pub fn object_count(&self, kind: ResourceKind) -> usize {
        self.state
            .read()
            .unwrap()
            .objects
            .values()
            .filter(|r| r.kind() == kind)
            .count()
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Returns how many `operation` calls on `kind` were received.
    pub fn call_count(&self, operation: &str, kind: ResourceKind) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.operation == operation && c.kind == kind)
            .count()
    }
}

impl InMemoryRemoteState {
    fn check(&self, kind: ResourceKind, operation: &'static str) -> Result<(), RemoteError> {
        if self.failures.contains(&(kind, operation)) {
            return Err(RemoteError::Rejected {
                kind,
                operation,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for InMemoryRemoteGateway {
    async fn create(&self, resource: &RemoteResource) -> Result<RemoteId, RemoteError> {
        let mut state = self.state.write().unwrap();
        let kind = resource.kind();
        state.calls.push(RemoteCall {
            operation: "create",
            kind,
            id: None,
        });
        state.check(kind, "create")?;

        if let Some((limited, remaining)) = state.creates_before_failure {
            if limited == kind && remaining == 0 {
                return Err(RemoteError::Unavailable {
                    kind,
                    operation: "create",
                    message: "injected failure".to_string(),
                });
            }
            if limited == kind {
                state.creates_before_failure = Some((kind, remaining - 1));
            }
        }

        state.next_id += 1;
        let id = RemoteId::new(format!("gid://remote/{}/{}", kind, state.next_id));
        state.objects.insert(id.clone(), resource.clone());
        if let Some(call) = state.calls.last_mut() {
            call.id = Some(id.clone());
        }
        Ok(id)
    }

    async fn delete(&self, kind: ResourceKind, id: &RemoteId) -> Result<(), RemoteError> {
        let mut state = self.state.write().unwrap();
        state.calls.push(RemoteCall {
            operation: "delete",
            kind,
            id: Some(id.clone()),
        });
        state.check(kind, "delete")?;

        match state.objects.get(id) {
            Some(resource) if resource.kind() == kind => {
                state.objects.remove(id);
                Ok(())
            }
            _ => Err(RemoteError::NotFound {
                kind,
                id: id.clone(),
            }),
        }
    }

    async fn query(
        &self,
        kind: ResourceKind,
        filter: &RemoteFilter,
    ) -> Result<Vec<RemoteRecord>, RemoteError> {
        let mut state = self.state.write().unwrap();
        state.calls.push(RemoteCall {
            operation: "query",
            kind,
            id: None,
        });
        if state.failures.contains(&(kind, "query")) {
            return Err(RemoteError::Unavailable {
                kind,
                operation: "query",
                message: "injected failure".to_string(),
            });
        }

        let records = filter
            .ids
            .iter()
            .filter_map(|id| {
                let status = match kind {
                    ResourceKind::Product => state.catalog.get(id).copied(),
                    _ => state
                        .objects
                        .get(id)
                        .filter(|r| r.kind() == kind)
                        .map(|_| RemoteStatus::Active),
                }?;
                Some(RemoteRecord {
                    id: id.clone(),
                    kind,
                    status,
                })
            })
            .collect();
        Ok(records)
    }
}
