use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier for a locally persisted row.
///
/// Each identifier is a distinct type so a price list id can never be passed
/// where a product id is expected.
macro_rules! local_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

local_id!(
    /// Identity of an actor (a supplier or retailer store session).
    ActorId
);
local_id!(
    /// Local identity of a price list.
    PriceListId
);
local_id!(
    /// Local identity of a product row inside a price list.
    ProductId
);
local_id!(
    /// Local identity of a variant row.
    VariantId
);
local_id!(
    /// Local identity of a confirmed partnership.
    PartnershipId
);
local_id!(
    /// Local identity of a pending partnership request.
    PartnershipRequestId
);
local_id!(
    /// Local identity of a fulfillment service row.
    FulfillmentServiceId
);

/// Identifier of an object owned by the remote platform.
///
/// Remote identities are opaque strings (e.g. `gid://shop/Product/42`). They
/// double as natural keys when diffing desired against persisted collections.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a remote id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the remote id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RemoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_id_new_creates_unique_ids() {
        let id1 = PriceListId::new();
        let id2 = PriceListId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn local_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = ActorId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
        assert_eq!(Uuid::from(id), uuid);
    }

    #[test]
    fn local_id_serializes_as_bare_uuid() {
        let id = VariantId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn remote_id_displays_raw_value() {
        let id = RemoteId::from("gid://shop/Product/1");
        assert_eq!(id.to_string(), "gid://shop/Product/1");
        assert_eq!(id.as_str(), "gid://shop/Product/1");
    }
}
