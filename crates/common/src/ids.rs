//! Identifier newtypes.
//!
//! Each identifier wraps a UUID to prevent mixing up, say, an order ID with
//! the order group it belongs to. All of them share the same surface, so the
//! impls are generated by a local macro.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! declare_uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

declare_uuid_id! {
    /// Unique identifier for a per-vendor order.
    OrderId
}

declare_uuid_id! {
    /// Identifier shared by every per-vendor order created from one checkout.
    OrderGroupId
}

declare_uuid_id! {
    /// Unique identifier for a vendor (independent seller).
    VendorId
}

declare_uuid_id! {
    /// Identifier of the authenticated buyer, supplied by the identity provider.
    BuyerId
}

declare_uuid_id! {
    /// Unique identifier for a vendor-scoped customer record.
    CustomerId
}

declare_uuid_id! {
    /// Unique identifier for an order line item.
    LineItemId
}

/// Stock-keeping unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Creates a new SKU from a string.
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    /// Returns the SKU as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Sku {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
