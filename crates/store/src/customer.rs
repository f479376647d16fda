//! Vendor-scoped customer records.

use chrono::{DateTime, Utc};
use common::{BuyerId, CustomerId, VendorId};
use serde::{Deserialize, Serialize};

/// A customer record scoped to one vendor.
///
/// The same buyer checking out across three vendors holds three customer
/// records, one per vendor, so each vendor only ever sees its own customer
/// list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub vendor_id: VendorId,
    /// Authenticated identity, absent for guests.
    pub identity: Option<BuyerId>,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Creates a customer record stamped with the current time.
    pub fn new(
        vendor_id: VendorId,
        identity: Option<BuyerId>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: CustomerId::new(),
            vendor_id,
            identity,
            email: email.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
