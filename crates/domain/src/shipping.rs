//! Per-vendor selected shipping rates.

use common::{Money, OrderId, VendorId};
use serde::{Deserialize, Serialize};

/// The shipping rate chosen for one vendor's shipment at checkout.
///
/// Created once when the order group is committed and immutable afterward,
/// except for the carrier-confirmed tracking fields added after the label is
/// purchased. The provider `rate_id` is persisted verbatim because quotes
/// expire and cannot be recomputed post-payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorShippingRate {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub carrier: String,
    pub service: String,
    pub price: Money,
    pub currency: String,
    /// Opaque capability token issued by the rate provider.
    pub rate_id: String,
    /// Tracking number confirmed by the carrier after label purchase.
    pub tracking_number: Option<String>,
    /// Label document location returned by the provider.
    pub label_url: Option<String>,
}

impl VendorShippingRate {
    /// Creates a rate selection as persisted at checkout time.
    pub fn new(
        order_id: OrderId,
        vendor_id: VendorId,
        carrier: impl Into<String>,
        service: impl Into<String>,
        price: Money,
        currency: impl Into<String>,
        rate_id: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            vendor_id,
            carrier: carrier.into(),
            service: service.into(),
            price,
            currency: currency.into(),
            rate_id: rate_id.into(),
            tracking_number: None,
            label_url: None,
        }
    }

    /// Records the carrier-confirmed tracking data after label purchase.
    pub fn confirm_label(&mut self, tracking_number: impl Into<String>, label_url: impl Into<String>) {
        self.tracking_number = Some(tracking_number.into());
        self.label_url = Some(label_url.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_confirmation() {
        let mut rate = VendorShippingRate::new(
            OrderId::new(),
            VendorId::new(),
            "UPS",
            "Ground",
            Money::from_cents(750),
            "USD",
            "rate_abc123",
        );
        assert!(rate.tracking_number.is_none());

        rate.confirm_label("1Z999", "https://labels.example/1Z999.pdf");
        assert_eq!(rate.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(rate.rate_id, "rate_abc123");
    }
}
