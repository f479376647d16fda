//! The fulfillment engine: checkout orchestration, shipping allocation,
//! vendor fulfillment, refunds, payment webhooks, and tracking.
//!
//! A checkout splits one cart into per-vendor orders committed as a single
//! group, with inventory reservations taken as a unit of work. Fulfillment,
//! refunds and payment confirmation then act per vendor order, while the
//! group's aggregate status stays a derived view.

pub mod allocator;
pub mod error;
pub mod fulfillment;
pub mod orchestrator;
pub mod payments;
pub mod refund;
pub mod services;
pub mod tracking;

pub use allocator::{ItemDimensions, ServiceResolution, ShippingSelection, VendorQuotes};
pub use error::{CheckoutError, Result};
pub use fulfillment::{FulfillmentService, GroupFulfillmentView, ShipmentOutcome};
pub use orchestrator::{BuyerInfo, Cart, CartItem, CheckoutOrchestrator, CheckoutReceipt};
pub use payments::PaymentProcessor;
pub use refund::{RefundOutcome, RefundService};
pub use services::payment::{InMemoryPaymentGateway, PaymentEvent, PaymentGateway, PaymentIntent};
pub use services::rates::{InMemoryRateProvider, Label, Parcel, RateProvider, RateProviderError, RateQuote};
pub use tracking::{
    InMemoryNotificationSink, NotificationDecision, NotificationSink, TrackingDispatcher,
    TrackingView,
};
