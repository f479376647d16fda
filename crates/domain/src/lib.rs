//! Domain model for the multi-vendor fulfillment engine.
//!
//! One customer checkout produces one [`Order`] per vendor, linked by a
//! shared [`common::OrderGroupId`]. Each order carries its own payment and
//! fulfillment state; the aggregate (master) fulfillment status is derived
//! with [`aggregate_fulfillment`] on every read and never stored.

pub mod error;
pub mod fulfillment;
pub mod order;
pub mod payment;
pub mod refund;
pub mod shipping;
pub mod status;

pub use error::DomainError;
pub use fulfillment::{Fulfillment, FulfillmentLine, aggregate_fulfillment};
pub use order::{NewOrder, Order, OrderLineItem};
pub use payment::PaymentRecord;
pub use refund::{RefundKind, RefundLine, RefundRecord};
pub use shipping::VendorShippingRate;
pub use status::{FulfillmentStatus, OrderStatus, PaymentStatus};
