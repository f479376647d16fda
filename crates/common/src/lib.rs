//! Shared types for the multi-vendor fulfillment engine.
//!
//! Everything here is deliberately dependency-light: identifier newtypes,
//! fixed-point money with exact proportional allocation, and address
//! snapshots shared by every other crate in the workspace.

pub mod address;
pub mod ids;
pub mod money;

pub use address::{Address, CountryCode};
pub use ids::{BuyerId, CustomerId, LineItemId, OrderGroupId, OrderId, Sku, VendorId};
pub use money::Money;
