//! Order group persistence.
//!
//! The store is the transactional boundary for everything the checkout
//! writes: all per-vendor orders of one checkout are inserted in a single
//! atomic step, every order mutation runs as a guarded read-modify-write
//! under the store's lock, and payment webhook events are applied to the
//! whole group exactly once, keyed on the provider's event key.

pub mod customer;
pub mod error;
pub mod memory;
pub mod store;

pub use customer::Customer;
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use store::{OrderStore, PaymentApplication, ShipmentApplication, UpdateFn};
