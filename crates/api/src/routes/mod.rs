//! HTTP route handlers.

pub mod checkouts;
pub mod groups;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod tracking;
pub mod webhooks;
