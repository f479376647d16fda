//! Shipping rate provider trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Address, Money, VendorId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical parcel for one vendor's shipment, in millimeters and grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub weight_g: u32,
}

/// One shipping option quoted by the provider.
///
/// `rate_id` is an opaque, expiring capability token; purchase must present it
/// verbatim, it is never reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateQuote {
    pub carrier: String,
    pub service: String,
    pub price: Money,
    pub currency: String,
    pub rate_id: String,
}

/// A purchased shipping label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub tracking_number: String,
    pub label_url: String,
}

/// Rate provider failures.
///
/// `RateExpired` is distinguished from transient unavailability because the
/// caller's recovery differs: an expired token is re-quoted, a transient
/// failure is retried as-is.
#[derive(Debug, Error)]
pub enum RateProviderError {
    /// The rate token is past its validity window.
    #[error("Rate has expired: {0}")]
    RateExpired(String),

    /// The rate token was never issued.
    #[error("Unknown rate: {0}")]
    UnknownRate(String),

    /// The provider could not be reached or errored; retryable.
    #[error("Rate provider unavailable: {0}")]
    Unavailable(String),
}

impl From<RateProviderError> for crate::error::CheckoutError {
    fn from(err: RateProviderError) -> Self {
        Self::ExternalService(err.to_string())
    }
}

/// Trait for carrier rate-shopping operations.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Quotes the available services for one vendor parcel.
    async fn quote_rates(
        &self,
        vendor_id: VendorId,
        destination: &Address,
        parcel: &Parcel,
    ) -> Result<Vec<RateQuote>, RateProviderError>;

    /// Issues a fresh quote for the same carrier and service as a stale token.
    async fn requote(&self, rate_id: &str) -> Result<RateQuote, RateProviderError>;

    /// Buys the label for a quoted rate.
    async fn purchase_label(&self, rate_id: &str) -> Result<Label, RateProviderError>;
}

#[derive(Debug, Clone)]
struct IssuedQuote {
    vendor_id: VendorId,
    carrier: String,
    service: String,
    price: Money,
    expired: bool,
}

#[derive(Debug, Default)]
struct InMemoryRateState {
    /// (carrier, service, current price) offered per vendor origin.
    offerings: HashMap<VendorId, Vec<(String, String, Money)>>,
    issued: HashMap<String, IssuedQuote>,
    next_rate: u32,
    next_label: u32,
    fail_on_quote: bool,
}

/// In-memory rate provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRateProvider {
    state: Arc<RwLock<InMemoryRateState>>,
}

impl InMemoryRateProvider {
    /// Creates a new in-memory rate provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a carrier/service offering for a vendor origin.
    pub fn add_offering(
        &self,
        vendor_id: VendorId,
        carrier: impl Into<String>,
        service: impl Into<String>,
        price: Money,
    ) {
        self.state
            .write()
            .unwrap()
            .offerings
            .entry(vendor_id)
            .or_default()
            .push((carrier.into(), service.into(), price));
    }

    /// Changes the current price of an existing offering.
    pub fn set_price(&self, vendor_id: VendorId, service: &str, price: Money) {
        let mut state = self.state.write().unwrap();
        if let Some(offerings) = state.offerings.get_mut(&vendor_id) {
            for (_, svc, p) in offerings.iter_mut() {
                if svc == service {
                    *p = price;
                }
            }
        }
    }

    /// Marks every issued rate token expired.
    pub fn expire_all(&self) {
        let mut state = self.state.write().unwrap();
        for quote in state.issued.values_mut() {
            quote.expired = true;
        }
    }

    /// Configures the provider to fail quote calls.
    pub fn set_fail_on_quote(&self, fail: bool) {
        self.state.write().unwrap().fail_on_quote = fail;
    }

    /// Returns the number of rate tokens issued so far.
    pub fn issued_count(&self) -> usize {
        self.state.read().unwrap().issued.len()
    }
}

#[async_trait]
impl RateProvider for InMemoryRateProvider {
    async fn quote_rates(
        &self,
        vendor_id: VendorId,
        _destination: &Address,
        _parcel: &Parcel,
    ) -> Result<Vec<RateQuote>, RateProviderError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_quote {
            return Err(RateProviderError::Unavailable(
                "quote request failed".to_string(),
            ));
        }

        let offerings = state
            .offerings
            .get(&vendor_id)
            .cloned()
            .unwrap_or_default();

        let mut quotes = Vec::with_capacity(offerings.len());
        for (carrier, service, price) in offerings {
            state.next_rate += 1;
            let rate_id = format!("rate_{:04}", state.next_rate);
            state.issued.insert(
                rate_id.clone(),
                IssuedQuote {
                    vendor_id,
                    carrier: carrier.clone(),
                    service: service.clone(),
                    price,
                    expired: false,
                },
            );
            quotes.push(RateQuote {
                carrier,
                service,
                price,
                currency: "USD".to_string(),
                rate_id,
            });
        }
        Ok(quotes)
    }

    async fn requote(&self, rate_id: &str) -> Result<RateQuote, RateProviderError> {
        let mut state = self.state.write().unwrap();

        let stale = state
            .issued
            .get(rate_id)
            .cloned()
            .ok_or_else(|| RateProviderError::UnknownRate(rate_id.to_string()))?;

        // Current price for the same carrier/service, falling back to the
        // stale price if the offering was since withdrawn.
        let price = state
            .offerings
            .get(&stale.vendor_id)
            .and_then(|offerings| {
                offerings
                    .iter()
                    .find(|(c, s, _)| *c == stale.carrier && *s == stale.service)
                    .map(|(_, _, p)| *p)
            })
            .unwrap_or(stale.price);

        state.next_rate += 1;
        let fresh_id = format!("rate_{:04}", state.next_rate);
        state.issued.insert(
            fresh_id.clone(),
            IssuedQuote {
                vendor_id: stale.vendor_id,
                carrier: stale.carrier.clone(),
                service: stale.service.clone(),
                price,
                expired: false,
            },
        );

        Ok(RateQuote {
            carrier: stale.carrier,
            service: stale.service,
            price,
            currency: "USD".to_string(),
            rate_id: fresh_id,
        })
    }

    async fn purchase_label(&self, rate_id: &str) -> Result<Label, RateProviderError> {
        let mut state = self.state.write().unwrap();

        let quote = state
            .issued
            .get(rate_id)
            .cloned()
            .ok_or_else(|| RateProviderError::UnknownRate(rate_id.to_string()))?;
        if quote.expired {
            return Err(RateProviderError::RateExpired(rate_id.to_string()));
        }

        state.next_label += 1;
        let tracking_number = format!("TRACK{:06}", state.next_label);
        Ok(Label {
            label_url: format!("https://labels.example/{tracking_number}.pdf"),
            tracking_number,
        })
    }
}
