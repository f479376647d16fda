//! Shipping rate allocation across vendor groups.
//!
//! Each vendor ships its own parcel, but the buyer picks one service level for
//! the whole checkout. The allocator folds every vendor group's items into a
//! single parcel envelope, quotes each vendor once, and intersects the offered
//! service names into the global options. The displayed shipping total is the
//! sum of the per-vendor prices for the chosen service.

use std::collections::HashMap;

use common::{Money, VendorId};
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::services::rates::{Parcel, RateQuote};

/// Provider minimum parcel dimension in millimeters.
const MIN_DIMENSION_MM: u32 = 10;
/// Provider minimum parcel weight in grams.
const MIN_WEIGHT_G: u32 = 1;

/// Physical dimensions of one listing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDimensions {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub weight_g: u32,
}

/// How the per-vendor rates were chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceResolution {
    /// Every quoted vendor offers this service; each ships with it.
    Exact(String),
    /// No service is offered by every vendor; each vendor ships with its own
    /// cheapest rate. Explicit policy, surfaced to the caller.
    CheapestFallback,
}

/// The quotes returned for one vendor's parcel.
#[derive(Debug, Clone)]
pub struct VendorQuotes {
    pub vendor_id: VendorId,
    pub quotes: Vec<RateQuote>,
}

/// The chosen rate per vendor plus the total the buyer sees.
#[derive(Debug, Clone)]
pub struct ShippingSelection {
    pub resolution: ServiceResolution,
    pub rates: Vec<(VendorId, RateQuote)>,
    pub total: Money,
}

/// Folds a vendor group's items into one parcel envelope.
///
/// Items sit side by side in the length/width plane and stack in height:
/// length and width take the maximum across items, height and weight sum over
/// quantity. Degenerate zero dimensions clamp to the provider minimums.
/// Returns `None` for an empty group.
pub fn parcel_envelope(items: &[(ItemDimensions, u32)]) -> Option<Parcel> {
    if items.is_empty() {
        return None;
    }

    let mut length = 0u32;
    let mut width = 0u32;
    let mut height = 0u32;
    let mut weight = 0u32;
    for (dims, quantity) in items {
        length = length.max(dims.length_mm);
        width = width.max(dims.width_mm);
        height += dims.height_mm * quantity;
        weight += dims.weight_g * quantity;
    }

    Some(Parcel {
        length_mm: length.max(MIN_DIMENSION_MM),
        width_mm: width.max(MIN_DIMENSION_MM),
        height_mm: height.max(MIN_DIMENSION_MM),
        weight_g: weight.max(MIN_WEIGHT_G),
    })
}

/// Returns the service names offered by every quoted vendor, sorted.
pub fn global_services(quoted: &[VendorQuotes]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for vendor in quoted {
        let mut seen: Vec<&str> = Vec::new();
        for quote in &vendor.quotes {
            if !seen.contains(&quote.service.as_str()) {
                seen.push(&quote.service);
                *counts.entry(&quote.service).or_insert(0) += 1;
            }
        }
    }
    let mut services: Vec<String> = counts
        .into_iter()
        .filter(|(_, n)| *n == quoted.len())
        .map(|(s, _)| s.to_string())
        .collect();
    services.sort();
    services
}

/// Picks one rate per vendor for the requested service.
///
/// With a non-empty intersection, the requested service must be in it (or is
/// chosen as the cheapest common service when unspecified). With an empty
/// intersection no single service can cover the checkout, so each vendor falls
/// back to its cheapest rate.
pub fn select_rates(
    quoted: &[VendorQuotes],
    requested: Option<&str>,
) -> Result<ShippingSelection> {
    for vendor in quoted {
        if vendor.quotes.is_empty() {
            return Err(CheckoutError::Validation(format!(
                "No shipping rates quoted for vendor {}",
                vendor.vendor_id
            )));
        }
    }
    if quoted.is_empty() {
        return Ok(ShippingSelection {
            resolution: ServiceResolution::CheapestFallback,
            rates: Vec::new(),
            total: Money::zero(),
        });
    }

    let common = global_services(quoted);
    if common.is_empty() {
        let rates: Vec<(VendorId, RateQuote)> = quoted
            .iter()
            .filter_map(|vendor| {
                vendor
                    .quotes
                    .iter()
                    .min_by_key(|q| q.price)
                    .map(|q| (vendor.vendor_id, q.clone()))
            })
            .collect();
        let total = rates.iter().map(|(_, q)| q.price).sum();
        return Ok(ShippingSelection {
            resolution: ServiceResolution::CheapestFallback,
            rates,
            total,
        });
    }

    let service = match requested {
        Some(service) if common.iter().any(|s| s == service) => service.to_string(),
        Some(service) => {
            return Err(CheckoutError::Validation(format!(
                "Service {service} is not offered by every vendor; options: {common:?}"
            )));
        }
        None => common
            .iter()
            .min_by_key(|service| service_total(quoted, service))
            .cloned()
            .ok_or_else(|| CheckoutError::Validation("No common service".to_string()))?,
    };

    let rates: Vec<(VendorId, RateQuote)> = quoted
        .iter()
        .map(|vendor| {
            let quote = vendor
                .quotes
                .iter()
                .filter(|q| q.service == service)
                .min_by_key(|q| q.price)
                .ok_or_else(|| {
                    CheckoutError::Validation(format!(
                        "Vendor {} does not offer {service}",
                        vendor.vendor_id
                    ))
                })?;
            Ok((vendor.vendor_id, quote.clone()))
        })
        .collect::<Result<_>>()?;
    let total = rates.iter().map(|(_, q)| q.price).sum();

    Ok(ShippingSelection {
        resolution: ServiceResolution::Exact(service),
        rates,
        total,
    })
}

fn service_total(quoted: &[VendorQuotes], service: &str) -> Money {
    quoted
        .iter()
        .filter_map(|vendor| {
            vendor
                .quotes
                .iter()
                .filter(|q| q.service == service)
                .map(|q| q.price)
                .min()
        })
        .sum()
}
