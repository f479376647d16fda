//! External service traits and their in-memory test doubles.

pub mod payment;
pub mod rates;

pub use payment::{InMemoryPaymentGateway, PaymentEvent, PaymentGateway, PaymentIntent, RefundConfirmation};
pub use rates::{
    InMemoryRateProvider, Label, Parcel, RateProvider, RateProviderError, RateQuote,
};
