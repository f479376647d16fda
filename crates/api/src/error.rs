//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout engine error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    let status = match &err {
        CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::NotAllowed { .. } => StatusCode::FORBIDDEN,
        CheckoutError::ShippingUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::InsufficientStock { .. }
        | CheckoutError::PaymentNotConfirmed
        | CheckoutError::RefundQuantityExceeded { .. } => StatusCode::CONFLICT,
        CheckoutError::UnknownTrackingToken => StatusCode::NOT_FOUND,
        CheckoutError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        CheckoutError::Domain(DomainError::InvalidStateTransition { .. }) => StatusCode::CONFLICT,
        CheckoutError::Domain(DomainError::LineItemNotFound(_)) => StatusCode::NOT_FOUND,
        CheckoutError::Domain(_) => StatusCode::BAD_REQUEST,
        CheckoutError::Store(StoreError::OrderNotFound(_) | StoreError::GroupNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        CheckoutError::Store(_) | CheckoutError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(CheckoutError::from(err))
    }
}
