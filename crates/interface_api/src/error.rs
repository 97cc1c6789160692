//! API error handling
//!
//! Response policy: signature failures are 401, malformed or mismatching
//! payloads 422, state conflicts 409, missing records 404. Business
//! rejections never surface as 5xx; only transient infrastructure failures
//! return 503 so callers (and webhook providers) retry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use core_kernel::PortError;
use domain_ledger::LedgerError;
use domain_payments::PaymentError;
use domain_reconciliation::ReconciliationError;
use domain_webhooks::WebhookError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            ApiError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg.clone())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

fn from_port(e: &PortError) -> ApiError {
    if e.is_transient() {
        ApiError::Unavailable(e.to_string())
    } else {
        ApiError::Internal(e.to_string())
    }
}

impl From<PortError> for ApiError {
    fn from(e: PortError) -> Self {
        from_port(&e)
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidAmount(msg) => ApiError::Validation(msg),
            LedgerError::InsufficientCredits { .. } => ApiError::Conflict(e.to_string()),
            LedgerError::WalletNotFound(_) => ApiError::NotFound(e.to_string()),
            LedgerError::Store(e) => from_port(&e),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::PaymentNotFound(_)
            | PaymentError::RefundNotFound(_)
            | PaymentError::ReservationNotFound(_) => ApiError::NotFound(e.to_string()),
            PaymentError::Validation(msg) => ApiError::Validation(msg),
            PaymentError::InvalidStatusTransition { .. }
            | PaymentError::ReservationExpired(_) => ApiError::Conflict(e.to_string()),
            PaymentError::Ledger(e) => e.into(),
            PaymentError::Provider(e) | PaymentError::Store(e) => from_port(&e),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(e: WebhookError) -> Self {
        if e.is_signature_failure() {
            return ApiError::Unauthorized(e.to_string());
        }
        match e {
            WebhookError::Malformed(msg) => ApiError::Validation(msg),
            WebhookError::Mismatch { .. } => ApiError::Validation(e.to_string()),
            WebhookError::Payment(e) => e.into(),
            WebhookError::Verification(e) | WebhookError::Store(e) => from_port(&e),
            // is_signature_failure covered these above
            WebhookError::MissingHeader(_) | WebhookError::InvalidSignature(_) => {
                ApiError::Unauthorized(e.to_string())
            }
        }
    }
}

impl From<ReconciliationError> for ApiError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::Store(e) => from_port(&e),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failures_map_to_unauthorized() {
        let err: ApiError = WebhookError::invalid_signature("bad mac").into();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        let err: ApiError = WebhookError::missing_header("stripe-signature").into();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn mismatch_maps_to_validation_not_5xx() {
        let err: ApiError = WebhookError::Mismatch {
            field: "amount",
            expected: "5000".to_string(),
            actual: "1000".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn insufficient_credits_maps_to_conflict() {
        let err: ApiError = LedgerError::InsufficientCredits {
            available: 10,
            requested: 40,
        }
        .into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn transient_store_errors_map_to_unavailable() {
        let err: ApiError = PortError::connection("store down").into();
        assert!(matches!(err, ApiError::Unavailable(_)));
        let err: ApiError = PortError::internal("bug").into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
