//! Webhook domain errors
//!
//! The split matters at the HTTP boundary: signature failures map to 401,
//! malformed payloads to 422, mismatches to 422, and only transient
//! infrastructure failures are allowed to surface as 5xx so the provider
//! retries.

use thiserror::Error;

use core_kernel::PortError;
use domain_payments::PaymentError;

/// Errors from webhook verification and dispatch
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Webhook {field} mismatch: expected {expected}, got {actual}")]
    Mismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// The remote verification service could not give a verdict
    #[error("Verification service error: {0}")]
    Verification(#[source] PortError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] PortError),
}

impl WebhookError {
    pub fn missing_header(name: &str) -> Self {
        WebhookError::MissingHeader(name.to_string())
    }

    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        WebhookError::InvalidSignature(reason.into())
    }

    /// Signature-class failures (401 at the HTTP boundary)
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingHeader(_) | WebhookError::InvalidSignature(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        match self {
            WebhookError::Verification(e) | WebhookError::Store(e) => e.is_transient(),
            WebhookError::Payment(e) => e.is_transient(),
            _ => false,
        }
    }
}
