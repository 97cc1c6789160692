//! Payments domain errors

use thiserror::Error;

use core_kernel::PortError;
use domain_ledger::LedgerError;

/// Errors from payment, refund, and reservation operations
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Refund not found: {0}")]
    RefundNotFound(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Reservation expired: {0}")]
    ReservationExpired(String),

    #[error("Provider error: {0}")]
    Provider(#[source] PortError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] PortError),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }

    /// Returns true if the underlying cause is transient and retryable
    pub fn is_transient(&self) -> bool {
        match self {
            PaymentError::Provider(e) | PaymentError::Store(e) => e.is_transient(),
            PaymentError::Ledger(e) => e.is_transient(),
            _ => false,
        }
    }
}
