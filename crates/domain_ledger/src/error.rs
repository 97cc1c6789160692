//! Ledger domain errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors from ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient credits: available {available}, requested {requested}")]
    InsufficientCredits { available: i64, requested: i64 },

    #[error("Wallet not found for user {0}")]
    WalletNotFound(String),

    #[error(transparent)]
    Store(#[from] PortError),
}

impl LedgerError {
    /// Returns true if the underlying cause is transient and retryable
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_transient())
    }
}
