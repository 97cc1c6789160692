//! Credit transactions
//!
//! A [`CreditTransaction`] is one immutable row in the append-only ledger.
//! The signed `credits_delta` carries the direction: positive for credits,
//! negative for debits. `balance_after` is a snapshot taken at posting time
//! for audit display; authoritative balances are always recomputed by
//! summing deltas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::{PaymentId, ReservationId, TxId, UserId};

use crate::error::LedgerError;

/// Direction of a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Credit,
    Debit,
}

/// An immutable, posted ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: TxId,
    pub user_id: UserId,
    /// Signed credit movement: positive for credits, negative for debits
    pub credits_delta: i64,
    /// Balance snapshot after this transaction was applied (informational)
    pub balance_after: i64,
    pub tx_type: TxType,
    /// Business operation this transaction belongs to (e.g. "purchase")
    pub operation_code: String,
    /// Caller-supplied key scoping idempotency within the operation
    pub idempotency_key: String,
    pub payment_id: Option<PaymentId>,
    pub reservation_id: Option<ReservationId>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Returns the absolute number of credits moved
    pub fn credits_abs(&self) -> i64 {
        self.credits_delta.abs()
    }
}

/// A transaction that has been validated but not yet posted.
///
/// Stores compute `balance_after` and assign the timestamp at insert time,
/// so neither appears here.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: TxId,
    pub user_id: UserId,
    pub credits_delta: i64,
    pub tx_type: TxType,
    pub operation_code: String,
    pub idempotency_key: String,
    pub payment_id: Option<PaymentId>,
    pub reservation_id: Option<ReservationId>,
    pub metadata: Value,
}

impl NewTransaction {
    /// Creates a credit posting of `amount` credits (must be positive)
    pub fn credit(
        user_id: UserId,
        amount: i64,
        operation_code: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            id: TxId::new_v7(),
            user_id,
            credits_delta: amount,
            tx_type: TxType::Credit,
            operation_code: operation_code.into(),
            idempotency_key: idempotency_key.into(),
            payment_id: None,
            reservation_id: None,
            metadata: Value::Null,
        })
    }

    /// Creates a debit posting of `amount` credits (must be positive;
    /// stored as a negative delta)
    pub fn debit(
        user_id: UserId,
        amount: i64,
        operation_code: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            id: TxId::new_v7(),
            user_id,
            credits_delta: -amount,
            tx_type: TxType::Debit,
            operation_code: operation_code.into(),
            idempotency_key: idempotency_key.into(),
            payment_id: None,
            reservation_id: None,
            metadata: Value::Null,
        })
    }

    pub fn with_payment(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = Some(payment_id);
        self
    }

    pub fn with_reservation(mut self, reservation_id: ReservationId) -> Self {
        self.reservation_id = Some(reservation_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1")
    }

    #[test]
    fn credit_requires_positive_amount() {
        assert!(NewTransaction::credit(user(), 0, "purchase", "k").is_err());
        assert!(NewTransaction::credit(user(), -5, "purchase", "k").is_err());

        let tx = NewTransaction::credit(user(), 100, "purchase", "k").unwrap();
        assert_eq!(tx.credits_delta, 100);
        assert_eq!(tx.tx_type, TxType::Credit);
    }

    #[test]
    fn debit_stores_negative_delta() {
        let tx = NewTransaction::debit(user(), 40, "consume", "op:consume").unwrap();
        assert_eq!(tx.credits_delta, -40);
        assert_eq!(tx.tx_type, TxType::Debit);
    }

    #[test]
    fn debit_rejects_non_positive_amount() {
        assert!(NewTransaction::debit(user(), 0, "consume", "k").is_err());
    }
}
