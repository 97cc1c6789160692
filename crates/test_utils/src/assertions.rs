//! Custom Test Assertions
//!
//! Specialized assertion helpers for domain types that give more meaningful
//! error messages than standard assertions.

use domain_ledger::{CreditTransaction, Wallet};
use domain_payments::{Payment, PaymentStatus};

/// Asserts that a transaction history sums to the expected balance.
///
/// The ledger's core invariant: the balance is nothing but the sum of
/// deltas, in every state the system can reach.
pub fn assert_ledger_conserved(transactions: &[CreditTransaction], expected_balance: i64) {
    let sum: i64 = transactions.iter().map(|tx| tx.credits_delta).sum();
    assert_eq!(
        sum,
        expected_balance,
        "Ledger sum {} does not match expected balance {} over {} transactions",
        sum,
        expected_balance,
        transactions.len()
    );
}

/// Asserts that no two transactions share a `(key, operation)` pair
pub fn assert_no_duplicate_postings(transactions: &[CreditTransaction]) {
    let mut seen = std::collections::HashSet::new();
    for tx in transactions {
        let key = (
            tx.user_id.clone(),
            tx.idempotency_key.clone(),
            tx.operation_code.clone(),
        );
        assert!(
            seen.insert(key),
            "Duplicate posting for user={} key={} operation={}",
            tx.user_id,
            tx.idempotency_key,
            tx.operation_code
        );
    }
}

/// Asserts a payment's status with context on failure
pub fn assert_payment_status(payment: &Payment, expected: PaymentStatus) {
    assert_eq!(
        payment.status, expected,
        "Payment {} expected status {expected}, got {}",
        payment.id, payment.status
    );
}

/// Asserts that a wallet holds exactly `expected` reserved credits
pub fn assert_reserved(wallet: &Wallet, expected: i64) {
    assert_eq!(
        wallet.balance_reserved, expected,
        "Wallet for {} expected {} reserved credits, got {}",
        wallet.user_id, expected, wallet.balance_reserved
    );
}
