//! Ledger Domain - Append-Only Credit Accounting
//!
//! This crate implements the credit ledger at the heart of the prepaid
//! credits system. Balances are never stored as mutable counters: a user's
//! balance is always the sum of signed transaction deltas, and every business
//! event that moves credits appends exactly one immutable transaction.
//!
//! # Invariants
//!
//! - Transactions are insert-only; nothing updates or deletes a posted row
//! - A `(user, idempotency_key, operation_code)` triple posts at most once;
//!   replays return the original transaction unchanged
//! - Credit deltas are strictly positive, debit deltas strictly negative
//! - Debits that would overdraw the spendable balance are rejected atomically
//!   at the store, leaving the ledger untouched
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{CreditService, NewTransaction};
//!
//! let outcome = credit_service
//!     .apply_credit(&user, 500, "purchase", "payment:PAY-1:success", meta)
//!     .await?;
//! assert!(outcome.applied); // false on replay, same transaction either way
//! ```

pub mod transaction;
pub mod wallet;
pub mod store;
pub mod service;
pub mod error;

pub use transaction::{CreditTransaction, NewTransaction, TxType};
pub use wallet::Wallet;
pub use store::{LedgerStore, WalletStore, LedgerInsert, DebitInsert, ReserveOutcome};
pub use service::{CreditService, WalletService, CreditOutcome, op_code, op_key};
pub use error::LedgerError;
