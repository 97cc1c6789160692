//! Ledger store ports
//!
//! Store implementations own the atomicity the domain relies on. Idempotent
//! posting is expressed as insert-or-retrieve: the store enforces the unique
//! `(user, idempotency_key, operation_code)` constraint and hands back the
//! existing row instead of failing, so concurrent duplicates collapse to one
//! posted transaction. Checked debits verify the spendable balance and insert
//! within a single atomic scope.

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError, UserId};

use crate::transaction::{CreditTransaction, NewTransaction};
use crate::wallet::Wallet;

/// Result of an idempotent insert
#[derive(Debug, Clone)]
pub enum LedgerInsert {
    /// The transaction was posted by this call
    Inserted(CreditTransaction),
    /// A transaction with the same idempotency triple already existed
    Existing(CreditTransaction),
}

impl LedgerInsert {
    pub fn transaction(&self) -> &CreditTransaction {
        match self {
            LedgerInsert::Inserted(tx) | LedgerInsert::Existing(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> CreditTransaction {
        match self {
            LedgerInsert::Inserted(tx) | LedgerInsert::Existing(tx) => tx,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, LedgerInsert::Inserted(_))
    }
}

/// Result of a balance-checked debit insert
#[derive(Debug, Clone)]
pub enum DebitInsert {
    Inserted(CreditTransaction),
    Existing(CreditTransaction),
    /// The debit would overdraw the spendable balance; nothing was posted
    InsufficientCredits { available: i64, requested: i64 },
}

/// Result of an atomic reservation hold attempt
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    Reserved(Wallet),
    /// Spendable balance below the requested hold; wallet unchanged
    InsufficientCredits { available: i64, requested: i64 },
}

/// Port for the append-only transaction log
#[async_trait]
pub trait LedgerStore: DomainPort {
    /// Posts a transaction, or returns the existing one when the
    /// `(user, idempotency_key, operation_code)` triple has already posted.
    async fn insert_or_get(&self, tx: NewTransaction) -> Result<LedgerInsert, PortError>;

    /// Posts a debit only if the user's spendable balance covers it.
    ///
    /// The balance check, reservation holds, and the insert happen within one
    /// atomic store scope. Replays of an already-posted debit return
    /// `Existing` without re-checking the balance.
    async fn insert_debit_checked(&self, tx: NewTransaction) -> Result<DebitInsert, PortError>;

    /// Sum of all deltas for the user
    async fn balance(&self, user: &UserId) -> Result<i64, PortError>;

    /// Looks up a posted transaction by its idempotency triple
    async fn find(
        &self,
        user: &UserId,
        idempotency_key: &str,
        operation_code: &str,
    ) -> Result<Option<CreditTransaction>, PortError>;

    /// All transactions for the user, oldest first
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<CreditTransaction>, PortError>;
}

/// Port for the wallet projection (reservation holds)
#[async_trait]
pub trait WalletStore: DomainPort {
    /// Fetches the user's wallet, creating it on first use
    async fn get_or_create(&self, user: &UserId) -> Result<Wallet, PortError>;

    /// Atomically places a hold of `amount` credits if
    /// `available_balance - balance_reserved >= amount`.
    ///
    /// `available_balance` is the ledger balance read by the caller; the
    /// reserved counter is re-read inside the store's atomic scope so
    /// concurrent holds cannot both succeed against the same headroom.
    async fn try_reserve(
        &self,
        user: &UserId,
        amount: i64,
        available_balance: i64,
    ) -> Result<ReserveOutcome, PortError>;

    /// Releases a hold of `amount` credits. The reserved counter never goes
    /// below zero.
    async fn release(&self, user: &UserId, amount: i64) -> Result<Wallet, PortError>;
}
