//! Ledger domain services
//!
//! `CreditService` wraps the transaction log with the business-level credit
//! movements (purchase grants, consumption debits, refund reversals, welcome
//! grants). `WalletService` manages reservation holds on top of it.
//!
//! Both are injected with their store ports at construction; they hold no
//! state of their own and are cheap to clone behind `Arc`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use core_kernel::{PaymentId, RefundId, ReservationId, UserId};

use crate::error::LedgerError;
use crate::store::{DebitInsert, LedgerStore, ReserveOutcome, WalletStore};
use crate::transaction::{CreditTransaction, NewTransaction};
use crate::wallet::Wallet;

/// Well-known operation codes
pub mod op_code {
    pub const PURCHASE: &str = "purchase";
    pub const CONSUME: &str = "consume";
    pub const REFUND_REVERSAL: &str = "refund_reversal";
    pub const WELCOME: &str = "welcome_credits";
}

/// Canonical idempotency keys for ledger postings
pub mod op_key {
    use core_kernel::{PaymentId, RefundId};

    /// Key for the single credit grant of a successful payment
    pub fn payment_success(payment_id: &PaymentId) -> String {
        format!("payment:{payment_id}:success")
    }

    /// Key for the single reversal debit of a refund
    pub fn refund_reverse(refund_id: &RefundId) -> String {
        format!("refund:{refund_id}:reverse")
    }

    /// Key for consuming a reservation, scoped by its operation code
    pub fn reservation_consume(operation_code: &str) -> String {
        format!("{operation_code}:consume")
    }
}

/// Result of a credit/debit posting attempt
#[derive(Debug, Clone)]
pub struct CreditOutcome {
    pub transaction: CreditTransaction,
    /// False when the posting was a replay of an existing transaction
    pub applied: bool,
}

/// Service for posting credit movements to the ledger
#[derive(Clone)]
pub struct CreditService {
    store: Arc<dyn LedgerStore>,
}

impl CreditService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Grants `amount` credits to the user, idempotent by
    /// `(user, idempotency_key, operation_code)`.
    pub async fn apply_credit(
        &self,
        user: &UserId,
        amount: i64,
        operation_code: &str,
        idempotency_key: &str,
        payment_id: Option<PaymentId>,
        metadata: Value,
    ) -> Result<CreditOutcome, LedgerError> {
        let mut tx = NewTransaction::credit(
            user.clone(),
            amount,
            operation_code,
            idempotency_key,
        )?
        .with_metadata(metadata);
        if let Some(payment_id) = payment_id {
            tx = tx.with_payment(payment_id);
        }

        let insert = self.store.insert_or_get(tx).await?;
        let applied = insert.was_inserted();
        let transaction = insert.into_transaction();
        if applied {
            info!(
                user = %user,
                credits = amount,
                operation = operation_code,
                key = idempotency_key,
                "Credits granted"
            );
        } else {
            debug!(
                user = %user,
                key = idempotency_key,
                "Credit grant replayed, returning existing transaction"
            );
        }
        Ok(CreditOutcome { transaction, applied })
    }

    /// Debits `amount` credits with an atomic spendable-balance check.
    pub async fn debit_checked(
        &self,
        user: &UserId,
        amount: i64,
        operation_code: &str,
        idempotency_key: &str,
        reservation_id: Option<ReservationId>,
        metadata: Value,
    ) -> Result<CreditOutcome, LedgerError> {
        let mut tx = NewTransaction::debit(
            user.clone(),
            amount,
            operation_code,
            idempotency_key,
        )?
        .with_metadata(metadata);
        if let Some(reservation_id) = reservation_id {
            tx = tx.with_reservation(reservation_id);
        }

        match self.store.insert_debit_checked(tx).await? {
            DebitInsert::Inserted(transaction) => {
                info!(
                    user = %user,
                    credits = amount,
                    operation = operation_code,
                    "Credits debited"
                );
                Ok(CreditOutcome { transaction, applied: true })
            }
            DebitInsert::Existing(transaction) => {
                Ok(CreditOutcome { transaction, applied: false })
            }
            DebitInsert::InsufficientCredits { available, requested } => {
                Err(LedgerError::InsufficientCredits { available, requested })
            }
        }
    }

    /// Claws back credits previously granted for a refunded payment.
    ///
    /// Reversals post without a balance check: if the user already spent the
    /// credits, the balance is allowed to go negative rather than blocking
    /// the refund. Idempotent by the refund's reversal key.
    pub async fn reverse_credit(
        &self,
        user: &UserId,
        amount: i64,
        refund_id: &RefundId,
        metadata: Value,
    ) -> Result<CreditOutcome, LedgerError> {
        let tx = NewTransaction::debit(
            user.clone(),
            amount,
            op_code::REFUND_REVERSAL,
            op_key::refund_reverse(refund_id),
        )?
        .with_metadata(metadata);

        let insert = self.store.insert_or_get(tx).await?;
        let applied = insert.was_inserted();
        if applied {
            info!(user = %user, credits = amount, refund = %refund_id, "Credits reversed");
        }
        Ok(CreditOutcome {
            transaction: insert.into_transaction(),
            applied,
        })
    }

    /// One-shot welcome grant for a new user. Safe to call repeatedly.
    pub async fn grant_welcome_credits(
        &self,
        user: &UserId,
        amount: i64,
    ) -> Result<CreditOutcome, LedgerError> {
        self.apply_credit(
            user,
            amount,
            op_code::WELCOME,
            op_code::WELCOME,
            None,
            Value::Null,
        )
        .await
    }

    /// Current balance: the sum of all deltas
    pub async fn balance(&self, user: &UserId) -> Result<i64, LedgerError> {
        Ok(self.store.balance(user).await?)
    }

    /// Transaction history, oldest first
    pub async fn history(&self, user: &UserId) -> Result<Vec<CreditTransaction>, LedgerError> {
        Ok(self.store.list_for_user(user).await?)
    }
}

/// Service for reservation holds against the wallet
#[derive(Clone)]
pub struct WalletService {
    wallet_store: Arc<dyn WalletStore>,
    ledger_store: Arc<dyn LedgerStore>,
}

impl WalletService {
    pub fn new(wallet_store: Arc<dyn WalletStore>, ledger_store: Arc<dyn LedgerStore>) -> Self {
        Self {
            wallet_store,
            ledger_store,
        }
    }

    pub async fn get_or_create(&self, user: &UserId) -> Result<Wallet, LedgerError> {
        Ok(self.wallet_store.get_or_create(user).await?)
    }

    /// Ledger balance minus credits held by open reservations
    pub async fn spendable_balance(&self, user: &UserId) -> Result<i64, LedgerError> {
        let balance = self.ledger_store.balance(user).await?;
        let wallet = self.wallet_store.get_or_create(user).await?;
        Ok(wallet.spendable(balance))
    }

    /// Places a hold of `amount` credits if the spendable balance covers it
    pub async fn reserve(&self, user: &UserId, amount: i64) -> Result<Wallet, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "reserve amount must be positive, got {amount}"
            )));
        }
        let balance = self.ledger_store.balance(user).await?;
        match self.wallet_store.try_reserve(user, amount, balance).await? {
            ReserveOutcome::Reserved(wallet) => {
                debug!(user = %user, credits = amount, "Credits reserved");
                Ok(wallet)
            }
            ReserveOutcome::InsufficientCredits { available, requested } => {
                Err(LedgerError::InsufficientCredits { available, requested })
            }
        }
    }

    /// Releases a hold of `amount` credits
    pub async fn release(&self, user: &UserId, amount: i64) -> Result<Wallet, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "release amount must be positive, got {amount}"
            )));
        }
        Ok(self.wallet_store.release(user, amount).await?)
    }
}
