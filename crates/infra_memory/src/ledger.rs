//! In-memory ledger and wallet stores
//!
//! The interesting contracts live here: idempotent insert-or-get on the
//! `(user, idempotency_key, operation_code)` triple, checked debits that
//! verify the spendable balance inside the lock, and reservation holds that
//! re-read the reserved counter inside the same lock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use core_kernel::{DomainPort, PortError, UserId};
use domain_ledger::{
    CreditTransaction, DebitInsert, LedgerInsert, LedgerStore, NewTransaction, ReserveOutcome,
    Wallet, WalletStore,
};

use crate::state::MemoryState;

/// In-memory implementation of [`LedgerStore`]
#[derive(Clone)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub(crate) fn new(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

/// Posts `tx` into `state`, assuming the caller already checked the
/// idempotency triple is free.
fn post(state: &mut MemoryState, tx: NewTransaction) -> CreditTransaction {
    let balance_after = state.balance(&tx.user_id) + tx.credits_delta;
    let posted = CreditTransaction {
        id: tx.id,
        user_id: tx.user_id.clone(),
        credits_delta: tx.credits_delta,
        balance_after,
        tx_type: tx.tx_type,
        operation_code: tx.operation_code.clone(),
        idempotency_key: tx.idempotency_key.clone(),
        payment_id: tx.payment_id,
        reservation_id: tx.reservation_id,
        metadata: tx.metadata,
        created_at: Utc::now(),
    };
    state.tx_by_key.insert(
        (tx.user_id, tx.idempotency_key, tx.operation_code),
        posted.id,
    );
    state.transactions.push(posted.clone());
    posted
}

fn find_by_triple<'a>(
    state: &'a MemoryState,
    user: &UserId,
    idempotency_key: &str,
    operation_code: &str,
) -> Option<&'a CreditTransaction> {
    let key = (
        user.clone(),
        idempotency_key.to_string(),
        operation_code.to_string(),
    );
    let id = state.tx_by_key.get(&key)?;
    state.transactions.iter().find(|tx| &tx.id == id)
}

impl DomainPort for MemoryLedgerStore {}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_or_get(&self, tx: NewTransaction) -> Result<LedgerInsert, PortError> {
        let mut state = self.state.lock().await;
        if let Some(existing) =
            find_by_triple(&state, &tx.user_id, &tx.idempotency_key, &tx.operation_code)
        {
            return Ok(LedgerInsert::Existing(existing.clone()));
        }
        Ok(LedgerInsert::Inserted(post(&mut state, tx)))
    }

    async fn insert_debit_checked(&self, tx: NewTransaction) -> Result<DebitInsert, PortError> {
        let mut state = self.state.lock().await;
        if let Some(existing) =
            find_by_triple(&state, &tx.user_id, &tx.idempotency_key, &tx.operation_code)
        {
            return Ok(DebitInsert::Existing(existing.clone()));
        }

        let requested = tx.credits_delta.abs();
        let balance = state.balance(&tx.user_id);
        let reserved = state
            .wallets
            .get(&tx.user_id)
            .map(|w| w.balance_reserved)
            .unwrap_or(0);
        let available = balance - reserved;
        if available < requested {
            return Ok(DebitInsert::InsufficientCredits {
                available,
                requested,
            });
        }

        Ok(DebitInsert::Inserted(post(&mut state, tx)))
    }

    async fn balance(&self, user: &UserId) -> Result<i64, PortError> {
        let state = self.state.lock().await;
        Ok(state.balance(user))
    }

    async fn find(
        &self,
        user: &UserId,
        idempotency_key: &str,
        operation_code: &str,
    ) -> Result<Option<CreditTransaction>, PortError> {
        let state = self.state.lock().await;
        Ok(find_by_triple(&state, user, idempotency_key, operation_code).cloned())
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<CreditTransaction>, PortError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|tx| &tx.user_id == user)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of [`WalletStore`]
#[derive(Clone)]
pub struct MemoryWalletStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryWalletStore {
    pub(crate) fn new(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

impl DomainPort for MemoryWalletStore {}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn get_or_create(&self, user: &UserId) -> Result<Wallet, PortError> {
        let mut state = self.state.lock().await;
        Ok(state.wallet_mut(user).clone())
    }

    async fn try_reserve(
        &self,
        user: &UserId,
        amount: i64,
        available_balance: i64,
    ) -> Result<ReserveOutcome, PortError> {
        let mut state = self.state.lock().await;
        let wallet = state.wallet_mut(user);
        let spendable = available_balance - wallet.balance_reserved;
        if spendable < amount {
            return Ok(ReserveOutcome::InsufficientCredits {
                available: spendable,
                requested: amount,
            });
        }
        wallet.balance_reserved += amount;
        wallet.updated_at = Utc::now();
        Ok(ReserveOutcome::Reserved(wallet.clone()))
    }

    async fn release(&self, user: &UserId, amount: i64) -> Result<Wallet, PortError> {
        let mut state = self.state.lock().await;
        let wallet = state.wallet_mut(user);
        wallet.balance_reserved = (wallet.balance_reserved - amount).max(0);
        wallet.updated_at = Utc::now();
        Ok(wallet.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn user() -> UserId {
        UserId::new("user-1")
    }

    #[tokio::test]
    async fn posting_updates_balance_and_snapshot() {
        let backend = MemoryBackend::new();
        let store = backend.ledger_store();

        let tx = NewTransaction::credit(user(), 100, "purchase", "k1").unwrap();
        let insert = store.insert_or_get(tx).await.unwrap();
        assert!(insert.was_inserted());
        assert_eq!(insert.transaction().balance_after, 100);
        assert_eq!(store.balance(&user()).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn replayed_triple_returns_existing_row() {
        let backend = MemoryBackend::new();
        let store = backend.ledger_store();

        let first = store
            .insert_or_get(NewTransaction::credit(user(), 100, "purchase", "k1").unwrap())
            .await
            .unwrap();
        let second = store
            .insert_or_get(NewTransaction::credit(user(), 100, "purchase", "k1").unwrap())
            .await
            .unwrap();

        assert!(!second.was_inserted());
        assert_eq!(second.transaction().id, first.transaction().id);
        assert_eq!(store.balance(&user()).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn same_key_different_operation_posts_separately() {
        let backend = MemoryBackend::new();
        let store = backend.ledger_store();

        store
            .insert_or_get(NewTransaction::credit(user(), 100, "purchase", "k").unwrap())
            .await
            .unwrap();
        store
            .insert_or_get(NewTransaction::credit(user(), 50, "welcome_credits", "k").unwrap())
            .await
            .unwrap();

        assert_eq!(store.balance(&user()).await.unwrap(), 150);
    }

    #[tokio::test]
    async fn checked_debit_rejects_overdraw() {
        let backend = MemoryBackend::new();
        let store = backend.ledger_store();

        store
            .insert_or_get(NewTransaction::credit(user(), 30, "purchase", "k1").unwrap())
            .await
            .unwrap();
        let debit = store
            .insert_debit_checked(NewTransaction::debit(user(), 50, "consume", "k2").unwrap())
            .await
            .unwrap();

        assert!(matches!(
            debit,
            DebitInsert::InsufficientCredits {
                available: 30,
                requested: 50
            }
        ));
        assert_eq!(store.balance(&user()).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn checked_debit_honors_reservation_holds() {
        let backend = MemoryBackend::new();
        let ledger = backend.ledger_store();
        let wallets = backend.wallet_store();

        ledger
            .insert_or_get(NewTransaction::credit(user(), 100, "purchase", "k1").unwrap())
            .await
            .unwrap();
        let outcome = wallets.try_reserve(&user(), 80, 100).await.unwrap();
        assert!(matches!(outcome, ReserveOutcome::Reserved(_)));

        let debit = ledger
            .insert_debit_checked(NewTransaction::debit(user(), 50, "consume", "k2").unwrap())
            .await
            .unwrap();
        assert!(matches!(
            debit,
            DebitInsert::InsufficientCredits {
                available: 20,
                requested: 50
            }
        ));
    }

    #[tokio::test]
    async fn unchecked_debit_may_go_negative() {
        let backend = MemoryBackend::new();
        let store = backend.ledger_store();

        let insert = store
            .insert_or_get(NewTransaction::debit(user(), 40, "refund_reversal", "r1").unwrap())
            .await
            .unwrap();
        assert!(insert.was_inserted());
        assert_eq!(store.balance(&user()).await.unwrap(), -40);
    }

    #[tokio::test]
    async fn reserve_respects_existing_holds() {
        let backend = MemoryBackend::new();
        let wallets = backend.wallet_store();

        assert!(matches!(
            wallets.try_reserve(&user(), 60, 100).await.unwrap(),
            ReserveOutcome::Reserved(_)
        ));
        assert!(matches!(
            wallets.try_reserve(&user(), 60, 100).await.unwrap(),
            ReserveOutcome::InsufficientCredits {
                available: 40,
                requested: 60
            }
        ));
    }

    #[tokio::test]
    async fn release_never_goes_below_zero() {
        let backend = MemoryBackend::new();
        let wallets = backend.wallet_store();

        wallets.try_reserve(&user(), 10, 100).await.unwrap();
        let wallet = wallets.release(&user(), 25).await.unwrap();
        assert_eq!(wallet.balance_reserved, 0);
    }
}
