//! Shared in-memory state
//!
//! One [`MemoryState`] holds every table; every store adapter created by the
//! same [`MemoryBackend`] locks the same mutex. Holding one lock across a
//! whole store operation is what makes the "atomic store scope" the port
//! contracts demand actually atomic here.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use core_kernel::{PaymentId, RefundId, ReservationId, TxId, UserId, WebhookEventId};
use domain_ledger::{CreditTransaction, Wallet};
use domain_payments::{Payment, Provider, Refund, UsageReservation};
use domain_webhooks::StoredWebhookEvent;

use crate::ledger::{MemoryLedgerStore, MemoryWalletStore};
use crate::payments::{MemoryPaymentStore, MemoryRefundStore, MemoryReservationStore};
use crate::webhooks::MemoryWebhookEventStore;

/// All tables of the in-memory backend
#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    /// Append-only transaction log, oldest first
    pub transactions: Vec<CreditTransaction>,
    /// `(user, idempotency_key, operation_code)` -> index into `transactions`
    pub tx_by_key: HashMap<(UserId, String, String), TxId>,
    pub wallets: HashMap<UserId, Wallet>,

    pub payments: HashMap<PaymentId, Payment>,
    /// `(user, idempotency_key)` -> payment
    pub payment_by_key: HashMap<(UserId, String), PaymentId>,

    pub refunds: HashMap<RefundId, Refund>,
    /// `(payment, idempotency_key)` -> refund
    pub refund_by_key: HashMap<(PaymentId, String), RefundId>,

    pub reservations: HashMap<ReservationId, UsageReservation>,
    /// `(user, operation_code)` -> reservation
    pub reservation_by_key: HashMap<(UserId, String), ReservationId>,

    pub events: HashMap<WebhookEventId, StoredWebhookEvent>,
    /// `(provider, provider_event_id)` -> event
    pub event_by_key: HashMap<(Provider, String), WebhookEventId>,
}

impl MemoryState {
    /// Ledger balance: the sum of all deltas for the user
    pub fn balance(&self, user: &UserId) -> i64 {
        self.transactions
            .iter()
            .filter(|tx| &tx.user_id == user)
            .map(|tx| tx.credits_delta)
            .sum()
    }

    pub fn wallet_mut(&mut self, user: &UserId) -> &mut Wallet {
        self.wallets
            .entry(user.clone())
            .or_insert_with(|| Wallet::new(user.clone()))
    }
}

/// Factory handing out store adapters that share one state
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger_store(&self) -> MemoryLedgerStore {
        MemoryLedgerStore::new(self.state.clone())
    }

    pub fn wallet_store(&self) -> MemoryWalletStore {
        MemoryWalletStore::new(self.state.clone())
    }

    pub fn payment_store(&self) -> MemoryPaymentStore {
        MemoryPaymentStore::new(self.state.clone())
    }

    pub fn refund_store(&self) -> MemoryRefundStore {
        MemoryRefundStore::new(self.state.clone())
    }

    pub fn reservation_store(&self) -> MemoryReservationStore {
        MemoryReservationStore::new(self.state.clone())
    }

    pub fn event_store(&self) -> MemoryWebhookEventStore {
        MemoryWebhookEventStore::new(self.state.clone())
    }
}
