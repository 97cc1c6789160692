//! In-Memory Store Adapters
//!
//! Single-process implementations of every store port, backed by one shared
//! state behind a single async mutex. Because all stores of a
//! [`MemoryBackend`] lock the same state, cross-store operations that must
//! observe each other atomically (checked debits against reservation holds,
//! hold placement against the ledger balance) actually do.
//!
//! Intended for development, tests, and single-node deployments; a
//! database-backed crate slots in behind the same ports for anything else.

pub mod state;
pub mod ledger;
pub mod payments;
pub mod webhooks;

pub use state::MemoryBackend;
pub use ledger::{MemoryLedgerStore, MemoryWalletStore};
pub use payments::{MemoryPaymentStore, MemoryRefundStore, MemoryReservationStore};
pub use webhooks::MemoryWebhookEventStore;
