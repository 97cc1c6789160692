//! Wallet projection
//!
//! The wallet row holds only what cannot be derived from the ledger: the
//! amount of credits currently held by open reservations. Spendable balance
//! is `ledger balance - balance_reserved` and is computed on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::UserId;

/// Per-user wallet state, created lazily on first use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    /// Credits held by pending/active reservations
    pub balance_reserved: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance_reserved: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Spendable credits given the current ledger balance
    pub fn spendable(&self, ledger_balance: i64) -> i64 {
        ledger_balance - self.balance_reserved
    }
}
