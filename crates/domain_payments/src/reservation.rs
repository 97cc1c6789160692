//! Usage reservations
//!
//! A reservation places a temporary hold on spendable credits so a long
//! running operation can be sure the credits are still there when it
//! finishes. The hold is released exactly once, whether the reservation is
//! consumed, cancelled, or expired.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use core_kernel::{ReservationId, UserId};

use crate::error::PaymentError;

/// Default time-to-live for a reservation
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::minutes(30);

/// Lifecycle status of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Active,
    Consumed,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn can_transition_to(&self, target: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, target),
            (Pending, Active)
                | (Pending, Consumed)
                | (Pending, Cancelled)
                | (Pending, Expired)
                | (Active, Consumed)
                | (Active, Cancelled)
                | (Active, Expired)
        )
    }

    /// Open reservations still hold credits
    pub fn is_open(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Active => "active",
            ReservationStatus::Consumed => "consumed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hold on spendable credits for one business operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReservation {
    pub id: ReservationId,
    pub user_id: UserId,
    pub credits_reserved: i64,
    /// Credits actually debited when the reservation was consumed
    pub credits_consumed: i64,
    pub status: ReservationStatus,
    /// Business operation code; doubles as the idempotency scope per user
    pub operation_code: String,
    pub expires_at: DateTime<Utc>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageReservation {
    pub fn new(
        user_id: UserId,
        credits_reserved: i64,
        operation_code: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self, PaymentError> {
        if credits_reserved <= 0 {
            return Err(PaymentError::Validation(format!(
                "credits_reserved must be positive, got {credits_reserved}"
            )));
        }
        let operation_code = operation_code.into();
        if operation_code.is_empty() {
            return Err(PaymentError::Validation(
                "operation_code must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: ReservationId::new_v7(),
            user_id,
            credits_reserved,
            credits_consumed: 0,
            status: ReservationStatus::Pending,
            operation_code,
            expires_at: now + ttl,
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn transition(&mut self, target: ReservationStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition_to(target) {
            return Err(PaymentError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// An open reservation whose deadline has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && now >= self.expires_at
    }
}
