//! Payment aggregate and status machine
//!
//! A payment represents one checkout attempt with an external provider.
//! The machine is strictly forward-moving:
//!
//! ```text
//! Created ──> Pending ──> Succeeded ──> Refunded
//!    │           │
//!    │           ├──> Failed
//!    │           └──> Cancelled
//!    └──> Succeeded | Failed | Cancelled
//! ```
//!
//! Failed, Cancelled, and Refunded are terminal. Succeeded may only move to
//! Refunded, and only once every purchased credit has been reversed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Currency, PaymentId, UserId};

use crate::error::PaymentError;

/// Supported payment providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    PayPal,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::PayPal => "paypal",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stripe" => Ok(Provider::Stripe),
            "paypal" => Ok(Provider::PayPal),
            other => Err(PaymentError::Validation(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Pending,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Returns true if this status can transition to the target status
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Created, Pending)
                | (Created, Succeeded)
                | (Created, Failed)
                | (Created, Cancelled)
                | (Pending, Succeeded)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Succeeded, Refunded)
        )
    }

    /// Returns true once the payment will never change on its own.
    ///
    /// Succeeded counts as final for status polling even though a later
    /// refund may still move it to Refunded.
    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Created | PaymentStatus::Pending)
    }

    /// Terminal statuses have no outgoing transitions at all
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment record tied to a provider checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub provider: Provider,
    pub status: PaymentStatus,
    /// Charged amount in minor units (cents)
    pub amount_cents: i64,
    pub currency: Currency,
    /// Credits granted to the wallet when the payment succeeds
    pub credits_purchased: i64,
    /// Provider-side payment/capture identifier, unique per provider
    pub provider_payment_id: Option<String>,
    /// Provider-side checkout session identifier
    pub provider_session_id: Option<String>,
    /// Caller-supplied key making checkout creation idempotent per user
    pub idempotency_key: String,
    pub metadata: Value,
    /// Set when a verified webhook first confirmed this payment
    pub webhook_verified_at: Option<DateTime<Utc>>,
    pub succeeded_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        user_id: UserId,
        provider: Provider,
        amount_cents: i64,
        currency: Currency,
        credits_purchased: i64,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        if amount_cents <= 0 {
            return Err(PaymentError::Validation(format!(
                "amount_cents must be positive, got {amount_cents}"
            )));
        }
        if credits_purchased <= 0 {
            return Err(PaymentError::Validation(format!(
                "credits_purchased must be positive, got {credits_purchased}"
            )));
        }
        let idempotency_key = idempotency_key.into();
        if idempotency_key.is_empty() {
            return Err(PaymentError::Validation(
                "idempotency_key must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new_v7(),
            user_id,
            provider,
            status: PaymentStatus::Created,
            amount_cents,
            currency,
            credits_purchased,
            provider_payment_id: None,
            provider_session_id: None,
            idempotency_key,
            metadata: json!({}),
            webhook_verified_at: None,
            succeeded_at: None,
            failed_at: None,
            cancelled_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the payment to `target`, stamping the matching timestamp.
    ///
    /// Returns an error for illegal transitions; transitions to the current
    /// status are rejected the same way (callers handle replay explicitly).
    pub fn transition(&mut self, target: PaymentStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition_to(target) {
            return Err(PaymentError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        let now = Utc::now();
        self.updated_at = now;
        match target {
            PaymentStatus::Succeeded => self.succeeded_at = Some(now),
            PaymentStatus::Failed => self.failed_at = Some(now),
            PaymentStatus::Cancelled => self.cancelled_at = Some(now),
            PaymentStatus::Refunded => self.refunded_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    /// Appends a failure reason to the metadata error trail
    pub fn record_error(&mut self, reason: &str) {
        let errors = self
            .metadata
            .as_object_mut()
            .map(|obj| obj.entry("errors").or_insert_with(|| json!([])));
        if let Some(Value::Array(errors)) = errors {
            errors.push(json!({ "reason": reason }));
        }
        self.updated_at = Utc::now();
    }

    /// Credits clawed back across all applied refunds of this payment
    pub fn credits_reversed_total(&self) -> i64 {
        self.metadata
            .get("credits_reversed_total")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Bumps the reversed-credits counter kept in metadata
    pub fn add_credits_reversed(&mut self, credits: i64) {
        let total = self.credits_reversed_total() + credits;
        if let Some(obj) = self.metadata.as_object_mut() {
            obj.insert("credits_reversed_total".to_string(), json!(total));
        }
        self.updated_at = Utc::now();
    }

    /// Credits still eligible for reversal by future refunds
    pub fn credits_remaining(&self) -> i64 {
        (self.credits_purchased - self.credits_reversed_total()).max(0)
    }

    /// Marks the moment a verified webhook first confirmed this payment
    pub fn record_webhook_verification(&mut self, at: DateTime<Utc>) {
        if self.webhook_verified_at.is_none() {
            self.webhook_verified_at = Some(at);
            self.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> Payment {
        Payment::new(
            UserId::new("user-1"),
            Provider::Stripe,
            2999,
            Currency::USD,
            500,
            "chk-1",
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(Payment::new(
            UserId::new("u"),
            Provider::Stripe,
            0,
            Currency::USD,
            500,
            "k"
        )
        .is_err());
        assert!(Payment::new(
            UserId::new("u"),
            Provider::Stripe,
            100,
            Currency::USD,
            0,
            "k"
        )
        .is_err());
    }

    #[test]
    fn legal_transitions() {
        use PaymentStatus::*;
        assert!(Created.can_transition_to(Pending));
        assert!(Created.can_transition_to(Succeeded));
        assert!(Pending.can_transition_to(Failed));
        assert!(Succeeded.can_transition_to(Refunded));
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        use PaymentStatus::*;
        for terminal in [Failed, Cancelled, Refunded] {
            for target in [Created, Pending, Succeeded, Failed, Cancelled, Refunded] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn succeeded_cannot_return_to_pending() {
        assert!(!PaymentStatus::Succeeded.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn transition_stamps_timestamp() {
        let mut p = payment();
        p.transition(PaymentStatus::Succeeded).unwrap();
        assert!(p.succeeded_at.is_some());
        assert_eq!(p.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut p = payment();
        p.transition(PaymentStatus::Failed).unwrap();
        let err = p.transition(PaymentStatus::Succeeded);
        assert!(matches!(
            err,
            Err(PaymentError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn error_trail_accumulates() {
        let mut p = payment();
        p.record_error("card_declined");
        p.record_error("expired_card");
        let errors = p.metadata.get("errors").unwrap().as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["reason"], "card_declined");
    }

    #[test]
    fn reversed_credits_counter() {
        let mut p = payment();
        assert_eq!(p.credits_reversed_total(), 0);
        assert_eq!(p.credits_remaining(), 500);
        p.add_credits_reversed(200);
        assert_eq!(p.credits_reversed_total(), 200);
        assert_eq!(p.credits_remaining(), 300);
    }

    #[test]
    fn webhook_verification_stamp_is_first_write_wins() {
        let mut p = payment();
        let first = Utc::now();
        p.record_webhook_verification(first);
        let later = Utc::now();
        p.record_webhook_verification(later);
        assert_eq!(p.webhook_verified_at, Some(first));
    }
}
