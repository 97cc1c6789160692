//! Refund aggregate and proportional credit reversal
//!
//! A refund reverses part or all of a succeeded payment. The credit side is
//! proportional: a partial refund of half the charged amount claws back half
//! of the purchased credits, rounded half away from zero, and the sum of all
//! reversals never exceeds `credits_purchased`.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use core_kernel::{Currency, PaymentId, RefundId};

use crate::error::PaymentError;
use crate::payment::Payment;

/// Lifecycle status of a refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Refunded,
    Failed,
    Cancelled,
}

impl RefundStatus {
    pub fn can_transition_to(&self, target: RefundStatus) -> bool {
        use RefundStatus::*;
        matches!(
            (self, target),
            (Pending, Refunded) | (Pending, Failed) | (Pending, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RefundStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Refunded => "refunded",
            RefundStatus::Failed => "failed",
            RefundStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A refund record against a single payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    /// Refunded amount in minor units (cents)
    pub amount_cents: i64,
    /// Credits clawed back from the wallet for this refund
    pub credits_reversed: i64,
    pub currency: Currency,
    pub status: RefundStatus,
    /// Provider-side refund identifier, unique per provider
    pub provider_refund_id: Option<String>,
    /// Key making refund creation idempotent per payment
    pub idempotency_key: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    pub fn new(
        payment_id: PaymentId,
        amount_cents: i64,
        credits_reversed: i64,
        currency: Currency,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        if amount_cents <= 0 {
            return Err(PaymentError::Validation(format!(
                "refund amount_cents must be positive, got {amount_cents}"
            )));
        }
        if credits_reversed < 0 {
            return Err(PaymentError::Validation(format!(
                "credits_reversed must not be negative, got {credits_reversed}"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: RefundId::new_v7(),
            payment_id,
            amount_cents,
            credits_reversed,
            currency,
            status: RefundStatus::Pending,
            provider_refund_id: None,
            idempotency_key: idempotency_key.into(),
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn transition(&mut self, target: RefundStatus) -> Result<(), PaymentError> {
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

    /// Records a ledger reversal failure without failing the refund.
    ///
    /// The provider has already moved the money; an unreversed credit grant
    /// is a bookkeeping problem flagged for manual follow-up, not a reason
    /// to pretend the refund did not happen.
    pub fn record_reversal_failure(&mut self, reason: &str) {
        if let Some(obj) = self.metadata.as_object_mut() {
            obj.insert("credit_reversal_failed".to_string(), json!(true));
            obj.insert("credit_reversal_error".to_string(), json!(reason));
        }
        self.updated_at = Utc::now();
    }
}

/// Credits to reverse for a partial refund of `amount_cents`.
///
/// `round(amount / total * credits_purchased)` with half rounded away from
/// zero, then capped so cumulative reversals never exceed the credits the
/// payment granted.
pub fn proportional_credits(payment: &Payment, amount_cents: i64) -> Result<i64, PaymentError> {
    if amount_cents <= 0 {
        return Err(PaymentError::Validation(format!(
            "refund amount must be positive, got {amount_cents}"
        )));
    }
    if payment.amount_cents <= 0 {
        return Err(PaymentError::Validation(
            "payment amount must be positive".to_string(),
        ));
    }

    let remaining = payment.credits_remaining();
    if amount_cents >= payment.amount_cents {
        return Ok(remaining);
    }

    let ratio = Decimal::new(amount_cents, 0) / Decimal::new(payment.amount_cents, 0);
    let credits = (ratio * Decimal::new(payment.credits_purchased, 0))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| PaymentError::Validation("credit calculation overflow".to_string()))?;

    Ok(credits.min(remaining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::Provider;
    use core_kernel::UserId;

    fn payment(amount_cents: i64, credits: i64) -> Payment {
        Payment::new(
            UserId::new("user-1"),
            Provider::Stripe,
            amount_cents,
            Currency::USD,
            credits,
            "chk-1",
        )
        .unwrap()
    }

    #[test]
    fn full_refund_reverses_all_remaining_credits() {
        let p = payment(1000, 500);
        assert_eq!(proportional_credits(&p, 1000).unwrap(), 500);
    }

    #[test]
    fn half_refund_reverses_half_the_credits() {
        let p = payment(1000, 500);
        assert_eq!(proportional_credits(&p, 500).unwrap(), 250);
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        // 1/200 of 100 credits = 0.5, rounds up to 1
        let p = payment(200, 100);
        assert_eq!(proportional_credits(&p, 1).unwrap(), 1);

        // 333/1000 of 100 credits = 33.3, rounds to 33
        let p = payment(1000, 100);
        assert_eq!(proportional_credits(&p, 333).unwrap(), 33);

        // 335/1000 of 100 credits = 33.5, rounds to 34
        assert_eq!(proportional_credits(&p, 335).unwrap(), 34);
    }

    #[test]
    fn reversal_is_capped_by_remaining_credits() {
        let mut p = payment(1000, 500);
        p.add_credits_reversed(400);
        // 60% of 500 = 300, but only 100 remain
        assert_eq!(proportional_credits(&p, 600).unwrap(), 100);
    }

    #[test]
    fn full_refund_after_partial_reverses_only_remainder() {
        let mut p = payment(1000, 500);
        p.add_credits_reversed(250);
        assert_eq!(proportional_credits(&p, 1000).unwrap(), 250);
    }

    #[test]
    fn rejects_non_positive_refund_amount() {
        let p = payment(1000, 500);
        assert!(proportional_credits(&p, 0).is_err());
        assert!(proportional_credits(&p, -5).is_err());
    }

    #[test]
    fn refund_transitions() {
        let mut r = Refund::new(PaymentId::new(), 500, 250, Currency::USD, "r-1").unwrap();
        assert!(r.status.can_transition_to(RefundStatus::Refunded));
        r.transition(RefundStatus::Refunded).unwrap();
        assert!(r.transition(RefundStatus::Failed).is_err());
    }

    #[test]
    fn reversal_failure_is_recorded_in_metadata() {
        let mut r = Refund::new(PaymentId::new(), 500, 250, Currency::USD, "r-1").unwrap();
        r.record_reversal_failure("store unavailable");
        assert_eq!(r.metadata["credit_reversal_failed"], true);
        assert_eq!(r.metadata["credit_reversal_error"], "store unavailable");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::payment::Provider;
    use core_kernel::UserId;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn reversal_never_exceeds_purchased_credits(
            amount_cents in 1i64..1_000_000i64,
            credits in 1i64..1_000_000i64,
            refund_cents in 1i64..2_000_000i64,
        ) {
            let p = Payment::new(
                UserId::new("u"),
                Provider::Stripe,
                amount_cents,
                Currency::USD,
                credits,
                "k",
            ).unwrap();
            let reversed = proportional_credits(&p, refund_cents).unwrap();
            prop_assert!(reversed >= 0);
            prop_assert!(reversed <= credits);
        }

        #[test]
        fn two_halves_reverse_everything(
            amount_cents in 2i64..1_000_000i64,
            credits in 1i64..1_000_000i64,
        ) {
            let mut p = Payment::new(
                UserId::new("u"),
                Provider::Stripe,
                amount_cents,
                Currency::USD,
                credits,
                "k",
            ).unwrap();
            let half = amount_cents / 2;
            let first = proportional_credits(&p, half).unwrap();
            p.add_credits_reversed(first);
            let second = proportional_credits(&p, amount_cents - half).unwrap();
            prop_assert_eq!(first + second, credits);
        }
    }
}
