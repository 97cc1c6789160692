//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults. Tests
//! specify only the fields they care about.
//!
//! Builders go through the domain constructors, so they cannot produce
//! records the domain itself would reject; status shortcuts replay the real
//! transition machine.

use chrono::Duration;
use core_kernel::{Currency, UserId};
use domain_payments::{Payment, PaymentStatus, Provider, UsageReservation};

use crate::fixtures::{PurchaseFixtures, UserFixtures};

/// Builder for payment records
pub struct PaymentBuilder {
    user_id: UserId,
    provider: Provider,
    amount_cents: i64,
    credits: i64,
    currency: Currency,
    idempotency_key: String,
    status: PaymentStatus,
    provider_payment_id: Option<String>,
}

impl Default for PaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentBuilder {
    pub fn new() -> Self {
        Self {
            user_id: UserFixtures::alice(),
            provider: Provider::Stripe,
            amount_cents: PurchaseFixtures::STARTER_CENTS,
            credits: PurchaseFixtures::STARTER_CREDITS,
            currency: PurchaseFixtures::currency(),
            idempotency_key: "chk-test".to_string(),
            status: PaymentStatus::Created,
            provider_payment_id: None,
        }
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user_id = user;
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_amount(mut self, amount_cents: i64, credits: i64) -> Self {
        self.amount_cents = amount_cents;
        self.credits = credits;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }

    pub fn with_provider_payment_id(mut self, id: impl Into<String>) -> Self {
        self.provider_payment_id = Some(id.into());
        self
    }

    /// Build as a succeeded payment
    pub fn succeeded(mut self) -> Self {
        self.status = PaymentStatus::Succeeded;
        self
    }

    /// Build as a pending payment
    pub fn pending(mut self) -> Self {
        self.status = PaymentStatus::Pending;
        self
    }

    /// Build as a failed payment
    pub fn failed(mut self) -> Self {
        self.status = PaymentStatus::Failed;
        self
    }

    pub fn build(self) -> Payment {
        let mut payment = Payment::new(
            self.user_id,
            self.provider,
            self.amount_cents,
            self.currency,
            self.credits,
            self.idempotency_key,
        )
        .expect("builder defaults must satisfy payment validation");
        payment.provider_payment_id = self.provider_payment_id;
        match self.status {
            PaymentStatus::Created => {}
            PaymentStatus::Pending => {
                payment.transition(PaymentStatus::Pending).expect("legal");
            }
            status => {
                payment.transition(status).expect("legal from created");
            }
        }
        payment
    }
}

/// Builder for usage reservations
pub struct ReservationBuilder {
    user_id: UserId,
    credits: i64,
    operation_code: String,
    ttl: Duration,
}

impl Default for ReservationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationBuilder {
    pub fn new() -> Self {
        Self {
            user_id: UserFixtures::alice(),
            credits: 10,
            operation_code: "op-test".to_string(),
            ttl: Duration::minutes(30),
        }
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user_id = user;
        self
    }

    pub fn with_credits(mut self, credits: i64) -> Self {
        self.credits = credits;
        self
    }

    pub fn with_operation_code(mut self, code: impl Into<String>) -> Self {
        self.operation_code = code.into();
        self
    }

    /// TTL may be negative to build an already-expired reservation
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> UsageReservation {
        UsageReservation::new(self.user_id, self.credits, &self.operation_code, self.ttl)
            .expect("builder defaults must satisfy reservation validation")
    }
}
