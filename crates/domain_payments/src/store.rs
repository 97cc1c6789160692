//! Payment domain store ports
//!
//! As with the ledger, idempotency is a store concern: uniqueness constraints
//! are enforced inside the store's atomic scope and duplicates come back as
//! the existing row, so two concurrent creates collapse to one record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DomainPort, PaymentId, PortError, RefundId, ReservationId, UserId};

use crate::payment::{Payment, Provider};
use crate::refund::Refund;
use crate::reservation::UsageReservation;

/// Result of an idempotent payment insert
#[derive(Debug, Clone)]
pub enum PaymentInsert {
    Inserted(Payment),
    /// A payment with the same `(user, idempotency_key)` already existed
    Existing(Payment),
}

impl PaymentInsert {
    pub fn into_payment(self) -> Payment {
        match self {
            PaymentInsert::Inserted(p) | PaymentInsert::Existing(p) => p,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, PaymentInsert::Inserted(_))
    }
}

/// Result of an idempotent refund insert
#[derive(Debug, Clone)]
pub enum RefundInsert {
    Inserted(Refund),
    /// A refund with the same `(payment, idempotency_key)` already existed
    Existing(Refund),
}

impl RefundInsert {
    pub fn into_refund(self) -> Refund {
        match self {
            RefundInsert::Inserted(r) | RefundInsert::Existing(r) => r,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, RefundInsert::Inserted(_))
    }
}

/// Result of an idempotent reservation insert
#[derive(Debug, Clone)]
pub enum ReservationInsert {
    Inserted(UsageReservation),
    /// A reservation with the same `(user, operation_code)` already existed
    Existing(UsageReservation),
}

impl ReservationInsert {
    pub fn into_reservation(self) -> UsageReservation {
        match self {
            ReservationInsert::Inserted(r) | ReservationInsert::Existing(r) => r,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, ReservationInsert::Inserted(_))
    }
}

/// Port for payment records
#[async_trait]
pub trait PaymentStore: DomainPort {
    /// Inserts a payment, or returns the existing one for the same
    /// `(user, idempotency_key)`.
    async fn insert_or_get(&self, payment: Payment) -> Result<PaymentInsert, PortError>;

    async fn get(&self, id: &PaymentId) -> Result<Option<Payment>, PortError>;

    /// Looks up a payment by the provider-side payment identifier
    async fn find_by_provider_payment_id(
        &self,
        provider: Provider,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, PortError>;

    /// Persists the full current state of an existing payment
    async fn update(&self, payment: Payment) -> Result<Payment, PortError>;

    async fn list_by_provider(&self, provider: Provider) -> Result<Vec<Payment>, PortError>;

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Payment>, PortError>;
}

/// Port for refund records
#[async_trait]
pub trait RefundStore: DomainPort {
    /// Inserts a refund, or returns the existing one for the same
    /// `(payment, idempotency_key)`.
    async fn insert_or_get(&self, refund: Refund) -> Result<RefundInsert, PortError>;

    async fn get(&self, id: &RefundId) -> Result<Option<Refund>, PortError>;

    async fn find_by_provider_refund_id(
        &self,
        provider_refund_id: &str,
    ) -> Result<Option<Refund>, PortError>;

    async fn update(&self, refund: Refund) -> Result<Refund, PortError>;

    async fn list_for_payment(&self, payment_id: &PaymentId)
        -> Result<Vec<Refund>, PortError>;
}

/// Port for usage reservations
#[async_trait]
pub trait ReservationStore: DomainPort {
    /// Inserts a reservation, or returns the existing one for the same
    /// `(user, operation_code)`.
    async fn insert_or_get(
        &self,
        reservation: UsageReservation,
    ) -> Result<ReservationInsert, PortError>;

    async fn get(&self, id: &ReservationId) -> Result<Option<UsageReservation>, PortError>;

    async fn find_by_operation(
        &self,
        user: &UserId,
        operation_code: &str,
    ) -> Result<Option<UsageReservation>, PortError>;

    async fn update(&self, reservation: UsageReservation)
        -> Result<UsageReservation, PortError>;

    /// Persists `reservation` only if the stored row is still open
    /// (Pending/Active). Returns `None` when another writer already settled
    /// it; the caller must not touch the wallet hold in that case.
    async fn update_if_open(
        &self,
        reservation: UsageReservation,
    ) -> Result<Option<UsageReservation>, PortError>;

    /// Open reservations whose deadline is at or before `now`
    async fn list_expired(&self, now: DateTime<Utc>)
        -> Result<Vec<UsageReservation>, PortError>;
}
