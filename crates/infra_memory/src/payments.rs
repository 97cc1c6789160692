//! In-memory payment, refund, and reservation stores

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use core_kernel::{DomainPort, PaymentId, PortError, RefundId, ReservationId, UserId};
use domain_payments::{
    Payment, PaymentInsert, PaymentStore, Provider, Refund, RefundInsert, RefundStore,
    ReservationInsert, ReservationStatus, ReservationStore, UsageReservation,
};

use crate::state::MemoryState;

/// In-memory implementation of [`PaymentStore`]
#[derive(Clone)]
pub struct MemoryPaymentStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPaymentStore {
    pub(crate) fn new(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

impl DomainPort for MemoryPaymentStore {}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert_or_get(&self, payment: Payment) -> Result<PaymentInsert, PortError> {
        let mut state = self.state.lock().await;
        let key = (payment.user_id.clone(), payment.idempotency_key.clone());
        if let Some(existing_id) = state.payment_by_key.get(&key) {
            let existing = state
                .payments
                .get(existing_id)
                .cloned()
                .ok_or_else(|| PortError::internal("payment index out of sync"))?;
            return Ok(PaymentInsert::Existing(existing));
        }
        state.payment_by_key.insert(key, payment.id);
        state.payments.insert(payment.id, payment.clone());
        Ok(PaymentInsert::Inserted(payment))
    }

    async fn get(&self, id: &PaymentId) -> Result<Option<Payment>, PortError> {
        let state = self.state.lock().await;
        Ok(state.payments.get(id).cloned())
    }

    async fn find_by_provider_payment_id(
        &self,
        provider: Provider,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, PortError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .find(|p| {
                p.provider == provider
                    && p.provider_payment_id.as_deref() == Some(provider_payment_id)
            })
            .cloned())
    }

    async fn update(&self, payment: Payment) -> Result<Payment, PortError> {
        let mut state = self.state.lock().await;
        if !state.payments.contains_key(&payment.id) {
            return Err(PortError::not_found("payment", payment.id));
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn list_by_provider(&self, provider: Provider) -> Result<Vec<Payment>, PortError> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.provider == provider)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Payment>, PortError> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| &p.user_id == user)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

/// In-memory implementation of [`RefundStore`]
#[derive(Clone)]
pub struct MemoryRefundStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRefundStore {
    pub(crate) fn new(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

impl DomainPort for MemoryRefundStore {}

#[async_trait]
impl RefundStore for MemoryRefundStore {
    async fn insert_or_get(&self, refund: Refund) -> Result<RefundInsert, PortError> {
        let mut state = self.state.lock().await;
        let key = (refund.payment_id, refund.idempotency_key.clone());
        if let Some(existing_id) = state.refund_by_key.get(&key) {
            let existing = state
                .refunds
                .get(existing_id)
                .cloned()
                .ok_or_else(|| PortError::internal("refund index out of sync"))?;
            return Ok(RefundInsert::Existing(existing));
        }
        state.refund_by_key.insert(key, refund.id);
        state.refunds.insert(refund.id, refund.clone());
        Ok(RefundInsert::Inserted(refund))
    }

    async fn get(&self, id: &RefundId) -> Result<Option<Refund>, PortError> {
        let state = self.state.lock().await;
        Ok(state.refunds.get(id).cloned())
    }

    async fn find_by_provider_refund_id(
        &self,
        provider_refund_id: &str,
    ) -> Result<Option<Refund>, PortError> {
        let state = self.state.lock().await;
        Ok(state
            .refunds
            .values()
            .find(|r| r.provider_refund_id.as_deref() == Some(provider_refund_id))
            .cloned())
    }

    async fn update(&self, refund: Refund) -> Result<Refund, PortError> {
        let mut state = self.state.lock().await;
        if !state.refunds.contains_key(&refund.id) {
            return Err(PortError::not_found("refund", refund.id));
        }
        state.refunds.insert(refund.id, refund.clone());
        Ok(refund)
    }

    async fn list_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<Refund>, PortError> {
        let state = self.state.lock().await;
        let mut refunds: Vec<Refund> = state
            .refunds
            .values()
            .filter(|r| &r.payment_id == payment_id)
            .cloned()
            .collect();
        refunds.sort_by_key(|r| r.created_at);
        Ok(refunds)
    }
}

/// In-memory implementation of [`ReservationStore`]
#[derive(Clone)]
pub struct MemoryReservationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryReservationStore {
    pub(crate) fn new(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

impl DomainPort for MemoryReservationStore {}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn insert_or_get(
        &self,
        reservation: UsageReservation,
    ) -> Result<ReservationInsert, PortError> {
        let mut state = self.state.lock().await;
        let key = (
            reservation.user_id.clone(),
            reservation.operation_code.clone(),
        );
        if let Some(existing_id) = state.reservation_by_key.get(&key) {
            let existing = state
                .reservations
                .get(existing_id)
                .cloned()
                .ok_or_else(|| {
                    PortError::internal("reservation index out of sync")
                })?;
            return Ok(ReservationInsert::Existing(existing));
        }
        state.reservation_by_key.insert(key, reservation.id);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(ReservationInsert::Inserted(reservation))
    }

    async fn get(&self, id: &ReservationId) -> Result<Option<UsageReservation>, PortError> {
        let state = self.state.lock().await;
        Ok(state.reservations.get(id).cloned())
    }

    async fn find_by_operation(
        &self,
        user: &UserId,
        operation_code: &str,
    ) -> Result<Option<UsageReservation>, PortError> {
        let state = self.state.lock().await;
        let key = (user.clone(), operation_code.to_string());
        Ok(state
            .reservation_by_key
            .get(&key)
            .and_then(|id| state.reservations.get(id))
            .cloned())
    }

    async fn update(
        &self,
        reservation: UsageReservation,
    ) -> Result<UsageReservation, PortError> {
        let mut state = self.state.lock().await;
        if !state.reservations.contains_key(&reservation.id) {
            return Err(PortError::not_found("reservation", reservation.id));
        }
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn update_if_open(
        &self,
        reservation: UsageReservation,
    ) -> Result<Option<UsageReservation>, PortError> {
        let mut state = self.state.lock().await;
        let stored = state
            .reservations
            .get(&reservation.id)
            .ok_or_else(|| PortError::not_found("reservation", reservation.id))?;
        if !stored.status.is_open() {
            return Ok(None);
        }
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(Some(reservation))
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UsageReservation>, PortError> {
        let state = self.state.lock().await;
        let mut expired: Vec<UsageReservation> = state
            .reservations
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expires_at);
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;
    use chrono::Duration;
    use core_kernel::Currency;

    fn user() -> UserId {
        UserId::new("user-1")
    }

    fn payment(key: &str) -> Payment {
        Payment::new(user(), Provider::Stripe, 999, Currency::USD, 100, key).unwrap()
    }

    #[tokio::test]
    async fn duplicate_checkout_key_returns_existing_payment() {
        let store = MemoryBackend::new().payment_store();

        let first = store.insert_or_get(payment("chk-1")).await.unwrap();
        assert!(first.was_inserted());
        let second = store.insert_or_get(payment("chk-1")).await.unwrap();
        assert!(!second.was_inserted());
        assert_eq!(second.into_payment().id, first.into_payment().id);
    }

    #[tokio::test]
    async fn provider_payment_id_lookup_is_provider_scoped() {
        let store = MemoryBackend::new().payment_store();

        let mut p = payment("chk-1");
        p.provider_payment_id = Some("pi_123".to_string());
        store.insert_or_get(p).await.unwrap();

        assert!(store
            .find_by_provider_payment_id(Provider::Stripe, "pi_123")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_provider_payment_id(Provider::PayPal, "pi_123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_of_unknown_payment_fails() {
        let store = MemoryBackend::new().payment_store();
        let err = store.update(payment("chk-1")).await;
        assert!(matches!(err, Err(PortError::NotFound { .. })));
    }

    #[tokio::test]
    async fn reservation_is_idempotent_per_operation() {
        let store = MemoryBackend::new().reservation_store();

        let r1 = UsageReservation::new(user(), 40, "report:1", Duration::minutes(30)).unwrap();
        let r2 = UsageReservation::new(user(), 99, "report:1", Duration::minutes(30)).unwrap();
        let first = store.insert_or_get(r1).await.unwrap();
        assert!(first.was_inserted());
        let second = store.insert_or_get(r2).await.unwrap();
        assert!(!second.was_inserted());
        assert_eq!(second.into_reservation().credits_reserved, 40);
    }

    #[tokio::test]
    async fn update_if_open_refuses_settled_reservations() {
        let store = MemoryBackend::new().reservation_store();

        let open = UsageReservation::new(user(), 40, "report:1", Duration::minutes(30)).unwrap();
        store.insert_or_get(open.clone()).await.unwrap();

        let mut cancelled = open.clone();
        cancelled.transition(ReservationStatus::Cancelled).unwrap();
        let won = store.update_if_open(cancelled).await.unwrap();
        assert!(won.is_some());

        // A second closer working from the stale open snapshot loses
        let mut expired = open;
        expired.transition(ReservationStatus::Expired).unwrap();
        let lost = store.update_if_open(expired).await.unwrap();
        assert!(lost.is_none());

        let stored = store.get(&won.unwrap().id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn list_expired_skips_open_and_future_reservations() {
        let store = MemoryBackend::new().reservation_store();

        let fresh = UsageReservation::new(user(), 10, "op:fresh", Duration::hours(2)).unwrap();
        let stale = UsageReservation::new(user(), 10, "op:stale", Duration::minutes(1)).unwrap();
        store.insert_or_get(fresh).await.unwrap();
        store.insert_or_get(stale.clone()).await.unwrap();

        let between = stale.expires_at + Duration::seconds(1);
        let expired = store.list_expired(between).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);

        let none = store.list_expired(Utc::now()).await.unwrap();
        assert!(none.is_empty());
    }
}
