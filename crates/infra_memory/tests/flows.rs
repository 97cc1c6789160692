//! End-to-end flows over the in-memory backend
//!
//! These wire the real domain services against the in-memory stores and walk
//! the money paths: duplicate success delivery, full and partial refunds,
//! mismatch rejection, and reservation expiry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;

use core_kernel::{Currency, DomainPort, PortError, UserId};
use domain_ledger::{CreditService, LedgerError, WalletService};
use domain_payments::{
    Payment, PaymentError, PaymentService, PaymentStatus, Provider, ProviderRefund,
    ProviderRefundAdapter, ProviderRefundStatus, RefundOrchestrator, ReservationService,
};
use infra_memory::MemoryBackend;

/// Scripted refund adapter; always succeeds at the provider
#[derive(Default)]
struct FakeRefundAdapter {
    counter: std::sync::atomic::AtomicU64,
}

impl DomainPort for FakeRefundAdapter {}

#[async_trait]
impl ProviderRefundAdapter for FakeRefundAdapter {
    async fn execute_refund(
        &self,
        _payment: &Payment,
        _amount_cents: i64,
    ) -> Result<ProviderRefund, PortError> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(ProviderRefund {
            provider_refund_id: format!("re_{n}"),
            status: ProviderRefundStatus::Succeeded,
        })
    }
}

struct Harness {
    credits: CreditService,
    wallet: WalletService,
    payments: PaymentService,
    refunds: RefundOrchestrator,
    reservations: ReservationService,
}

fn harness() -> Harness {
    let backend = MemoryBackend::new();
    let ledger_store = Arc::new(backend.ledger_store());
    let wallet_store = Arc::new(backend.wallet_store());
    let payment_store = Arc::new(backend.payment_store());
    let refund_store = Arc::new(backend.refund_store());
    let reservation_store = Arc::new(backend.reservation_store());

    let credits = CreditService::new(ledger_store.clone());
    let wallet = WalletService::new(wallet_store, ledger_store);
    let payments = PaymentService::new(payment_store.clone(), credits.clone());
    let mut adapters: HashMap<Provider, Arc<dyn ProviderRefundAdapter>> = HashMap::new();
    adapters.insert(Provider::Stripe, Arc::new(FakeRefundAdapter::default()));
    adapters.insert(Provider::PayPal, Arc::new(FakeRefundAdapter::default()));
    let refunds = RefundOrchestrator::new(
        payment_store,
        refund_store,
        credits.clone(),
        adapters,
    );
    let reservations =
        ReservationService::new(reservation_store, wallet.clone(), credits.clone());

    Harness {
        credits,
        wallet,
        payments,
        refunds,
        reservations,
    }
}

fn user() -> UserId {
    UserId::new("user-1")
}

async fn succeeded_payment(h: &Harness, amount_cents: i64, credits: i64) -> Payment {
    let (payment, created) = h
        .payments
        .create_payment(
            &user(),
            Provider::Stripe,
            amount_cents,
            Currency::USD,
            credits,
            "chk-1",
        )
        .await
        .unwrap();
    assert!(created);
    h.payments
        .apply_success(&payment.id, Some("pi_123"))
        .await
        .unwrap()
}

#[tokio::test]
async fn duplicate_success_credits_once() {
    let h = harness();
    let payment = succeeded_payment(&h, 20000, 100).await;

    // Second delivery of the same success notification
    let replay = h
        .payments
        .apply_success(&payment.id, Some("pi_123"))
        .await
        .unwrap();
    assert_eq!(replay.status, PaymentStatus::Succeeded);

    assert_eq!(h.credits.balance(&user()).await.unwrap(), 100);
    let history = h.credits.history(&user()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].credits_delta, 100);
}

#[tokio::test]
async fn full_refund_reverses_everything() {
    let h = harness();
    let payment = succeeded_payment(&h, 20000, 100).await;

    let outcome = h.refunds.refund(&payment.id, None, "rf-1").await.unwrap();

    assert_eq!(outcome.payment.status, PaymentStatus::Refunded);
    assert_eq!(outcome.refund.credits_reversed, 100);
    assert!(outcome.reversal_failure.is_none());
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 0);

    let history = h.credits.history(&user()).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].credits_delta, -100);
    assert_eq!(history[1].operation_code, "refund_reversal");
}

#[tokio::test]
async fn partial_refund_reverses_proportionally() {
    let h = harness();
    let payment = succeeded_payment(&h, 20000, 100).await;

    // 25% of the charge claws back 25% of the credits
    let outcome = h
        .refunds
        .refund(&payment.id, Some(5000), "rf-1")
        .await
        .unwrap();

    assert_eq!(outcome.refund.credits_reversed, 25);
    assert_eq!(outcome.payment.status, PaymentStatus::Succeeded);
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 75);
}

#[tokio::test]
async fn replayed_refund_key_posts_once() {
    let h = harness();
    let payment = succeeded_payment(&h, 20000, 100).await;

    h.refunds
        .refund(&payment.id, Some(5000), "rf-1")
        .await
        .unwrap();
    let replay = h
        .refunds
        .refund(&payment.id, Some(5000), "rf-1")
        .await
        .unwrap();

    assert_eq!(replay.refund.credits_reversed, 25);
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 75);
    assert_eq!(h.credits.history(&user()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn two_partial_refunds_drain_the_payment() {
    let h = harness();
    let payment = succeeded_payment(&h, 20000, 100).await;

    h.refunds
        .refund(&payment.id, Some(10000), "rf-1")
        .await
        .unwrap();
    let second = h
        .refunds
        .refund(&payment.id, Some(10000), "rf-2")
        .await
        .unwrap();

    // The second half is a full drain of the remainder, so the rounding of
    // the two halves must sum exactly to the purchased credits.
    assert_eq!(second.payment.status, PaymentStatus::Refunded);
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 0);
}

#[tokio::test]
async fn refund_beyond_remainder_is_rejected() {
    let h = harness();
    let payment = succeeded_payment(&h, 20000, 100).await;

    h.refunds
        .refund(&payment.id, Some(15000), "rf-1")
        .await
        .unwrap();
    let err = h.refunds.refund(&payment.id, Some(10000), "rf-2").await;
    assert!(matches!(err, Err(PaymentError::Validation(_))));
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 25);
}

#[tokio::test]
async fn expired_reservation_cannot_be_consumed() {
    let h = harness();
    h.credits
        .apply_credit(&user(), 100, "purchase", "seed", None, json!({}))
        .await
        .unwrap();

    let reservation = h
        .reservations
        .create(&user(), 30, "report:1", Some(Duration::seconds(-1)))
        .await
        .unwrap();
    assert_eq!(reservation.credits_reserved, 30);
    assert_eq!(h.wallet.spendable_balance(&user()).await.unwrap(), 70);

    let err = h.reservations.consume(&user(), "report:1").await;
    assert!(matches!(err, Err(PaymentError::ReservationExpired(_))));

    // Hold released exactly once, ledger untouched
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 100);
    assert_eq!(h.wallet.spendable_balance(&user()).await.unwrap(), 100);
    assert_eq!(h.credits.history(&user()).await.unwrap().len(), 1);

    // Replaying the consume still fails and still releases nothing further
    let err = h.reservations.consume(&user(), "report:1").await;
    assert!(matches!(
        err,
        Err(PaymentError::InvalidStatusTransition { .. })
    ));
    assert_eq!(h.wallet.spendable_balance(&user()).await.unwrap(), 100);
}

#[tokio::test]
async fn reservation_consume_debits_and_releases() {
    let h = harness();
    h.credits
        .apply_credit(&user(), 100, "purchase", "seed", None, json!({}))
        .await
        .unwrap();

    h.reservations
        .create(&user(), 30, "report:1", None)
        .await
        .unwrap();
    assert_eq!(h.wallet.spendable_balance(&user()).await.unwrap(), 70);

    let consumed = h.reservations.consume(&user(), "report:1").await.unwrap();
    assert_eq!(consumed.credits_consumed, 30);
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 70);
    assert_eq!(h.wallet.spendable_balance(&user()).await.unwrap(), 70);

    // Replay is a no-op
    let replay = h.reservations.consume(&user(), "report:1").await.unwrap();
    assert_eq!(replay.credits_consumed, 30);
    assert_eq!(h.credits.balance(&user()).await.unwrap(), 70);
}

#[tokio::test]
async fn reservation_cannot_overdraw_spendable_balance() {
    let h = harness();
    h.credits
        .apply_credit(&user(), 50, "purchase", "seed", None, json!({}))
        .await
        .unwrap();

    h.reservations
        .create(&user(), 40, "op:a", None)
        .await
        .unwrap();
    let err = h.reservations.create(&user(), 40, "op:b", None).await;
    assert!(matches!(
        err,
        Err(PaymentError::Ledger(LedgerError::InsufficientCredits {
            available: 10,
            requested: 40
        }))
    ));
}

mod close_races {
    use super::*;
    use chrono::{DateTime, Utc};
    use core_kernel::ReservationId;
    use domain_payments::{ReservationInsert, ReservationStore, UsageReservation};
    use infra_memory::MemoryReservationStore;
    use test_utils::assert_reserved;
    use tokio::sync::Mutex;

    /// Reservation store whose expiry listing can be pinned to a stale
    /// snapshot, standing in for a sweep that listed a reservation before a
    /// concurrent closer settled it.
    struct StaleSweepStore {
        inner: MemoryReservationStore,
        stale: Mutex<Vec<UsageReservation>>,
    }

    impl DomainPort for StaleSweepStore {}

    #[async_trait]
    impl ReservationStore for StaleSweepStore {
        async fn insert_or_get(
            &self,
            reservation: UsageReservation,
        ) -> Result<ReservationInsert, PortError> {
            self.inner.insert_or_get(reservation).await
        }

        async fn get(
            &self,
            id: &ReservationId,
        ) -> Result<Option<UsageReservation>, PortError> {
            self.inner.get(id).await
        }

        async fn find_by_operation(
            &self,
            user: &UserId,
            operation_code: &str,
        ) -> Result<Option<UsageReservation>, PortError> {
            self.inner.find_by_operation(user, operation_code).await
        }

        async fn update(
            &self,
            reservation: UsageReservation,
        ) -> Result<UsageReservation, PortError> {
            self.inner.update(reservation).await
        }

        async fn update_if_open(
            &self,
            reservation: UsageReservation,
        ) -> Result<Option<UsageReservation>, PortError> {
            self.inner.update_if_open(reservation).await
        }

        async fn list_expired(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<UsageReservation>, PortError> {
            let stale = self.stale.lock().await;
            if stale.is_empty() {
                self.inner.list_expired(now).await
            } else {
                Ok(stale.clone())
            }
        }
    }

    #[tokio::test]
    async fn sweep_racing_a_cancel_releases_each_hold_once() {
        let backend = MemoryBackend::new();
        let ledger_store = Arc::new(backend.ledger_store());
        let credits = CreditService::new(ledger_store.clone());
        let wallet = WalletService::new(Arc::new(backend.wallet_store()), ledger_store);
        let store = Arc::new(StaleSweepStore {
            inner: backend.reservation_store(),
            stale: Mutex::new(Vec::new()),
        });
        let reservations =
            ReservationService::new(store.clone(), wallet.clone(), credits.clone());

        let user = user();
        credits
            .apply_credit(&user, 100, "purchase", "seed", None, json!({}))
            .await
            .unwrap();

        let doomed = reservations
            .create(&user, 30, "report:1", None)
            .await
            .unwrap();
        reservations.create(&user, 40, "report:2", None).await.unwrap();
        assert_eq!(wallet.spendable_balance(&user).await.unwrap(), 30);

        // The sweep lists the first reservation while it is still open...
        *store.stale.lock().await = vec![doomed];

        // ...then a cancel settles it, releasing its 30-credit hold.
        reservations.cancel(&user, "report:1").await.unwrap();
        assert_eq!(wallet.spendable_balance(&user).await.unwrap(), 60);

        // The sweep loses the terminal write and must not release again;
        // the second reservation's hold stays intact.
        let expired = reservations.expire_batch().await.unwrap();
        assert_eq!(expired, 0);
        assert_eq!(wallet.spendable_balance(&user).await.unwrap(), 60);
        assert_reserved(&wallet.get_or_create(&user).await.unwrap(), 40);
    }
}

#[tokio::test]
async fn welcome_grant_is_one_shot() {
    let h = harness();

    let first = h.credits.grant_welcome_credits(&user(), 25).await.unwrap();
    assert!(first.applied);
    let second = h.credits.grant_welcome_credits(&user(), 25).await.unwrap();
    assert!(!second.applied);

    assert_eq!(h.credits.balance(&user()).await.unwrap(), 25);
}

mod conservation {
    use super::*;
    use proptest::prelude::*;
    use test_utils::{
        assert_ledger_conserved, assert_no_duplicate_postings, purchase_history_strategy,
    };

    fn run_flow(purchases: Vec<(i64, i64)>, refund_fractions: Vec<u8>) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        rt.block_on(async {
            let h = harness();
            let mut expected_balance: i64 = 0;

            for (i, (amount_cents, credits)) in purchases.iter().enumerate() {
                let (payment, _) = h
                    .payments
                    .create_payment(
                        &user(),
                        Provider::Stripe,
                        *amount_cents,
                        Currency::USD,
                        *credits,
                        &format!("chk-{i}"),
                    )
                    .await
                    .unwrap();
                h.payments.apply_success(&payment.id, None).await.unwrap();
                expected_balance += credits;

                if let Some(pct) = refund_fractions.get(i) {
                    let pct = (*pct % 100) as i64 + 1;
                    let refund_cents = (amount_cents * pct) / 100;
                    if refund_cents > 0 {
                        let outcome = h
                            .refunds
                            .refund(&payment.id, Some(refund_cents), &format!("rf-{i}"))
                            .await
                            .unwrap();
                        assert!(outcome.refund.credits_reversed <= *credits);
                        expected_balance -= outcome.refund.credits_reversed;
                    }
                }
            }

            // Balance is exactly the sum of deltas, and matches the walk
            let balance = h.credits.balance(&user()).await.unwrap();
            assert_eq!(balance, expected_balance);
            let history = h.credits.history(&user()).await.unwrap();
            assert_ledger_conserved(&history, balance);
            assert_no_duplicate_postings(&history);
        });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn balance_equals_sum_of_deltas(
            purchases in purchase_history_strategy(6),
            refund_fractions in prop::collection::vec(any::<u8>(), 0..6),
        ) {
            run_flow(purchases, refund_fractions);
        }
    }
}
