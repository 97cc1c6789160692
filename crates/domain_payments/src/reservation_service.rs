//! Reservation service
//!
//! Coordinates reservation records with wallet holds and the ledger. The
//! invariant throughout: every open reservation corresponds to exactly one
//! hold of `credits_reserved` on the wallet, released exactly once when the
//! reservation closes, whichever way it closes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use core_kernel::UserId;
use domain_ledger::{op_code, op_key, CreditService, LedgerError, WalletService};

use crate::error::PaymentError;
use crate::reservation::{ReservationStatus, UsageReservation, DEFAULT_RESERVATION_TTL};
use crate::store::ReservationStore;

/// Service for usage reservations
#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    wallet: WalletService,
    credits: CreditService,
}

impl ReservationService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        wallet: WalletService,
        credits: CreditService,
    ) -> Self {
        Self {
            store,
            wallet,
            credits,
        }
    }

    /// Creates a reservation holding `credits` spendable credits, idempotent
    /// by `(user, operation_code)`. The existing reservation is returned on
    /// replay whatever its current state.
    pub async fn create(
        &self,
        user: &UserId,
        credits: i64,
        operation_code: &str,
        ttl: Option<Duration>,
    ) -> Result<UsageReservation, PaymentError> {
        if let Some(existing) = self.store.find_by_operation(user, operation_code).await? {
            return Ok(existing);
        }

        let reservation = UsageReservation::new(
            user.clone(),
            credits,
            operation_code,
            ttl.unwrap_or(DEFAULT_RESERVATION_TTL),
        )?;

        // Hold first, then record. If the insert loses a race to a
        // concurrent create for the same operation, undo our hold and hand
        // back the winner's reservation.
        self.wallet.reserve(user, credits).await?;
        let insert = self.store.insert_or_get(reservation).await?;
        if !insert.was_inserted() {
            self.wallet.release(user, credits).await?;
            return Ok(insert.into_reservation());
        }
        let reservation = insert.into_reservation();
        info!(
            reservation = %reservation.id,
            user = %user,
            credits,
            operation = operation_code,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Consumes the reservation: debits the full reserved amount and
    /// releases the hold. Replaying a consumed reservation is a no-op.
    ///
    /// An expired-but-open reservation is expired first (releasing its hold)
    /// and the consume is rejected.
    pub async fn consume(
        &self,
        user: &UserId,
        operation_code: &str,
    ) -> Result<UsageReservation, PaymentError> {
        let reservation = self
            .store
            .find_by_operation(user, operation_code)
            .await?
            .ok_or_else(|| PaymentError::ReservationNotFound(operation_code.to_string()))?;

        match reservation.status {
            ReservationStatus::Consumed => return Ok(reservation),
            ReservationStatus::Cancelled | ReservationStatus::Expired => {
                return Err(PaymentError::InvalidStatusTransition {
                    from: reservation.status.to_string(),
                    to: ReservationStatus::Consumed.to_string(),
                })
            }
            ReservationStatus::Pending | ReservationStatus::Active => {}
        }

        if reservation.is_expired(Utc::now()) {
            let reservation = self.close(reservation, ReservationStatus::Expired).await?;
            return Err(PaymentError::ReservationExpired(reservation.id.to_string()));
        }

        // Release the hold so the spendable check sees these credits, then
        // debit. If another operation snatches the headroom in between, the
        // debit fails; restore the hold and report insufficiency.
        let amount = reservation.credits_reserved;
        self.wallet.release(user, amount).await?;
        let debit = self
            .credits
            .debit_checked(
                user,
                amount,
                op_code::CONSUME,
                &op_key::reservation_consume(operation_code),
                Some(reservation.id),
                json!({ "reservation_id": reservation.id.to_string() }),
            )
            .await;
        let debit = match debit {
            Ok(outcome) => outcome,
            Err(e @ LedgerError::InsufficientCredits { .. }) => {
                warn!(
                    reservation = %reservation.id,
                    "Consume debit lost its headroom, restoring hold"
                );
                self.wallet.reserve(user, amount).await?;
                return Err(e.into());
            }
            Err(e) => {
                self.wallet.reserve(user, amount).await?;
                return Err(e.into());
            }
        };

        let mut reservation = reservation;
        reservation.credits_consumed = debit.transaction.credits_abs();
        reservation.transition(ReservationStatus::Consumed)?;
        let reservation = self.store.update(reservation).await?;
        info!(
            reservation = %reservation.id,
            credits = reservation.credits_consumed,
            "Reservation consumed"
        );
        Ok(reservation)
    }

    /// Cancels an open reservation, releasing its hold with no ledger
    /// effect. Replaying a cancelled or expired reservation is a no-op.
    pub async fn cancel(
        &self,
        user: &UserId,
        operation_code: &str,
    ) -> Result<UsageReservation, PaymentError> {
        let reservation = self
            .store
            .find_by_operation(user, operation_code)
            .await?
            .ok_or_else(|| PaymentError::ReservationNotFound(operation_code.to_string()))?;

        match reservation.status {
            ReservationStatus::Cancelled | ReservationStatus::Expired => Ok(reservation),
            ReservationStatus::Consumed => Err(PaymentError::InvalidStatusTransition {
                from: reservation.status.to_string(),
                to: ReservationStatus::Cancelled.to_string(),
            }),
            ReservationStatus::Pending | ReservationStatus::Active => {
                self.close(reservation, ReservationStatus::Cancelled).await
            }
        }
    }

    /// Expires every open reservation past its deadline. Failures on one
    /// reservation do not stop the sweep. Returns the number expired.
    pub async fn expire_batch(&self) -> Result<usize, PaymentError> {
        let now = Utc::now();
        let expired = self.store.list_expired(now).await?;
        let mut count = 0;
        for reservation in expired {
            let id = reservation.id;
            match self.close(reservation, ReservationStatus::Expired).await {
                Ok(_) => count += 1,
                Err(e) => {
                    warn!(reservation = %id, error = %e, "Failed to expire reservation")
                }
            }
        }
        if count > 0 {
            info!(count, "Expired reservations");
        }
        Ok(count)
    }

    /// Closes the reservation with `target` status, then releases the hold.
    ///
    /// The terminal write is a compare-and-set: of two closers racing on the
    /// same snapshot, only the one whose write lands releases the hold. The
    /// loser gets an invalid-transition error against the settled state.
    async fn close(
        &self,
        mut reservation: UsageReservation,
        target: ReservationStatus,
    ) -> Result<UsageReservation, PaymentError> {
        let user_id = reservation.user_id.clone();
        let credits = reservation.credits_reserved;
        let id = reservation.id;
        reservation.transition(target)?;
        let Some(reservation) = self.store.update_if_open(reservation).await? else {
            let settled = self
                .store
                .get(&id)
                .await?
                .ok_or_else(|| PaymentError::ReservationNotFound(id.to_string()))?;
            warn!(
                reservation = %id,
                status = %settled.status,
                "Reservation settled concurrently, skipping close"
            );
            return Err(PaymentError::InvalidStatusTransition {
                from: settled.status.to_string(),
                to: target.to_string(),
            });
        };
        self.wallet.release(&user_id, credits).await?;
        info!(reservation = %reservation.id, status = %reservation.status, "Reservation closed");
        Ok(reservation)
    }
}
