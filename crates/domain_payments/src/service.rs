//! Payment lifecycle service
//!
//! Orchestrates payment records against the payment store and the credit
//! ledger. Crediting happens exactly once per payment via the ledger's
//! idempotent posting; replayed success notifications are safe no-ops.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use core_kernel::{Currency, PaymentId, UserId};
use domain_ledger::{op_code, op_key, CreditService};

use crate::error::PaymentError;
use crate::payment::{Payment, PaymentStatus, Provider};
use crate::provider::CheckoutSession;
use crate::store::PaymentStore;

/// Service for the payment lifecycle
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    credits: CreditService,
}

impl PaymentService {
    pub fn new(store: Arc<dyn PaymentStore>, credits: CreditService) -> Self {
        Self { store, credits }
    }

    /// Creates a payment in `Created`, idempotent by `(user, idempotency_key)`.
    ///
    /// Returns the payment and whether this call created it.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_payment(
        &self,
        user: &UserId,
        provider: Provider,
        amount_cents: i64,
        currency: Currency,
        credits_purchased: i64,
        idempotency_key: &str,
    ) -> Result<(Payment, bool), PaymentError> {
        let payment = Payment::new(
            user.clone(),
            provider,
            amount_cents,
            currency,
            credits_purchased,
            idempotency_key,
        )?;
        let insert = self.store.insert_or_get(payment).await?;
        let created = insert.was_inserted();
        let payment = insert.into_payment();
        if created {
            info!(
                payment = %payment.id,
                user = %user,
                provider = %provider,
                amount_cents,
                "Payment created"
            );
        }
        Ok((payment, created))
    }

    pub async fn get(&self, id: &PaymentId) -> Result<Payment, PaymentError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(id.to_string()))
    }

    pub async fn find_by_provider_payment_id(
        &self,
        provider: Provider,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        Ok(self
            .store
            .find_by_provider_payment_id(provider, provider_payment_id)
            .await?)
    }

    /// Records the provider identifiers handed back at checkout start
    pub async fn attach_checkout_session(
        &self,
        id: &PaymentId,
        session: &CheckoutSession,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self.get(id).await?;
        if payment.provider_payment_id.is_none() {
            payment.provider_payment_id = session.provider_payment_id.clone();
        }
        if payment.provider_session_id.is_none() {
            payment.provider_session_id = session.provider_session_id.clone();
        }
        Ok(self.store.update(payment).await?)
    }

    /// Moves a created payment to `Pending`. Already-pending is a no-op;
    /// terminal payments are returned unchanged.
    pub async fn mark_pending(&self, id: &PaymentId) -> Result<Payment, PaymentError> {
        let mut payment = self.get(id).await?;
        if payment.status != PaymentStatus::Created {
            return Ok(payment);
        }
        payment.transition(PaymentStatus::Pending)?;
        Ok(self.store.update(payment).await?)
    }

    /// Marks a payment failed. Never touches the ledger: nothing was
    /// credited for a payment that did not succeed. Terminal payments are
    /// returned unchanged.
    pub async fn mark_failed(
        &self,
        id: &PaymentId,
        reason: Option<&str>,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self.get(id).await?;
        if payment.status.is_terminal() {
            return Ok(payment);
        }
        if payment.status == PaymentStatus::Succeeded {
            // A success already credited the wallet; a late failure event is
            // a provider inconsistency, not a state change we may apply.
            warn!(payment = %payment.id, "Failure event for succeeded payment ignored");
            return Ok(payment);
        }
        if let Some(reason) = reason {
            payment.record_error(reason);
        }
        payment.transition(PaymentStatus::Failed)?;
        info!(payment = %payment.id, reason = ?reason, "Payment failed");
        Ok(self.store.update(payment).await?)
    }

    /// Marks a payment cancelled (user abandoned checkout). Terminal
    /// payments are returned unchanged.
    pub async fn mark_cancelled(
        &self,
        id: &PaymentId,
        reason: Option<&str>,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self.get(id).await?;
        if payment.status.is_terminal() || payment.status == PaymentStatus::Succeeded {
            return Ok(payment);
        }
        if let Some(reason) = reason {
            payment.record_error(reason);
        }
        payment.transition(PaymentStatus::Cancelled)?;
        info!(payment = %payment.id, "Payment cancelled");
        Ok(self.store.update(payment).await?)
    }

    /// Applies a verified success: grants the purchased credits exactly once
    /// and moves the payment to `Succeeded`.
    ///
    /// Replays return the payment unchanged. The ledger posting and the
    /// status flip use the same idempotency key, so a crash between the two
    /// re-runs safely: the grant replays as a no-op and the flip completes.
    pub async fn apply_success(
        &self,
        id: &PaymentId,
        provider_payment_id: Option<&str>,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self.get(id).await?;

        if matches!(
            payment.status,
            PaymentStatus::Succeeded | PaymentStatus::Refunded
        ) {
            return Ok(payment);
        }
        if !payment.status.can_transition_to(PaymentStatus::Succeeded) {
            return Err(PaymentError::InvalidStatusTransition {
                from: payment.status.to_string(),
                to: PaymentStatus::Succeeded.to_string(),
            });
        }

        if payment.provider_payment_id.is_none() {
            payment.provider_payment_id = provider_payment_id.map(str::to_string);
        }

        self.credits
            .apply_credit(
                &payment.user_id,
                payment.credits_purchased,
                op_code::PURCHASE,
                &op_key::payment_success(&payment.id),
                Some(payment.id),
                json!({ "payment_id": payment.id.to_string() }),
            )
            .await?;

        payment.transition(PaymentStatus::Succeeded)?;
        info!(
            payment = %payment.id,
            credits = payment.credits_purchased,
            "Payment succeeded, credits granted"
        );
        Ok(self.store.update(payment).await?)
    }

    /// Stamps the first verified-webhook timestamp on the payment
    pub async fn record_webhook_verification(
        &self,
        id: &PaymentId,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self.get(id).await?;
        if payment.webhook_verified_at.is_none() {
            payment.record_webhook_verification(chrono::Utc::now());
            payment = self.store.update(payment).await?;
        }
        Ok(payment)
    }

    pub async fn list_for_user(&self, user: &UserId) -> Result<Vec<Payment>, PaymentError> {
        Ok(self.store.list_for_user(user).await?)
    }
}
