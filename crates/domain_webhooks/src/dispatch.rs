//! Webhook dispatch
//!
//! The dispatcher runs the full intake pipeline for one request: verify,
//! parse, normalize, attribute to a payment, record, apply. Effects go
//! through the payment domain's idempotent operations, so replays and
//! provider retries are always safe.
//!
//! Two deliberate asymmetries:
//!
//! - Events that cannot be attributed to any payment are acknowledged and
//!   dropped, never stored. A competing system's events (or plain noise)
//!   must not create orphan records here.
//! - Anti-fraud checks run before any credit is granted: a verified event
//!   whose amount, currency, or user does not match the payment record is
//!   rejected loudly instead of credited.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use domain_payments::{
    PaymentStatus, Provider, PaymentService, RefundOrchestrator,
};

use crate::error::WebhookError;
use crate::event::{EventStatus, NormalizedWebhookEvent, StoredWebhookEvent, WebhookEventStore};
use crate::normalize::{normalize_paypal, normalize_stripe};
use crate::sanitize::sanitize_payload;
use crate::verify::{Headers, WebhookVerifier};

/// How the dispatcher handled a webhook request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Event verified, attributed, and applied
    Processed,
    /// Event already seen; effects were idempotently re-applied
    Duplicate,
    /// Event verified but intentionally not acted on
    Ignored { reason: String },
}

/// Verified webhook intake pipeline
#[derive(Clone)]
pub struct WebhookDispatcher {
    verifiers: HashMap<Provider, WebhookVerifier>,
    payments: PaymentService,
    refunds: RefundOrchestrator,
    event_store: Arc<dyn WebhookEventStore>,
}

impl WebhookDispatcher {
    pub fn new(
        verifiers: HashMap<Provider, WebhookVerifier>,
        payments: PaymentService,
        refunds: RefundOrchestrator,
        event_store: Arc<dyn WebhookEventStore>,
    ) -> Self {
        Self {
            verifiers,
            payments,
            refunds,
            event_store,
        }
    }

    /// Handles one raw webhook request for `provider`.
    pub async fn handle(
        &self,
        provider: Provider,
        headers: &Headers,
        raw_body: &[u8],
    ) -> Result<DispatchOutcome, WebhookError> {
        // Fail closed: an endpoint without a verifier accepts nothing.
        let verifier = self.verifiers.get(&provider).ok_or_else(|| {
            WebhookError::invalid_signature(format!("no verifier configured for {provider}"))
        })?;
        verifier.verify(headers, raw_body).await?;

        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| WebhookError::Malformed(format!("invalid JSON body: {e}")))?;

        let event = match provider {
            Provider::Stripe => normalize_stripe(&payload)?,
            Provider::PayPal => normalize_paypal(&payload)?,
        };
        let Some(event) = event else {
            return Ok(DispatchOutcome::Ignored {
                reason: "unhandled event type".to_string(),
            });
        };

        let Some(payment) = self.resolve_payment(&event).await? else {
            if event.is_actionable() {
                warn!(
                    provider = %provider,
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "Actionable webhook event could not be attributed to a payment; ignoring"
                );
            }
            return Ok(DispatchOutcome::Ignored {
                reason: "event not attributable to a payment".to_string(),
            });
        };

        let status = if event.is_actionable() {
            EventStatus::Processed
        } else {
            EventStatus::Ignored
        };
        let stored = StoredWebhookEvent::new(
            provider,
            event.event_id.clone(),
            event.event_type.clone(),
            payment.id,
            status,
            sanitize_payload(provider, &payload, raw_body),
        );
        let insert = self.event_store.insert_or_get(stored).await?;
        let duplicate = !insert.was_inserted();
        if duplicate {
            info!(
                event_id = %event.event_id,
                payment = %payment.id,
                "Duplicate webhook event; re-applying idempotent effects"
            );
        }

        // Effects are idempotent end to end, so duplicates re-run them
        // rather than trusting that the first delivery finished.
        self.apply(&event, &payment).await?;

        if duplicate {
            Ok(DispatchOutcome::Duplicate)
        } else {
            Ok(DispatchOutcome::Processed)
        }
    }

    /// Attributes an event to a payment: checkout metadata id first, then
    /// the provider-side payment id.
    async fn resolve_payment(
        &self,
        event: &NormalizedWebhookEvent,
    ) -> Result<Option<domain_payments::Payment>, WebhookError> {
        if let Some(id) = &event.payment_id {
            match self.payments.get(id).await {
                Ok(payment) => return Ok(Some(payment)),
                Err(domain_payments::PaymentError::PaymentNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(provider_payment_id) = &event.provider_payment_id {
            return Ok(self
                .payments
                .find_by_provider_payment_id(event.provider, provider_payment_id)
                .await?);
        }
        Ok(None)
    }

    async fn apply(
        &self,
        event: &NormalizedWebhookEvent,
        payment: &domain_payments::Payment,
    ) -> Result<(), WebhookError> {
        if event.is_success {
            self.check_event_matches(event, payment)?;
            self.payments.record_webhook_verification(&payment.id).await?;
            self.payments
                .apply_success(&payment.id, event.provider_payment_id.as_deref())
                .await?;
            return Ok(());
        }

        if event.is_failure {
            self.payments.record_webhook_verification(&payment.id).await?;
            self.payments
                .mark_failed(&payment.id, event.failure_reason.as_deref())
                .await?;
            return Ok(());
        }

        if event.is_refund {
            let amount = event.refund_amount_cents.ok_or_else(|| {
                WebhookError::Malformed("refund event without amount".to_string())
            })?;
            // Providers always assign a refund id; fall back to the event id
            // so idempotency survives a payload that omits it.
            let provider_refund_id = event
                .provider_refund_id
                .as_deref()
                .unwrap_or(&event.event_id);
            self.payments.record_webhook_verification(&payment.id).await?;
            self.refunds
                .record_provider_refund(&payment.id, amount, provider_refund_id)
                .await?;
            return Ok(());
        }

        // Milestone events (order approved, session created) move a fresh
        // payment into Pending so status polling shows progress.
        if payment.status == PaymentStatus::Created {
            self.payments.mark_pending(&payment.id).await?;
        }
        Ok(())
    }

    /// Anti-fraud equality checks between a success event and the payment
    /// record it claims to confirm. Any mismatch blocks crediting.
    fn check_event_matches(
        &self,
        event: &NormalizedWebhookEvent,
        payment: &domain_payments::Payment,
    ) -> Result<(), WebhookError> {
        if let Some(amount) = event.amount_cents {
            if amount != payment.amount_cents {
                error!(
                    payment = %payment.id,
                    expected = payment.amount_cents,
                    actual = amount,
                    "Webhook amount mismatch; refusing to credit"
                );
                return Err(WebhookError::Mismatch {
                    field: "amount",
                    expected: payment.amount_cents.to_string(),
                    actual: amount.to_string(),
                });
            }
        }
        if let Some(currency) = event.currency {
            if currency != payment.currency {
                error!(
                    payment = %payment.id,
                    expected = %payment.currency,
                    actual = %currency,
                    "Webhook currency mismatch; refusing to credit"
                );
                return Err(WebhookError::Mismatch {
                    field: "currency",
                    expected: payment.currency.to_string(),
                    actual: currency.to_string(),
                });
            }
        }
        if let Some(user_id) = &event.metadata_user_id {
            if user_id != payment.user_id.as_str() {
                error!(
                    payment = %payment.id,
                    "Webhook user mismatch; refusing to credit"
                );
                return Err(WebhookError::Mismatch {
                    field: "user",
                    expected: payment.user_id.to_string(),
                    actual: user_id.clone(),
                });
            }
        }
        Ok(())
    }
}
