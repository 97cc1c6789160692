//! Refund orchestration
//!
//! A refund touches three systems that cannot be updated in one atomic step:
//! the provider (moves the money), the refund/payment records, and the credit
//! ledger (claws back credits). The orchestrator orders them so that money
//! movement is never lost:
//!
//! 1. validate against the payment and previous refunds
//! 2. execute at the provider
//! 3. record the refund idempotently
//! 4. reverse credits and update the payment
//!
//! Step 4's ledger reversal is a soft failure: once the provider refunded the
//! charge, a ledger hiccup must not abort the refund. The failure is flagged
//! on the refund record and surfaced in the outcome for manual follow-up.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use core_kernel::PaymentId;
use domain_ledger::CreditService;

use crate::error::PaymentError;
use crate::payment::{Payment, PaymentStatus, Provider};
use crate::provider::{ProviderRefundAdapter, ProviderRefundStatus};
use crate::refund::{proportional_credits, Refund, RefundStatus};
use crate::store::{PaymentStore, RefundStore};

/// Result of a refund request
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund: Refund,
    pub payment: Payment,
    /// Set when the provider refund went through but the ledger reversal
    /// failed; the amount in `refund.credits_reversed` was NOT clawed back.
    pub reversal_failure: Option<String>,
}

/// Orchestrates refunds across provider, stores, and ledger
#[derive(Clone)]
pub struct RefundOrchestrator {
    payment_store: Arc<dyn PaymentStore>,
    refund_store: Arc<dyn RefundStore>,
    credits: CreditService,
    adapters: HashMap<Provider, Arc<dyn ProviderRefundAdapter>>,
}

impl RefundOrchestrator {
    pub fn new(
        payment_store: Arc<dyn PaymentStore>,
        refund_store: Arc<dyn RefundStore>,
        credits: CreditService,
        adapters: HashMap<Provider, Arc<dyn ProviderRefundAdapter>>,
    ) -> Self {
        Self {
            payment_store,
            refund_store,
            credits,
            adapters,
        }
    }

    /// Refunds `amount_cents` of the payment, or everything still refundable
    /// when `amount_cents` is `None`. Idempotent by `idempotency_key`.
    pub async fn refund(
        &self,
        payment_id: &PaymentId,
        amount_cents: Option<i64>,
        idempotency_key: &str,
    ) -> Result<RefundOutcome, PaymentError> {
        let payment = self
            .payment_store
            .get(payment_id)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(payment_id.to_string()))?;

        // Replay fast path: same key means same refund, regardless of state.
        let previous = self.refund_store.list_for_payment(payment_id).await?;
        if let Some(existing) = previous
            .iter()
            .find(|r| r.idempotency_key == idempotency_key)
        {
            return Ok(self.outcome_for(existing.clone(), payment));
        }

        if payment.status != PaymentStatus::Succeeded {
            return Err(PaymentError::Validation(format!(
                "payment {} is {}, only succeeded payments can be refunded",
                payment.id, payment.status
            )));
        }

        let refunded_cents: i64 = previous
            .iter()
            .filter(|r| !matches!(r.status, RefundStatus::Failed | RefundStatus::Cancelled))
            .map(|r| r.amount_cents)
            .sum();
        let remaining_cents = payment.amount_cents - refunded_cents;
        let requested = amount_cents.unwrap_or(remaining_cents);

        if requested <= 0 {
            return Err(PaymentError::Validation(format!(
                "refund amount must be positive, got {requested}"
            )));
        }
        if requested > remaining_cents {
            return Err(PaymentError::Validation(format!(
                "refund of {requested} exceeds refundable remainder {remaining_cents}"
            )));
        }

        let credits_to_reverse = if requested == remaining_cents {
            payment.credits_remaining()
        } else {
            proportional_credits(&payment, requested)?
        };

        let adapter = self
            .adapters
            .get(&payment.provider)
            .ok_or_else(|| {
                PaymentError::Validation(format!(
                    "no refund adapter configured for provider {}",
                    payment.provider
                ))
            })?;
        let provider_refund = adapter
            .execute_refund(&payment, requested)
            .await
            .map_err(PaymentError::Provider)?;

        let mut refund = Refund::new(
            payment.id,
            requested,
            credits_to_reverse,
            payment.currency,
            idempotency_key,
        )?;
        refund.provider_refund_id = Some(provider_refund.provider_refund_id.clone());

        let insert = self.refund_store.insert_or_get(refund).await?;
        if !insert.was_inserted() {
            return Ok(self.outcome_for(insert.into_refund(), payment));
        }
        let refund = insert.into_refund();

        match provider_refund.status {
            ProviderRefundStatus::Succeeded => self.apply_refund_success(payment, refund).await,
            ProviderRefundStatus::Pending => {
                // Effects apply when the provider's refund webhook lands.
                info!(refund = %refund.id, "Provider refund pending");
                Ok(self.outcome_for(refund, payment))
            }
            ProviderRefundStatus::Failed => {
                let mut refund = refund;
                refund.transition(RefundStatus::Failed)?;
                let refund = self.refund_store.update(refund).await?;
                Ok(self.outcome_for(refund, payment))
            }
        }
    }

    /// Records a refund that the provider executed on its own (dispute,
    /// dashboard refund) or completed after a pending refund request.
    /// Idempotent by the provider refund id.
    pub async fn record_provider_refund(
        &self,
        payment_id: &PaymentId,
        amount_cents: i64,
        provider_refund_id: &str,
    ) -> Result<RefundOutcome, PaymentError> {
        let payment = self
            .payment_store
            .get(payment_id)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(payment_id.to_string()))?;

        if let Some(existing) = self
            .refund_store
            .find_by_provider_refund_id(provider_refund_id)
            .await?
        {
            if existing.status == RefundStatus::Pending {
                // The pending refund we initiated has now settled.
                return self.apply_refund_success(payment, existing).await;
            }
            return Ok(self.outcome_for(existing, payment));
        }

        if !matches!(
            payment.status,
            PaymentStatus::Succeeded | PaymentStatus::Refunded
        ) {
            return Err(PaymentError::Validation(format!(
                "refund event for payment {} in status {}",
                payment.id, payment.status
            )));
        }

        let credits_to_reverse = if amount_cents >= payment.amount_cents {
            payment.credits_remaining()
        } else {
            proportional_credits(&payment, amount_cents)?
        };

        let mut refund = Refund::new(
            payment.id,
            amount_cents,
            credits_to_reverse,
            payment.currency,
            format!("provider:{provider_refund_id}"),
        )?;
        refund.provider_refund_id = Some(provider_refund_id.to_string());

        let refund = self.refund_store.insert_or_get(refund).await?.into_refund();
        self.apply_refund_success(payment, refund).await
    }

    /// Applies the effects of a provider-confirmed refund: claws back
    /// credits (soft-fail), marks the refund, and updates the payment.
    async fn apply_refund_success(
        &self,
        mut payment: Payment,
        mut refund: Refund,
    ) -> Result<RefundOutcome, PaymentError> {
        if refund.status != RefundStatus::Pending {
            return Ok(self.outcome_for(refund, payment));
        }

        let mut reversal_failure = None;
        if refund.credits_reversed > 0 {
            let reversal = self
                .credits
                .reverse_credit(
                    &payment.user_id,
                    refund.credits_reversed,
                    &refund.id,
                    json!({
                        "refund_id": refund.id.to_string(),
                        "payment_id": payment.id.to_string(),
                    }),
                )
                .await;
            if let Err(e) = reversal {
                let reason = e.to_string();
                error!(
                    refund = %refund.id,
                    payment = %payment.id,
                    error = %reason,
                    "Credit reversal failed; refund proceeds, flagged for follow-up"
                );
                refund.record_reversal_failure(&reason);
                reversal_failure = Some(reason);
            }
        }

        refund.transition(RefundStatus::Refunded)?;
        let refund = self.refund_store.update(refund).await?;

        payment.add_credits_reversed(refund.credits_reversed);

        let refunded_cents: i64 = self
            .refund_store
            .list_for_payment(&payment.id)
            .await?
            .iter()
            .filter(|r| r.status == RefundStatus::Refunded)
            .map(|r| r.amount_cents)
            .sum();
        if refunded_cents >= payment.amount_cents && payment.status == PaymentStatus::Succeeded {
            payment.transition(PaymentStatus::Refunded)?;
            info!(payment = %payment.id, "Payment fully refunded");
        }
        let payment = self.payment_store.update(payment).await?;

        info!(
            refund = %refund.id,
            payment = %payment.id,
            amount_cents = refund.amount_cents,
            credits_reversed = refund.credits_reversed,
            "Refund applied"
        );
        Ok(RefundOutcome {
            refund,
            payment,
            reversal_failure,
        })
    }

    fn outcome_for(&self, refund: Refund, payment: Payment) -> RefundOutcome {
        let reversal_failure = refund
            .metadata
            .get("credit_reversal_error")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        RefundOutcome {
            refund,
            payment,
            reversal_failure,
        }
    }
}
