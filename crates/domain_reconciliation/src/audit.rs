//! Internal audit sweep
//!
//! Looks for inconsistencies that need no provider export to detect:
//! payments we consider settled but cannot point at a provider record,
//! checkouts stuck in an open status long past any plausible completion,
//! and failed payments that nevertheless received a processed success event.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use core_kernel::PaymentId;
use domain_payments::{Payment, PaymentStatus, PaymentStore, Provider};
use domain_webhooks::{EventStatus, WebhookEventStore};

use crate::error::ReconciliationError;

/// Open payments older than this are considered abandoned or stuck
pub const STALE_PAYMENT_AGE: Duration = Duration::hours(24);

/// What an internal finding points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Succeeded or Refunded without a provider payment identifier
    SettledWithoutProviderId,
    /// Created or Pending past the stale age threshold
    StaleOpenPayment,
    /// Failed payment with a processed success event on record
    FailedWithSuccessEvent,
}

/// One flagged payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalFinding {
    pub payment_id: PaymentId,
    pub kind: FindingKind,
    pub detail: String,
}

/// Outcome of one internal sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalAuditReport {
    pub findings: Vec<InternalFinding>,
    /// Payments that could not be evaluated (store errors); the sweep
    /// continues past them
    pub evaluation_failures: Vec<PaymentId>,
}

impl InternalAuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.evaluation_failures.is_empty()
    }
}

/// Read-only sweep over internal payment state
#[derive(Clone)]
pub struct InternalAudit {
    payment_store: Arc<dyn PaymentStore>,
    event_store: Arc<dyn WebhookEventStore>,
}

impl InternalAudit {
    pub fn new(
        payment_store: Arc<dyn PaymentStore>,
        event_store: Arc<dyn WebhookEventStore>,
    ) -> Self {
        Self {
            payment_store,
            event_store,
        }
    }

    /// Sweeps all payments of both providers as of `now`.
    pub async fn find_discrepancies(
        &self,
        now: DateTime<Utc>,
    ) -> Result<InternalAuditReport, ReconciliationError> {
        let mut report = InternalAuditReport::default();
        for provider in [Provider::Stripe, Provider::PayPal] {
            let payments = self.payment_store.list_by_provider(provider).await?;
            for payment in payments {
                match self.evaluate(&payment, now).await {
                    Ok(findings) => report.findings.extend(findings),
                    Err(err) => {
                        error!(
                            payment_id = %payment.id,
                            error = %err,
                            "Audit evaluation failed, continuing with remaining payments"
                        );
                        report.evaluation_failures.push(payment.id);
                    }
                }
            }
        }
        info!(
            findings = report.findings.len(),
            evaluation_failures = report.evaluation_failures.len(),
            "Internal audit sweep complete"
        );
        Ok(report)
    }

    async fn evaluate(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Vec<InternalFinding>, ReconciliationError> {
        let mut findings = Vec::new();

        let settled = matches!(
            payment.status,
            PaymentStatus::Succeeded | PaymentStatus::Refunded
        );
        if settled && payment.provider_payment_id.is_none() {
            findings.push(InternalFinding {
                payment_id: payment.id,
                kind: FindingKind::SettledWithoutProviderId,
                detail: format!("status {} with no provider payment id", payment.status),
            });
        }

        let open = matches!(
            payment.status,
            PaymentStatus::Created | PaymentStatus::Pending
        );
        if open && now - payment.created_at > STALE_PAYMENT_AGE {
            findings.push(InternalFinding {
                payment_id: payment.id,
                kind: FindingKind::StaleOpenPayment,
                detail: format!(
                    "status {} since {}",
                    payment.status,
                    payment.created_at.to_rfc3339()
                ),
            });
        }

        if payment.status == PaymentStatus::Failed {
            let events = self.event_store.list_for_payment(&payment.id).await?;
            let success_event = events.iter().find(|e| {
                e.status == EventStatus::Processed
                    && is_success_event_type(e.provider, &e.event_type)
            });
            if let Some(event) = success_event {
                findings.push(InternalFinding {
                    payment_id: payment.id,
                    kind: FindingKind::FailedWithSuccessEvent,
                    detail: format!(
                        "failed payment has processed success event {} ({})",
                        event.provider_event_id, event.event_type
                    ),
                });
            }
        }

        Ok(findings)
    }
}

/// Provider event types that announce a successful charge
fn is_success_event_type(provider: Provider, event_type: &str) -> bool {
    match provider {
        Provider::Stripe => matches!(
            event_type,
            "checkout.session.completed" | "payment_intent.succeeded" | "charge.succeeded"
        ),
        Provider::PayPal => event_type == "PAYMENT.CAPTURE.COMPLETED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_event_types() {
        assert!(is_success_event_type(
            Provider::Stripe,
            "payment_intent.succeeded"
        ));
        assert!(is_success_event_type(
            Provider::PayPal,
            "PAYMENT.CAPTURE.COMPLETED"
        ));
        assert!(!is_success_event_type(
            Provider::Stripe,
            "payment_intent.payment_failed"
        ));
        assert!(!is_success_event_type(
            Provider::PayPal,
            "PAYMENT.CAPTURE.DENIED"
        ));
    }
}
