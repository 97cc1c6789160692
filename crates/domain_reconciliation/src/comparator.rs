//! Reconciliation comparator
//!
//! Joins provider records against internal payments on the provider-side
//! payment id and classifies every row: matched, missing on one side, or
//! disagreeing in amount or status.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use domain_payments::{Payment, PaymentStatus, PaymentStore, Provider};

use crate::error::ReconciliationError;
use crate::report::{
    normalize_provider_status, AmountDiscrepancy, ProviderPaymentRecord, ReconciliationReport,
    StatusDiscrepancy, AMOUNT_TOLERANCE_CENTS,
};

/// Read-only reconciliation runner
#[derive(Clone)]
pub struct ReconciliationService {
    payment_store: Arc<dyn PaymentStore>,
}

impl ReconciliationService {
    pub fn new(payment_store: Arc<dyn PaymentStore>) -> Self {
        Self { payment_store }
    }

    /// Compares provider records against internal payments for `provider`.
    pub async fn run(
        &self,
        provider: Provider,
        provider_records: &[ProviderPaymentRecord],
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let payments = self.payment_store.list_by_provider(provider).await?;
        let report = compare(provider, provider_records, &payments);
        info!(
            provider = %provider,
            matched = report.matched.len(),
            missing_in_db = report.missing_in_db.len(),
            missing_in_provider = report.missing_in_provider.len(),
            amount_discrepancies = report.amount_discrepancies.len(),
            status_discrepancies = report.status_discrepancies.len(),
            "Reconciliation run complete"
        );
        Ok(report)
    }
}

/// Pure comparison of one provider's records against internal payments
pub fn compare(
    provider: Provider,
    provider_records: &[ProviderPaymentRecord],
    payments: &[Payment],
) -> ReconciliationReport {
    let mut report = ReconciliationReport::default();

    let by_provider_id: HashMap<&str, &Payment> = payments
        .iter()
        .filter_map(|p| {
            p.provider_payment_id
                .as_deref()
                .map(|provider_id| (provider_id, p))
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    for record in provider_records {
        seen.insert(record.provider_payment_id.as_str());
        let Some(payment) = by_provider_id.get(record.provider_payment_id.as_str()) else {
            warn!(
                provider_payment_id = %record.provider_payment_id,
                "Provider payment has no internal record"
            );
            report.missing_in_db.push(record.provider_payment_id.clone());
            continue;
        };

        let mut clean = true;

        if (record.amount_cents - payment.amount_cents).abs() > AMOUNT_TOLERANCE_CENTS {
            report.amount_discrepancies.push(AmountDiscrepancy {
                payment_id: payment.id,
                provider_payment_id: record.provider_payment_id.clone(),
                internal_amount_cents: payment.amount_cents,
                provider_amount_cents: record.amount_cents,
            });
            clean = false;
        }

        let provider_status = normalize_provider_status(provider, &record.status);
        if provider_status != Some(payment.status) {
            report.status_discrepancies.push(StatusDiscrepancy {
                payment_id: payment.id,
                provider_payment_id: record.provider_payment_id.clone(),
                internal_status: payment.status,
                provider_status,
                provider_status_raw: record.status.clone(),
            });
            clean = false;
        }

        if clean {
            report.matched.push(payment.id);
        }
    }

    // Settled money the provider no longer lists is the serious direction.
    for payment in payments {
        let settled = matches!(
            payment.status,
            PaymentStatus::Succeeded | PaymentStatus::Refunded
        );
        let listed = payment
            .provider_payment_id
            .as_deref()
            .map(|id| seen.contains(id))
            .unwrap_or(false);
        if settled && !listed {
            report.missing_in_provider.push(payment.id);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, UserId};

    fn payment(provider_id: Option<&str>, status: PaymentStatus, amount: i64) -> Payment {
        let mut p = Payment::new(
            UserId::new("user-1"),
            Provider::Stripe,
            amount,
            Currency::USD,
            100,
            format!("key-{}", provider_id.unwrap_or("none")),
        )
        .unwrap();
        p.provider_payment_id = provider_id.map(str::to_string);
        p.status = status;
        p
    }

    fn record(provider_id: &str, amount: i64, status: &str) -> ProviderPaymentRecord {
        ProviderPaymentRecord {
            provider_payment_id: provider_id.to_string(),
            amount_cents: amount,
            currency: Some(Currency::USD),
            status: status.to_string(),
        }
    }

    #[test]
    fn matching_records_match() {
        let payments = vec![payment(Some("pi_1"), PaymentStatus::Succeeded, 2999)];
        let records = vec![record("pi_1", 2999, "succeeded")];
        let report = compare(Provider::Stripe, &records, &payments);
        assert_eq!(report.matched.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn one_cent_difference_is_tolerated() {
        let payments = vec![payment(Some("pi_1"), PaymentStatus::Succeeded, 2999)];
        let records = vec![record("pi_1", 3000, "succeeded")];
        let report = compare(Provider::Stripe, &records, &payments);
        assert!(report.amount_discrepancies.is_empty());
        assert_eq!(report.matched.len(), 1);
    }

    #[test]
    fn larger_amount_difference_is_flagged() {
        let payments = vec![payment(Some("pi_1"), PaymentStatus::Succeeded, 2999)];
        let records = vec![record("pi_1", 3999, "succeeded")];
        let report = compare(Provider::Stripe, &records, &payments);
        assert_eq!(report.amount_discrepancies.len(), 1);
        assert_eq!(report.amount_discrepancies[0].provider_amount_cents, 3999);
        assert!(report.matched.is_empty());
    }

    #[test]
    fn status_difference_is_flagged() {
        let payments = vec![payment(Some("pi_1"), PaymentStatus::Succeeded, 2999)];
        let records = vec![record("pi_1", 2999, "failed")];
        let report = compare(Provider::Stripe, &records, &payments);
        assert_eq!(report.status_discrepancies.len(), 1);
        assert_eq!(
            report.status_discrepancies[0].provider_status,
            Some(PaymentStatus::Failed)
        );
    }

    #[test]
    fn unknown_provider_status_is_a_discrepancy() {
        let payments = vec![payment(Some("pi_1"), PaymentStatus::Succeeded, 2999)];
        let records = vec![record("pi_1", 2999, "disputed")];
        let report = compare(Provider::Stripe, &records, &payments);
        assert_eq!(report.status_discrepancies.len(), 1);
        assert_eq!(report.status_discrepancies[0].provider_status, None);
    }

    #[test]
    fn provider_only_record_is_missing_in_db() {
        let report = compare(Provider::Stripe, &[record("pi_9", 100, "succeeded")], &[]);
        assert_eq!(report.missing_in_db, vec!["pi_9".to_string()]);
    }

    #[test]
    fn settled_internal_payment_absent_from_provider_is_flagged() {
        let payments = vec![
            payment(Some("pi_1"), PaymentStatus::Succeeded, 2999),
            payment(Some("pi_2"), PaymentStatus::Failed, 2999),
        ];
        let report = compare(Provider::Stripe, &[], &payments);
        // Only the succeeded payment matters; a failed one the provider
        // dropped from its listing is unremarkable.
        assert_eq!(report.missing_in_provider.len(), 1);
        assert_eq!(report.missing_in_provider[0], payments[0].id);
    }

    #[test]
    fn payment_without_provider_id_is_not_matched() {
        let payments = vec![payment(None, PaymentStatus::Succeeded, 2999)];
        let report = compare(Provider::Stripe, &[], &payments);
        // Flagged as missing_in_provider; the internal audit sweep reports
        // the missing provider id itself.
        assert_eq!(report.missing_in_provider.len(), 1);
    }
}
