//! Reconciliation report types and provider status normalization

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, PaymentId};
use domain_payments::{PaymentStatus, Provider};

/// One payment as reported by the provider's listing API or export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPaymentRecord {
    pub provider_payment_id: String,
    pub amount_cents: i64,
    pub currency: Option<Currency>,
    /// Provider status string, verbatim
    pub status: String,
}

/// Amount disagreement beyond tolerance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountDiscrepancy {
    pub payment_id: PaymentId,
    pub provider_payment_id: String,
    pub internal_amount_cents: i64,
    pub provider_amount_cents: i64,
}

/// Status disagreement after normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDiscrepancy {
    pub payment_id: PaymentId,
    pub provider_payment_id: String,
    pub internal_status: PaymentStatus,
    /// Normalized provider status; `None` means the provider status string
    /// could not be mapped, which is itself a discrepancy
    pub provider_status: Option<PaymentStatus>,
    pub provider_status_raw: String,
}

/// Outcome of one reconciliation run. Purely descriptive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub matched: Vec<PaymentId>,
    /// Provider knows these, we have no payment row for them
    pub missing_in_db: Vec<String>,
    /// We consider these settled, the provider listing does not include them
    pub missing_in_provider: Vec<PaymentId>,
    pub amount_discrepancies: Vec<AmountDiscrepancy>,
    pub status_discrepancies: Vec<StatusDiscrepancy>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.missing_in_db.is_empty()
            && self.missing_in_provider.is_empty()
            && self.amount_discrepancies.is_empty()
            && self.status_discrepancies.is_empty()
    }
}

/// Rounding differences of a single cent are not worth a page
pub const AMOUNT_TOLERANCE_CENTS: i64 = 1;

/// Maps a provider's status vocabulary onto our payment statuses.
///
/// Returns `None` for non-definitive or unknown statuses; callers treat
/// that as a status discrepancy rather than guessing.
pub fn normalize_provider_status(provider: Provider, status: &str) -> Option<PaymentStatus> {
    let status = status.to_ascii_lowercase();
    match provider {
        Provider::Stripe => match status.as_str() {
            "succeeded" | "paid" | "complete" => Some(PaymentStatus::Succeeded),
            "failed" | "canceled" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            "pending" | "processing" | "requires_payment_method" | "requires_action" => {
                Some(PaymentStatus::Pending)
            }
            _ => None,
        },
        Provider::PayPal => match status.as_str() {
            "completed" => Some(PaymentStatus::Succeeded),
            "declined" | "denied" | "failed" => Some(PaymentStatus::Failed),
            "refunded" | "partially_refunded" => Some(PaymentStatus::Refunded),
            "pending" | "created" | "approved" => Some(PaymentStatus::Pending),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_status_table() {
        assert_eq!(
            normalize_provider_status(Provider::Stripe, "succeeded"),
            Some(PaymentStatus::Succeeded)
        );
        assert_eq!(
            normalize_provider_status(Provider::Stripe, "Processing"),
            Some(PaymentStatus::Pending)
        );
        assert_eq!(normalize_provider_status(Provider::Stripe, "disputed"), None);
    }

    #[test]
    fn paypal_status_table() {
        assert_eq!(
            normalize_provider_status(Provider::PayPal, "COMPLETED"),
            Some(PaymentStatus::Succeeded)
        );
        assert_eq!(
            normalize_provider_status(Provider::PayPal, "DENIED"),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(normalize_provider_status(Provider::PayPal, "weird"), None);
    }
}
