//! Request/response data transfer objects
//!
//! Responses carry identifier strings (display form, e.g. `PAY-...`) and
//! never expose provider secrets or raw webhook payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use domain_ledger::{CreditTransaction, TxType};
use domain_payments::{Payment, PaymentStatus, Refund, RefundStatus, ReservationStatus, UsageReservation};
use domain_reconciliation::ProviderPaymentRecord;

/// Polling interval suggested to clients while a payment is still open
pub const STATUS_RETRY_AFTER_SECS: u64 = 3;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutStartRequest {
    /// "stripe" or "paypal"
    pub provider: String,
    /// Catalog package id; mutually exclusive with the custom pair below
    pub package_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub credits: Option<i64>,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutStartResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub credits: i64,
    /// False when the idempotency key matched an earlier checkout
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub is_final: bool,
    /// Credits granted by this payment; 0 until it succeeds
    pub credits_awarded: i64,
    /// Present only while the payment can still change on its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl PaymentStatusResponse {
    pub fn from_payment(payment: &Payment) -> Self {
        let is_final = payment.status.is_final();
        let credits_awarded = match payment.status {
            PaymentStatus::Succeeded | PaymentStatus::Refunded => payment.credits_purchased,
            _ => 0,
        };
        Self {
            payment_id: payment.id.to_string(),
            status: payment.status,
            is_final,
            credits_awarded,
            retry_after_seconds: (!is_final).then_some(STATUS_RETRY_AFTER_SECS),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    /// Amount to refund in cents; omit for a full refund of the remainder
    pub amount_cents: Option<i64>,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundResponse {
    pub refund_id: String,
    pub payment_id: String,
    pub amount_cents: i64,
    pub credits_reversed: i64,
    pub status: RefundStatus,
    pub payment_status: PaymentStatus,
    /// Set when the provider refunded but the credit clawback failed and
    /// needs manual follow-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversal_failure: Option<String>,
}

impl RefundResponse {
    pub fn new(refund: &Refund, payment: &Payment, reversal_failure: Option<String>) -> Self {
        Self {
            refund_id: refund.id.to_string(),
            payment_id: payment.id.to_string(),
            amount_cents: refund.amount_cents,
            credits_reversed: refund.credits_reversed,
            status: refund.status,
            payment_status: payment.status,
            reversal_failure,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReservationRequest {
    #[validate(range(min = 1))]
    pub credits: i64,
    #[validate(length(min = 1, max = 128))]
    pub operation_code: String,
    /// Optional override of the default 30 minute hold
    #[validate(range(min = 1, max = 86_400))]
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReservationResponse {
    pub reservation_id: String,
    pub operation_code: String,
    pub credits_reserved: i64,
    pub credits_consumed: i64,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
}

impl From<&UsageReservation> for ReservationResponse {
    fn from(r: &UsageReservation) -> Self {
        Self {
            reservation_id: r.id.to_string(),
            operation_code: r.operation_code.clone(),
            credits_reserved: r.credits_reserved,
            credits_consumed: r.credits_consumed,
            status: r.status,
            expires_at: r.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: i64,
    pub reserved: i64,
    pub spendable: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub credits_delta: i64,
    pub balance_after: i64,
    pub tx_type: TxType,
    pub operation_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            transaction_id: tx.id.to_string(),
            credits_delta: tx.credits_delta,
            balance_after: tx.balance_after,
            tx_type: tx.tx_type,
            operation_code: tx.operation_code.clone(),
            payment_id: tx.payment_id.map(|id| id.to_string()),
            reservation_id: tx.reservation_id.map(|id| id.to_string()),
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeCreditsResponse {
    /// False when the grant had already been made
    pub granted: bool,
    pub credits: i64,
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReconciliationRunRequest {
    pub provider: String,
    pub records: Vec<ProviderPaymentRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireReservationsResponse {
    pub expired: usize,
}

/// Webhook acknowledgement; providers only care about the status code, the
/// body is for operators reading logs
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
