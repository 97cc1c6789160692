//! Provider adapter ports
//!
//! The domain talks to payment providers through these traits only. The
//! server wires real HTTP adapters; tests wire fakes that script outcomes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, PortError};

use crate::payment::Payment;

/// Provider-side checkout session, returned to the client to complete payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider-side payment/intent identifier, if assigned at session start
    pub provider_payment_id: Option<String>,
    /// Provider-side session identifier
    pub provider_session_id: Option<String>,
    /// Client secret for embedded checkout flows (Stripe)
    pub client_secret: Option<String>,
    /// Redirect URL for approval flows (PayPal)
    pub approval_url: Option<String>,
}

/// Provider-reported outcome of a refund request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRefundStatus {
    Succeeded,
    Pending,
    Failed,
}

/// A refund as executed at the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRefund {
    pub provider_refund_id: String,
    pub status: ProviderRefundStatus,
}

/// Port for starting checkout sessions at a provider
#[async_trait]
pub trait ProviderCheckoutAdapter: DomainPort {
    /// Creates a checkout session for the given payment.
    ///
    /// The payment's internal id must travel in the session metadata so the
    /// webhook pipeline can attribute events back to it.
    async fn create_checkout_session(&self, payment: &Payment)
        -> Result<CheckoutSession, PortError>;
}

/// Port for executing refunds at a provider
#[async_trait]
pub trait ProviderRefundAdapter: DomainPort {
    /// Requests a refund of `amount_cents` against the payment's provider
    /// charge. The call must be safe to retry; providers deduplicate on
    /// their side via the charge reference.
    async fn execute_refund(
        &self,
        payment: &Payment,
        amount_cents: i64,
    ) -> Result<ProviderRefund, PortError>;
}
