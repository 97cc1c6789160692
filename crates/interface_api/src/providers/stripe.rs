//! Stripe checkout and refund adapters
//!
//! Uses the PaymentIntents API: checkout start creates an intent whose
//! metadata carries our payment and user ids so webhook events can be
//! attributed; refunds go against the intent.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use core_kernel::{AdapterConfig, DomainPort, PortError};
use domain_payments::{
    CheckoutSession, Payment, ProviderCheckoutAdapter, ProviderRefund,
    ProviderRefundAdapter, ProviderRefundStatus,
};

use super::{http_client, send_with_retries};

/// Shared Stripe API client
pub struct StripeAdapter {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    config: AdapterConfig,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
}

impl StripeAdapter {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        config: AdapterConfig,
    ) -> Result<Self, PortError> {
        Ok(Self {
            http: http_client(&config)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            config,
        })
    }
}

impl DomainPort for StripeAdapter {}

#[async_trait]
impl ProviderCheckoutAdapter for StripeAdapter {
    async fn create_checkout_session(
        &self,
        payment: &Payment,
    ) -> Result<CheckoutSession, PortError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        let currency = payment.currency.to_string().to_ascii_lowercase();
        let amount = payment.amount_cents.to_string();
        let payment_id = payment.id.to_string();
        let user_id = payment.user_id.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("metadata[payment_id]", payment_id.as_str()),
            ("metadata[user_id]", user_id.as_str()),
        ];

        let response = send_with_retries(&self.config, "stripe", || {
            self.http
                .post(&url)
                .basic_auth(&self.secret_key, None::<&str>)
                .form(&form)
                .send()
        })
        .await?;

        let intent: PaymentIntentResponse =
            response.json().await.map_err(|e| PortError::Internal {
                message: "invalid payment intent response".to_string(),
                source: Some(Box::new(e)),
            })?;

        info!(payment = %payment.id, intent = %intent.id, "Stripe payment intent created");
        Ok(CheckoutSession {
            provider_payment_id: Some(intent.id),
            provider_session_id: None,
            client_secret: intent.client_secret,
            approval_url: None,
        })
    }
}

#[async_trait]
impl ProviderRefundAdapter for StripeAdapter {
    async fn execute_refund(
        &self,
        payment: &Payment,
        amount_cents: i64,
    ) -> Result<ProviderRefund, PortError> {
        let intent_id = payment.provider_payment_id.as_deref().ok_or_else(|| {
            PortError::validation(format!(
                "payment {} has no provider payment id to refund against",
                payment.id
            ))
        })?;

        let url = format!("{}/v1/refunds", self.base_url);
        let amount = amount_cents.to_string();
        let form = [("payment_intent", intent_id), ("amount", amount.as_str())];

        let response = send_with_retries(&self.config, "stripe", || {
            self.http
                .post(&url)
                .basic_auth(&self.secret_key, None::<&str>)
                .form(&form)
                .send()
        })
        .await?;

        let refund: RefundResponse = response.json().await.map_err(|e| PortError::Internal {
            message: "invalid refund response".to_string(),
            source: Some(Box::new(e)),
        })?;

        let status = match refund.status.as_str() {
            "succeeded" => ProviderRefundStatus::Succeeded,
            "pending" | "requires_action" => ProviderRefundStatus::Pending,
            _ => ProviderRefundStatus::Failed,
        };
        info!(
            payment = %payment.id,
            refund = %refund.id,
            status = ?status,
            "Stripe refund executed"
        );
        Ok(ProviderRefund {
            provider_refund_id: refund.id,
            status,
        })
    }
}
