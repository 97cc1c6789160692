//! PayPal checkout and refund adapters
//!
//! Checkout start creates an order whose `custom_id` carries our payment and
//! user ids; the client completes approval at the returned URL and PayPal
//! reports the capture via webhook. Refunds go against the capture id the
//! capture webhook recorded on the payment.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use core_kernel::{AdapterConfig, DomainPort, PortError};
use domain_payments::{
    CheckoutSession, Payment, ProviderCheckoutAdapter, ProviderRefund,
    ProviderRefundAdapter, ProviderRefundStatus,
};

use super::{cents_to_decimal, http_client, send_with_retries};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct OrderLink {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<OrderLink>,
}

#[derive(Debug, Deserialize)]
struct CaptureRefundResponse {
    id: String,
    status: String,
}

/// Shared PayPal API client for orders and refunds
pub struct PayPalAdapter {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    config: AdapterConfig,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalAdapter {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        config: AdapterConfig,
    ) -> Result<Self, PortError> {
        Ok(Self {
            http: http_client(&config)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            config,
            token: Mutex::new(None),
        })
    }

    /// Returns a valid bearer token, refreshing when the cached one is
    /// absent or expires within the next minute.
    async fn access_token(&self) -> Result<String, PortError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("Fetching PayPal OAuth token");
        let url = format!("{}/v1/oauth2/token", self.base_url);
        let response = send_with_retries(&self.config, "paypal", || {
            self.http
                .post(&url)
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&[("grant_type", "client_credentials")])
                .send()
        })
        .await?;

        let token: TokenResponse = response.json().await.map_err(|e| PortError::Internal {
            message: "invalid token response".to_string(),
            source: Some(Box::new(e)),
        })?;

        *guard = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        Ok(token.access_token)
    }
}

impl DomainPort for PayPalAdapter {}

#[async_trait]
impl ProviderCheckoutAdapter for PayPalAdapter {
    async fn create_checkout_session(
        &self,
        payment: &Payment,
    ) -> Result<CheckoutSession, PortError> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/checkout/orders", self.base_url);
        let custom_id = json!({
            "payment_id": payment.id.to_string(),
            "user_id": payment.user_id.to_string(),
        })
        .to_string();
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": custom_id,
                "amount": {
                    "currency_code": payment.currency.to_string(),
                    "value": cents_to_decimal(payment.amount_cents),
                },
            }],
        });

        let response = send_with_retries(&self.config, "paypal", || {
            self.http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
        })
        .await?;

        let order: OrderResponse = response.json().await.map_err(|e| PortError::Internal {
            message: "invalid order response".to_string(),
            source: Some(Box::new(e)),
        })?;

        let approval_url = order
            .links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone());

        info!(payment = %payment.id, order = %order.id, "PayPal order created");
        Ok(CheckoutSession {
            provider_payment_id: None,
            provider_session_id: Some(order.id),
            client_secret: None,
            approval_url,
        })
    }
}

#[async_trait]
impl ProviderRefundAdapter for PayPalAdapter {
    async fn execute_refund(
        &self,
        payment: &Payment,
        amount_cents: i64,
    ) -> Result<ProviderRefund, PortError> {
        let capture_id = payment.provider_payment_id.as_deref().ok_or_else(|| {
            PortError::validation(format!(
                "payment {} has no capture id to refund against",
                payment.id
            ))
        })?;

        let token = self.access_token().await?;
        let url = format!("{}/v2/payments/captures/{capture_id}/refund", self.base_url);
        let body = json!({
            "amount": {
                "currency_code": payment.currency.to_string(),
                "value": cents_to_decimal(amount_cents),
            },
        });

        let response = send_with_retries(&self.config, "paypal", || {
            self.http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
        })
        .await?;

        let refund: CaptureRefundResponse =
            response.json().await.map_err(|e| PortError::Internal {
                message: "invalid refund response".to_string(),
                source: Some(Box::new(e)),
            })?;

        let status = match refund.status.as_str() {
            "COMPLETED" => ProviderRefundStatus::Succeeded,
            "PENDING" => ProviderRefundStatus::Pending,
            _ => ProviderRefundStatus::Failed,
        };
        info!(
            payment = %payment.id,
            refund = %refund.id,
            status = ?status,
            "PayPal refund executed"
        );
        Ok(ProviderRefund {
            provider_refund_id: refund.id,
            status,
        })
    }
}
