//! Webhook signature verification
//!
//! Every provider verifies differently, so the verifier is a tagged enum
//! with one variant per scheme plus a development-only bypass:
//!
//! - **Stripe**: HMAC-SHA256 over `"{timestamp}.{raw_body}"` with the
//!   endpoint secret, constant-time comparison, bounded timestamp skew
//! - **PayPal**: remote verification through PayPal's
//!   `verify-webhook-signature` API; only an explicit `SUCCESS` verdict
//!   passes
//! - **Insecure**: accepts everything; constructible only when the
//!   environment allows it, never in production
//!
//! All paths fail closed: a missing header, unparseable signature, stale
//! timestamp, or an indeterminate remote verdict rejects the event.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

use core_kernel::Environment;

use crate::error::WebhookError;
use crate::paypal_api::{PayPalVerificationApi, PayPalVerifyRequest};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age/skew of a Stripe signature timestamp
pub const STRIPE_TOLERANCE_SECS: i64 = 300;

/// Request headers, lowercased names. The HTTP layer builds this so the
/// domain stays framework-free.
pub type Headers = HashMap<String, String>;

/// Signature verifier for one provider endpoint
#[derive(Clone)]
pub enum WebhookVerifier {
    Stripe(StripeVerifier),
    PayPal(PayPalVerifier),
    /// Development-only: skips verification entirely
    Insecure,
}

impl WebhookVerifier {
    pub fn stripe(endpoint_secret: impl Into<String>) -> Self {
        WebhookVerifier::Stripe(StripeVerifier::new(endpoint_secret))
    }

    pub fn paypal(api: Arc<dyn PayPalVerificationApi>, webhook_id: impl Into<String>) -> Self {
        WebhookVerifier::PayPal(PayPalVerifier::new(api, webhook_id))
    }

    /// Builds the insecure bypass, but only where the environment permits.
    ///
    /// Outside development the flag is a configuration error: it is ignored,
    /// logged at error level, and `None` forces the caller to configure a
    /// real verifier.
    pub fn insecure(environment: Environment) -> Option<Self> {
        if environment.allows_insecure_webhooks() {
            warn!("Webhook signature verification DISABLED (development bypass)");
            Some(WebhookVerifier::Insecure)
        } else {
            error!(
                %environment,
                "Insecure webhook bypass requested outside development; ignoring"
            );
            None
        }
    }

    /// Verifies the raw request. `Ok(())` means the event may be trusted.
    pub async fn verify(&self, headers: &Headers, body: &[u8]) -> Result<(), WebhookError> {
        match self {
            WebhookVerifier::Stripe(v) => v.verify(headers, body),
            WebhookVerifier::PayPal(v) => v.verify(headers, body).await,
            WebhookVerifier::Insecure => {
                warn!("Accepting webhook without signature verification");
                Ok(())
            }
        }
    }
}

/// Stripe endpoint-secret HMAC verification
#[derive(Clone)]
pub struct StripeVerifier {
    endpoint_secret: String,
    tolerance_secs: i64,
}

impl StripeVerifier {
    pub fn new(endpoint_secret: impl Into<String>) -> Self {
        Self {
            endpoint_secret: endpoint_secret.into(),
            tolerance_secs: STRIPE_TOLERANCE_SECS,
        }
    }

    #[cfg(test)]
    fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies a `Stripe-Signature` header of the form
    /// `t=<unix>,v1=<hex>[,v1=<hex>...]` against the raw body.
    pub fn verify(&self, headers: &Headers, body: &[u8]) -> Result<(), WebhookError> {
        let header = headers
            .get("stripe-signature")
            .ok_or_else(|| WebhookError::missing_header("stripe-signature"))?;

        let (timestamp, candidates) = parse_stripe_signature_header(header)?;

        let now = chrono::Utc::now().timestamp();
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(WebhookError::invalid_signature(format!(
                "timestamp outside tolerance ({}s)",
                self.tolerance_secs
            )));
        }

        let mut signed_payload = Vec::with_capacity(body.len() + 16);
        signed_payload.extend_from_slice(timestamp.to_string().as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(body);

        for candidate in &candidates {
            let Ok(candidate_bytes) = hex::decode(candidate) else {
                continue;
            };
            let mut mac = HmacSha256::new_from_slice(self.endpoint_secret.as_bytes())
                .map_err(|_| WebhookError::invalid_signature("invalid endpoint secret"))?;
            mac.update(&signed_payload);
            // verify_slice is constant-time
            if mac.verify_slice(&candidate_bytes).is_ok() {
                return Ok(());
            }
        }

        Err(WebhookError::invalid_signature(
            "no v1 signature matched the payload",
        ))
    }
}

/// Parses `t=<unix>,v1=<hex>,...`, collecting every v1 candidate
fn parse_stripe_signature_header(header: &str) -> Result<(i64, Vec<String>), WebhookError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    WebhookError::invalid_signature("unparseable timestamp")
                })?);
            }
            Some(("v1", value)) => candidates.push(value.to_string()),
            _ => {} // unknown schemes (v0, ...) are ignored
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| WebhookError::invalid_signature("missing timestamp"))?;
    if candidates.is_empty() {
        return Err(WebhookError::invalid_signature("missing v1 signature"));
    }
    Ok((timestamp, candidates))
}

/// Headers PayPal signs every webhook delivery with
const PAYPAL_REQUIRED_HEADERS: [&str; 5] = [
    "paypal-transmission-id",
    "paypal-transmission-time",
    "paypal-transmission-sig",
    "paypal-cert-url",
    "paypal-auth-algo",
];

/// PayPal remote-authority verification
#[derive(Clone)]
pub struct PayPalVerifier {
    api: Arc<dyn PayPalVerificationApi>,
    webhook_id: String,
}

impl PayPalVerifier {
    pub fn new(api: Arc<dyn PayPalVerificationApi>, webhook_id: impl Into<String>) -> Self {
        Self {
            api,
            webhook_id: webhook_id.into(),
        }
    }

    /// Sends the transmission headers and event body to PayPal's
    /// verify-webhook-signature API. Anything but an explicit `SUCCESS`
    /// verdict is a rejection.
    pub async fn verify(&self, headers: &Headers, body: &[u8]) -> Result<(), WebhookError> {
        let mut required = HashMap::new();
        for name in PAYPAL_REQUIRED_HEADERS {
            let value = headers
                .get(name)
                .ok_or_else(|| WebhookError::missing_header(name))?;
            required.insert(name, value.as_str());
        }

        let webhook_event: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::Malformed(format!("invalid JSON body: {e}")))?;

        let request = PayPalVerifyRequest {
            transmission_id: required["paypal-transmission-id"].to_string(),
            transmission_time: required["paypal-transmission-time"].to_string(),
            transmission_sig: required["paypal-transmission-sig"].to_string(),
            cert_url: required["paypal-cert-url"].to_string(),
            auth_algo: required["paypal-auth-algo"].to_string(),
            webhook_id: self.webhook_id.clone(),
            webhook_event,
        };

        let verdict = self
            .api
            .verify_signature(&request)
            .await
            .map_err(WebhookError::Verification)?;

        if verdict == "SUCCESS" {
            Ok(())
        } else {
            Err(WebhookError::invalid_signature(format!(
                "verification_status was {verdict}"
            )))
        }
    }
}
