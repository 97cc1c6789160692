//! PayPal verification API client
//!
//! PayPal webhooks are verified by asking PayPal itself: the transmission
//! headers and event body are POSTed to `/v1/notifications/verify-webhook-signature`
//! with an OAuth bearer token. The client caches the token until shortly
//! before expiry and retries transient upstream failures (429, 502, 503,
//! 504) a bounded number of times with exponential backoff.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use core_kernel::{AdapterConfig, DomainPort, PortError};

/// Request body for verify-webhook-signature
#[derive(Debug, Clone, Serialize)]
pub struct PayPalVerifyRequest {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
    pub webhook_id: String,
    pub webhook_event: serde_json::Value,
}

/// Port for PayPal's webhook verification endpoint
#[async_trait]
pub trait PayPalVerificationApi: DomainPort {
    /// Returns PayPal's `verification_status` string (`SUCCESS`/`FAILURE`)
    async fn verify_signature(&self, request: &PayPalVerifyRequest)
        -> Result<String, PortError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verification_status: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// HTTP implementation against the live (or sandbox) PayPal API
pub struct PayPalHttpClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    config: AdapterConfig,
    token: Mutex<Option<CachedToken>>,
}

/// Upstream statuses worth one more try
const TRANSIENT_STATUSES: [u16; 4] = [429, 502, 503, 504];

impl PayPalHttpClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        config: AdapterConfig,
    ) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PortError::Internal {
                message: "failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
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
        let response = self
            .with_retries(|| {
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

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        *guard = Some(cached);
        Ok(token.access_token)
    }

    /// Sends a request, retrying transient upstream failures with backoff.
    /// Non-transient error statuses are returned as `Unauthorized` (401/403)
    /// or `Connection` errors without retry.
    async fn with_retries<F, Fut>(&self, send: F) -> Result<reqwest::Response, PortError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0u32;
        loop {
            let rate_limited = match send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if !TRANSIENT_STATUSES.contains(&status) {
                        return Err(match status {
                            401 | 403 => PortError::Unauthorized {
                                message: format!("PayPal API returned {status}"),
                            },
                            _ => PortError::connection(format!(
                                "PayPal API returned {status}"
                            )),
                        });
                    }
                    warn!(attempt, status, "PayPal API returned transient status");
                    status == 429
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(attempt, error = %e, "PayPal API request failed transiently");
                    false
                }
                Err(e) => {
                    return Err(PortError::Connection {
                        message: "PayPal API request failed".to_string(),
                        source: Some(Box::new(e)),
                    })
                }
            };

            if attempt >= self.config.max_retries {
                return Err(PortError::ServiceUnavailable {
                    service: "paypal".to_string(),
                });
            }
            let delay = self.config.backoff_ms(attempt, rate_limited);
            debug!(attempt, delay_ms = delay, "Retrying PayPal API call");
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }
}

impl DomainPort for PayPalHttpClient {}

#[async_trait]
impl PayPalVerificationApi for PayPalHttpClient {
    async fn verify_signature(
        &self,
        request: &PayPalVerifyRequest,
    ) -> Result<String, PortError> {
        let token = self.access_token().await?;
        let url = format!("{}/v1/notifications/verify-webhook-signature", self.base_url);
        let response = self
            .with_retries(|| {
                self.http
                    .post(&url)
                    .bearer_auth(&token)
                    .json(request)
                    .send()
            })
            .await?;

        let verdict: VerifyResponse =
            response.json().await.map_err(|e| PortError::Internal {
                message: "invalid verification response".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(verdict.verification_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn http_client_is_usable_as_the_verification_port() {
        let client = PayPalHttpClient::new(
            "https://api.sandbox.paypal.com",
            "client-id",
            "client-secret",
            AdapterConfig::default(),
        )
        .unwrap();
        let _port: Arc<dyn PayPalVerificationApi> = Arc::new(client);
    }
}
