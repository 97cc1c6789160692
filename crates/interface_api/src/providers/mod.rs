//! Outbound provider adapters
//!
//! HTTP implementations of the payment domain's checkout and refund ports.
//! Both providers share the retry discipline: transient upstream statuses
//! (429, 502, 503, 504) get a bounded number of retries with exponential
//! backoff, auth failures and other 4xx never retry.

pub mod stripe;
pub mod paypal;

use tracing::{debug, warn};

use core_kernel::{AdapterConfig, PortError};

/// Upstream statuses worth one more try
const TRANSIENT_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Sends a request, retrying transient upstream failures with backoff
pub(crate) async fn send_with_retries<F, Fut>(
    config: &AdapterConfig,
    service: &str,
    send: F,
) -> Result<reqwest::Response, PortError>
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
                            message: format!("{service} API returned {status}"),
                        },
                        _ => PortError::connection(format!("{service} API returned {status}")),
                    });
                }
                warn!(attempt, status, service, "Provider API returned transient status");
                status == 429
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!(attempt, error = %e, service, "Provider API request failed transiently");
                false
            }
            Err(e) => {
                return Err(PortError::Connection {
                    message: format!("{service} API request failed"),
                    source: Some(Box::new(e)),
                })
            }
        };

        if attempt >= config.max_retries {
            return Err(PortError::ServiceUnavailable {
                service: service.to_string(),
            });
        }
        let delay = config.backoff_ms(attempt, rate_limited);
        debug!(attempt, delay_ms = delay, service, "Retrying provider API call");
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        attempt += 1;
    }
}

/// Builds a reqwest client with the adapter's timeout applied
pub(crate) fn http_client(config: &AdapterConfig) -> Result<reqwest::Client, PortError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(config.timeout_ms))
        .build()
        .map_err(|e| PortError::Internal {
            message: "failed to build HTTP client".to_string(),
            source: Some(Box::new(e)),
        })
}

/// Formats cents as the decimal string PayPal's API expects ("10.00")
pub(crate) fn cents_to_decimal(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_format() {
        assert_eq!(cents_to_decimal(1000), "10.00");
        assert_eq!(cents_to_decimal(999), "9.99");
        assert_eq!(cents_to_decimal(5), "0.05");
    }
}
