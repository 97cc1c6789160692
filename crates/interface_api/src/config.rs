//! API configuration
//!
//! Loaded from `PAYMENTS_`-prefixed environment variables. Provider
//! credentials are grouped per provider; a provider with no credentials
//! configured simply has no verifier and its webhook endpoint rejects
//! everything.

use serde::Deserialize;

use core_kernel::Environment;

/// Stripe credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: Option<String>,
    /// Webhook endpoint signing secret (`whsec_...`)
    pub webhook_secret: Option<String>,
    #[serde(default = "StripeConfig::default_base_url")]
    pub base_url: String,
}

impl StripeConfig {
    fn default_base_url() -> String {
        "https://api.stripe.com".to_string()
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }
}

/// PayPal credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayPalConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Webhook id registered in the PayPal dashboard
    pub webhook_id: Option<String>,
    #[serde(default = "PayPalConfig::default_base_url")]
    pub base_url: String,
}

impl PayPalConfig {
    fn default_base_url() -> String {
        "https://api-m.paypal.com".to_string()
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    #[serde(default = "ApiConfig::default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "ApiConfig::default_port")]
    pub port: u16,
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,
    /// Log level
    #[serde(default = "ApiConfig::default_log_level")]
    pub log_level: String,
    /// Credits granted to a new user on first touch; 0 disables the grant
    #[serde(default = "ApiConfig::default_welcome_credits")]
    pub welcome_credits: i64,
    /// Skip webhook signature verification. Honored only in development;
    /// everywhere else the flag is ignored and logged as a violation.
    #[serde(default)]
    pub allow_insecure_webhooks: bool,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub paypal: PayPalConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            environment: Environment::default(),
            log_level: Self::default_log_level(),
            welcome_credits: Self::default_welcome_credits(),
            allow_insecure_webhooks: false,
            stripe: StripeConfig::default(),
            paypal: PayPalConfig::default(),
        }
    }
}

impl ApiConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_welcome_credits() -> i64 {
        25
    }

    /// Loads configuration from `PAYMENTS_`-prefixed environment variables.
    ///
    /// Nested sections use double underscores:
    /// `PAYMENTS_STRIPE__SECRET_KEY`, `PAYMENTS_PAYPAL__CLIENT_ID`, ...
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("PAYMENTS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_and_secure() {
        let config = ApiConfig::default();
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.allow_insecure_webhooks);
        assert!(!config.stripe.is_configured());
        assert!(!config.paypal.is_configured());
    }
}
