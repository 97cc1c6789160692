//! Ports and Adapters Infrastructure
//!
//! Foundational types for the ports-and-adapters pattern used across the
//! domain modules. Each domain defines its own store and adapter traits
//! (`LedgerStore`, `PaymentStore`, `ProviderRefundAdapter`, ...) that depend
//! only on this crate; infrastructure crates supply the implementations.
//!
//! All port implementations report failures through [`PortError`] so callers
//! can classify them uniformly, in particular whether a failure is transient
//! and worth retrying.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error type for port operations
///
/// Provides a unified error type that all port implementations must use,
/// ensuring consistent error handling across stores and external adapters.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The operation conflicts with existing data
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// Authentication or authorization failed
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    /// Rate limit exceeded for external API
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        retry_after_secs: u64,
    },

    /// The external system is unavailable
    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        service: String,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. }
                | PortError::Timeout { .. }
                | PortError::RateLimited { .. }
                | PortError::ServiceUnavailable { .. }
        )
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker trait for all domain ports
///
/// All port traits should extend this marker to ensure they are
/// thread-safe and can be used in async contexts.
pub trait DomainPort: Send + Sync + 'static {}

/// Configuration for an external adapter
///
/// Covers the retry behavior shared by outbound HTTP adapters: timeouts,
/// a bounded number of retries for transient failures, and an exponential
/// backoff base. Rate-limited responses back off with a larger base delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Connection/request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Retry delay in milliseconds (exponential backoff base)
    pub retry_delay_ms: u64,
    /// Retry delay in milliseconds when rate limited
    pub rate_limit_delay_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 1,
            retry_delay_ms: 500,
            rate_limit_delay_ms: 2_000,
        }
    }
}

impl AdapterConfig {
    /// Backoff delay before retry `attempt` (0-based) of a transient failure.
    pub fn backoff_ms(&self, attempt: u32, rate_limited: bool) -> u64 {
        let base = if rate_limited {
            self.rate_limit_delay_ms
        } else {
            self.retry_delay_ms
        };
        base.saturating_mul(2u64.saturating_pow(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_not_found() {
        let error = PortError::not_found("Payment", "PAY-123");
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert!(error.to_string().contains("Payment"));
        assert!(error.to_string().contains("PAY-123"));
    }

    #[test]
    fn test_port_error_transient() {
        let timeout = PortError::Timeout {
            operation: "verify_webhook_signature".to_string(),
            duration_ms: 5000,
        };
        assert!(timeout.is_transient());

        let rate_limited = PortError::RateLimited {
            retry_after_secs: 60,
        };
        assert!(rate_limited.is_transient());

        let validation = PortError::validation("Invalid amount");
        assert!(!validation.is_transient());
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let config = AdapterConfig::default();
        assert_eq!(config.backoff_ms(0, false), 500);
        assert_eq!(config.backoff_ms(1, false), 1000);
        assert_eq!(config.backoff_ms(0, true), 2000);
    }
}
