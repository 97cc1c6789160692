//! Deployment environment handling
//!
//! Security-sensitive toggles (notably the insecure webhook bypass used by
//! local sandboxes) key off the environment. Production and test builds must
//! never honor them, so the check lives here rather than in each consumer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
    Test,
}

impl Environment {
    /// Returns true only for local development.
    ///
    /// Production, staging, and test environments must verify every webhook
    /// signature; a bypass flag set there is a configuration error and is
    /// ignored.
    pub fn allows_insecure_webhooks(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::Test => "test",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_development_allows_insecure_webhooks() {
        assert!(Environment::Development.allows_insecure_webhooks());
        assert!(!Environment::Production.allows_insecure_webhooks());
        assert!(!Environment::Staging.allows_insecure_webhooks());
        assert!(!Environment::Test.allows_insecure_webhooks());
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
    }
}
