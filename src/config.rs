//! Configuration module for the storefront auth core.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{AuthCoreError, Result};

/// Rate limit policy for one action class.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitPolicy {
    /// Maximum attempts allowed in the time window.
    pub max_attempts: u32,
    /// Time window in seconds.
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// Create a new rate limit policy.
    pub fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window_secs,
        }
    }

    /// The time window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate limiting configuration.
///
/// Authentication and checkout actions are limited independently; the two
/// policies never share attempt state.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Policy for credential-sensitive actions (login, password reset).
    #[serde(default = "default_auth_policy")]
    pub auth: RateLimitPolicy,
    /// Policy for checkout actions.
    #[serde(default = "default_checkout_policy")]
    pub checkout: RateLimitPolicy,
}

fn default_auth_policy() -> RateLimitPolicy {
    // 5 attempts per 15 minutes
    RateLimitPolicy::new(5, 15 * 60)
}

fn default_checkout_policy() -> RateLimitPolicy {
    // 3 attempts per 5 minutes
    RateLimitPolicy::new(3, 5 * 60)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth: default_auth_policy(),
            checkout: default_checkout_policy(),
        }
    }
}

/// TOTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TotpConfig {
    /// Issuer name embedded in provisioning URIs.
    #[serde(default = "default_totp_issuer")]
    pub issuer: String,
}

fn default_totp_issuer() -> String {
    "Storefront".to_string()
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: default_totp_issuer(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Console-only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// TOTP configuration.
    #[serde(default)]
    pub totp: TotpConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(AuthCoreError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AuthCoreError::Config(format!("config parse error: {e}")))
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - Any rate limit policy has zero attempts or a zero window
    /// - The TOTP issuer is empty
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in [("auth", self.rate_limit.auth), ("checkout", self.rate_limit.checkout)]
        {
            if policy.max_attempts == 0 {
                return Err(AuthCoreError::Config(format!(
                    "rate_limit.{name}.max_attempts must be positive"
                )));
            }
            if policy.window_secs == 0 {
                return Err(AuthCoreError::Config(format!(
                    "rate_limit.{name}.window_secs must be positive"
                )));
            }
        }

        if self.totp.issuer.trim().is_empty() {
            return Err(AuthCoreError::Config(
                "totp.issuer must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.rate_limit.auth.max_attempts, 5);
        assert_eq!(config.rate_limit.auth.window_secs, 900);
        assert_eq!(config.rate_limit.checkout.max_attempts, 3);
        assert_eq!(config.rate_limit.checkout.window_secs, 300);

        assert_eq!(config.totp.issuer, "Storefront");

        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_parse_empty_string() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.rate_limit.auth.max_attempts, 5);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(
            r#"
            [totp]
            issuer = "Acme Shop"

            [rate_limit.auth]
            max_attempts = 10
            window_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.totp.issuer, "Acme Shop");
        assert_eq!(config.rate_limit.auth.max_attempts, 10);
        assert_eq!(config.rate_limit.auth.window_secs, 60);
        // Unspecified sections keep their defaults
        assert_eq!(config.rate_limit.checkout.max_attempts, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = Config::parse("this is not toml = [");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_attempts() {
        let config = Config::parse(
            r#"
            [rate_limit.checkout]
            max_attempts = 0
            window_secs = 300
            "#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("checkout.max_attempts"));
    }

    #[test]
    fn test_validate_zero_window() {
        let config = Config::parse(
            r#"
            [rate_limit.auth]
            max_attempts = 5
            window_secs = 0
            "#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auth.window_secs"));
    }

    #[test]
    fn test_validate_empty_issuer() {
        let config = Config::parse(
            r#"
            [totp]
            issuer = "  "
            "#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [totp]
            issuer = "Test Shop"
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.totp.issuer, "Test Shop");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/config.toml");
        assert!(matches!(result, Err(AuthCoreError::Io(_))));
    }

    #[test]
    fn test_policy_window() {
        let policy = RateLimitPolicy::new(5, 900);
        assert_eq!(policy.window(), Duration::from_secs(900));
    }
}
