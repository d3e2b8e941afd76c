//! Error types for the storefront auth core.

use thiserror::Error;

/// Common error type for the auth core.
///
/// Component-local errors (`ValidationError`, `TotpError`, `ProviderError`)
/// convert into this type at the crate boundary. Every failure path maps to
/// a defined safe state; nothing in this enum is fatal by design.
#[derive(Error, Debug)]
pub enum AuthCoreError {
    /// I/O error (configuration or log file handling).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// Two-factor setup or verification error.
    #[error("two-factor error: {0}")]
    TwoFactor(#[from] crate::totp::TotpError),

    /// Identity provider (backend) error.
    #[error("identity provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    /// Too many attempts for a rate-limited action.
    ///
    /// Denial is an expected outcome; the payload is the wait time in
    /// seconds for the caller to display.
    #[error("too many attempts; retry in {0} seconds")]
    RateLimited(u64),
}

/// Result type alias for auth core operations.
pub type Result<T> = std::result::Result<T, AuthCoreError>;
