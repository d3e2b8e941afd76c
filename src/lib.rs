//! Authentication and access-control core for a storefront web
//! application.
//!
//! The storefront's presentation, cart, and admin screens are thin views
//! over a managed backend; this crate holds the parts that need real
//! machinery: the session lifecycle state machine, sliding-window rate
//! limiting for credential-sensitive actions, TOTP two-factor
//! verification, and the authoritative admin access gate.

pub mod audit;
pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod principal;
pub mod provider;
pub mod rate_limit;
pub mod session;
pub mod totp;
pub mod validation;

pub use audit::{AuditLog, SecurityEvent, SecurityEventKind, Severity};
pub use config::{Config, LoggingConfig, RateLimitConfig, RateLimitPolicy, TotpConfig};
pub use error::{AuthCoreError, Result};
pub use guard::{AccessDecision, AccessReason, AdminAccessGuard, ANY_ADMIN, SUPER_ADMIN_ONLY};
pub use principal::{Principal, Role, Session};
pub use provider::{IdentityProvider, ProviderError, SessionChange, SessionChangeKind};
pub use rate_limit::{RateLimiters, SlidingWindowLimiter};
pub use session::{Phase, SessionController, SessionSnapshot};
pub use totp::{
    EnrollmentState, ProvisionedSecret, TotpEngine, TotpError, TwoFactorEnrollment, TOTP_DIGITS,
    TOTP_SKEW, TOTP_STEP_SECS,
};
pub use validation::{
    sanitize_text, validate_credit_card, validate_email, validate_password, validate_phone,
    CardCheck, CardType, PasswordCheck, PasswordRule, ValidationError, MIN_PASSWORD_LENGTH,
};
