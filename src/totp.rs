//! Time-based one-time-password engine and two-factor enrollment flow.
//!
//! Code derivation follows RFC 6238 (HMAC-SHA1, 6 digits, 30-second step)
//! via the `totp-rs` crate, with one step of clock-skew tolerance in each
//! direction. Provisioning URIs use the standard `otpauth://totp/...`
//! convention so any authenticator app can import the secret.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{debug, info};

/// Code length in digits.
pub const TOTP_DIGITS: usize = 6;

/// Time step in seconds.
pub const TOTP_STEP_SECS: u64 = 30;

/// Accepted clock skew, in time steps, in each direction.
pub const TOTP_SKEW: u8 = 1;

/// Two-factor errors.
///
/// Wrong and expired codes both surface as [`TotpError::InvalidCode`]; the
/// caller never learns which time step would have matched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TotpError {
    /// Submitted code did not verify.
    #[error("invalid code, try again")]
    InvalidCode,

    /// Secret is not valid base32.
    #[error("malformed shared secret")]
    MalformedSecret,

    /// Secret generation failed.
    #[error("secret generation failed: {0}")]
    SecretGeneration(String),

    /// An enrollment step was called out of order.
    #[error("enrollment is in the {actual} state, expected {expected}")]
    WrongState {
        /// State the operation requires.
        expected: &'static str,
        /// State the enrollment is actually in.
        actual: &'static str,
    },
}

/// A freshly generated shared secret and its provisioning artifact.
///
/// The secret is base32-encoded (32 characters) for manual entry; the
/// provisioning URI renders as a scannable code in authenticator apps.
/// Encrypted at-rest storage is the backing store's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedSecret {
    /// Base32-encoded shared secret.
    pub secret: String,
    /// `otpauth://totp/...` URI embedding issuer, account, and secret.
    pub provisioning_uri: String,
}

/// TOTP secret generation and code verification.
#[derive(Debug, Clone)]
pub struct TotpEngine {
    /// Issuer name embedded in provisioning URIs.
    issuer: String,
}

impl TotpEngine {
    /// Create an engine with the given issuer name.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    fn build(&self, secret_bytes: Vec<u8>, account: &str) -> Result<TOTP, TotpError> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECS,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| TotpError::SecretGeneration(e.to_string()))
    }

    /// Generate a new shared secret for the given account.
    ///
    /// # Errors
    /// Returns an error if secret generation or URI construction fails.
    pub fn generate_secret(&self, account: &str) -> Result<ProvisionedSecret, TotpError> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| TotpError::SecretGeneration(e.to_string()))?;

        let totp = self.build(secret_bytes, account)?;

        info!(account = %account, "generated two-factor secret");

        Ok(ProvisionedSecret {
            secret: totp.get_secret_base32(),
            provisioning_uri: totp.get_url(),
        })
    }

    /// Verify a submitted code against a base32 secret at the given Unix
    /// time.
    ///
    /// Accepts codes for the current time step and one step in either
    /// direction; everything else, including malformed input, is rejected
    /// without revealing which step would have matched.
    pub fn verify(&self, secret: &str, code: &str, now_unix: u64) -> bool {
        if !is_well_formed_code(code) {
            debug!("rejected malformed two-factor code");
            return false;
        }

        let Ok(secret_bytes) = Secret::Encoded(secret.to_string()).to_bytes() else {
            debug!("rejected verification against malformed secret");
            return false;
        };

        // The account label has no effect on code derivation
        let Ok(totp) = self.build(secret_bytes, "account") else {
            return false;
        };

        totp.check(code, now_unix)
    }

    /// Verify a submitted code against the current system time.
    pub fn verify_now(&self, secret: &str, code: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.verify(secret, code, now)
    }

    /// Derive the code for a secret at the given Unix time.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn code_at(&self, secret: &str, time_unix: u64) -> Result<String, TotpError> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|_| TotpError::MalformedSecret)?;
        let totp = self.build(secret_bytes, "account")?;
        Ok(totp.generate(time_unix))
    }
}

fn is_well_formed_code(code: &str) -> bool {
    code.len() == TOTP_DIGITS && code.chars().all(|c| c.is_ascii_digit())
}

/// Two-factor enrollment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentState {
    /// Secret generated; provisioning artifact displayed to the operator.
    Setup,
    /// Operator confirmed the authenticator import; awaiting a code.
    Verify,
    /// A code verified; the secret is confirmed.
    Enabled,
}

impl EnrollmentState {
    /// State name for messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentState::Setup => "setup",
            EnrollmentState::Verify => "verify",
            EnrollmentState::Enabled => "enabled",
        }
    }
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Two-factor setup flow: `Setup -> Verify -> Enabled`.
///
/// Each `submit_code` call is exactly one verification attempt; a failure
/// keeps the flow in `Verify` so the operator can retry. This component
/// does not rate-limit retries itself; callers layer a
/// [`SlidingWindowLimiter`](crate::rate_limit::SlidingWindowLimiter)
/// around it.
#[derive(Debug)]
pub struct TwoFactorEnrollment {
    account: String,
    secret: ProvisionedSecret,
    state: EnrollmentState,
}

impl TwoFactorEnrollment {
    /// Begin enrollment for an account, generating a fresh secret.
    ///
    /// # Errors
    /// Returns an error if secret generation fails.
    pub fn begin(engine: &TotpEngine, account: &str) -> Result<Self, TotpError> {
        let secret = engine.generate_secret(account)?;
        Ok(Self {
            account: account.to_string(),
            secret,
            state: EnrollmentState::Setup,
        })
    }

    /// The account this enrollment belongs to.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Current enrollment state.
    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    /// The base32 secret, for manual entry.
    pub fn secret(&self) -> &str {
        &self.secret.secret
    }

    /// The provisioning URI, for rendering as a scannable code.
    pub fn provisioning_uri(&self) -> &str {
        &self.secret.provisioning_uri
    }

    /// Whether the enrollment has reached `Enabled`.
    pub fn is_enabled(&self) -> bool {
        self.state == EnrollmentState::Enabled
    }

    /// Record that the operator has added the secret to their
    /// authenticator (`Setup -> Verify`).
    ///
    /// # Errors
    /// Returns an error unless the enrollment is in `Setup`.
    pub fn confirm_provisioned(&mut self) -> Result<(), TotpError> {
        if self.state != EnrollmentState::Setup {
            return Err(TotpError::WrongState {
                expected: "setup",
                actual: self.state.as_str(),
            });
        }
        self.state = EnrollmentState::Verify;
        Ok(())
    }

    /// Submit one verification code (`Verify -> Enabled` on success).
    ///
    /// # Errors
    /// Returns [`TotpError::WrongState`] outside `Verify`, or
    /// [`TotpError::InvalidCode`] when the code does not verify; the
    /// enrollment stays in `Verify` for another attempt.
    pub fn submit_code(
        &mut self,
        engine: &TotpEngine,
        code: &str,
        now_unix: u64,
    ) -> Result<(), TotpError> {
        if self.state != EnrollmentState::Verify {
            return Err(TotpError::WrongState {
                expected: "verify",
                actual: self.state.as_str(),
            });
        }

        if engine.verify(&self.secret.secret, code, now_unix) {
            self.state = EnrollmentState::Enabled;
            info!(account = %self.account, "two-factor enrollment enabled");
            Ok(())
        } else {
            debug!(account = %self.account, "two-factor enrollment code rejected");
            Err(TotpError::InvalidCode)
        }
    }

    /// Hand over the confirmed secret for persistence.
    ///
    /// # Errors
    /// Returns an error unless the enrollment is `Enabled`.
    pub fn into_confirmed_secret(self) -> Result<ProvisionedSecret, TotpError> {
        if self.state != EnrollmentState::Enabled {
            return Err(TotpError::WrongState {
                expected: "enabled",
                actual: self.state.as_str(),
            });
        }
        Ok(self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_010;

    fn engine() -> TotpEngine {
        TotpEngine::new("Storefront")
    }

    #[test]
    fn test_generate_secret_shape() {
        let provisioned = engine().generate_secret("shopper@example.com").unwrap();

        assert_eq!(provisioned.secret.len(), 32);
        assert!(provisioned
            .secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_provisioning_uri_convention() {
        let provisioned = engine().generate_secret("shopper@example.com").unwrap();

        assert!(provisioned.provisioning_uri.starts_with("otpauth://totp/"));
        assert!(provisioned.provisioning_uri.contains("issuer=Storefront"));
        assert!(provisioned
            .provisioning_uri
            .contains(&provisioned.secret));
    }

    #[test]
    fn test_generated_secrets_are_unique() {
        let e = engine();
        let a = e.generate_secret("a@example.com").unwrap();
        let b = e.generate_secret("a@example.com").unwrap();
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn test_verify_accepts_adjacent_time_steps() {
        let e = engine();
        let provisioned = e.generate_secret("shopper@example.com").unwrap();
        let code = e.code_at(&provisioned.secret, NOW).unwrap();

        assert!(e.verify(&provisioned.secret, &code, NOW));
        assert!(e.verify(&provisioned.secret, &code, NOW - TOTP_STEP_SECS));
        assert!(e.verify(&provisioned.secret, &code, NOW + TOTP_STEP_SECS));
    }

    #[test]
    fn test_verify_rejects_distant_time_steps() {
        let e = engine();
        let provisioned = e.generate_secret("shopper@example.com").unwrap();
        let code = e.code_at(&provisioned.secret, NOW).unwrap();

        assert!(!e.verify(&provisioned.secret, &code, NOW + 2 * TOTP_STEP_SECS));
        assert!(!e.verify(&provisioned.secret, &code, NOW - 2 * TOTP_STEP_SECS));
    }

    #[test]
    fn test_verify_rejects_malformed_codes() {
        let e = engine();
        let provisioned = e.generate_secret("shopper@example.com").unwrap();

        assert!(!e.verify(&provisioned.secret, "", NOW));
        assert!(!e.verify(&provisioned.secret, "12345", NOW));
        assert!(!e.verify(&provisioned.secret, "1234567", NOW));
        assert!(!e.verify(&provisioned.secret, "12345a", NOW));
    }

    #[test]
    fn test_verify_rejects_malformed_secret() {
        assert!(!engine().verify("not base32!!", "123456", NOW));
    }

    #[test]
    fn test_code_is_deterministic_per_step() {
        let e = engine();
        let provisioned = e.generate_secret("shopper@example.com").unwrap();

        let step_start = (NOW / TOTP_STEP_SECS) * TOTP_STEP_SECS;
        let a = e.code_at(&provisioned.secret, step_start).unwrap();
        let b = e
            .code_at(&provisioned.secret, step_start + TOTP_STEP_SECS - 1)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_enrollment_happy_path() {
        let e = engine();
        let mut enrollment = TwoFactorEnrollment::begin(&e, "shopper@example.com").unwrap();
        assert_eq!(enrollment.state(), EnrollmentState::Setup);
        assert!(!enrollment.is_enabled());

        enrollment.confirm_provisioned().unwrap();
        assert_eq!(enrollment.state(), EnrollmentState::Verify);

        let code = e.code_at(enrollment.secret(), NOW).unwrap();
        enrollment.submit_code(&e, &code, NOW).unwrap();
        assert!(enrollment.is_enabled());

        let confirmed = enrollment.into_confirmed_secret().unwrap();
        assert_eq!(confirmed.secret.len(), 32);
    }

    #[test]
    fn test_enrollment_failed_code_stays_in_verify() {
        let e = engine();
        let mut enrollment = TwoFactorEnrollment::begin(&e, "shopper@example.com").unwrap();
        enrollment.confirm_provisioned().unwrap();

        let err = enrollment.submit_code(&e, "000000", NOW).unwrap_err();
        assert_eq!(err, TotpError::InvalidCode);
        assert_eq!(enrollment.state(), EnrollmentState::Verify);

        // Retry with the right code succeeds
        let code = e.code_at(enrollment.secret(), NOW).unwrap();
        enrollment.submit_code(&e, &code, NOW).unwrap();
        assert!(enrollment.is_enabled());
    }

    #[test]
    fn test_enrollment_rejects_out_of_order_steps() {
        let e = engine();
        let mut enrollment = TwoFactorEnrollment::begin(&e, "shopper@example.com").unwrap();

        // Cannot submit a code before confirming provisioning
        let err = enrollment.submit_code(&e, "123456", NOW).unwrap_err();
        assert!(matches!(err, TotpError::WrongState { expected: "verify", .. }));

        enrollment.confirm_provisioned().unwrap();

        // Cannot confirm provisioning twice
        let err = enrollment.confirm_provisioned().unwrap_err();
        assert!(matches!(err, TotpError::WrongState { expected: "setup", .. }));
    }

    #[test]
    fn test_enrollment_secret_handover_requires_enabled() {
        let e = engine();
        let enrollment = TwoFactorEnrollment::begin(&e, "shopper@example.com").unwrap();
        assert!(enrollment.into_confirmed_secret().is_err());
    }

    #[test]
    fn test_invalid_code_message_is_uniform() {
        // Wrong code and expired code collapse to the same message
        assert_eq!(TotpError::InvalidCode.to_string(), "invalid code, try again");
    }

    #[test]
    fn test_enrollment_state_display() {
        assert_eq!(EnrollmentState::Setup.to_string(), "setup");
        assert_eq!(EnrollmentState::Verify.to_string(), "verify");
        assert_eq!(EnrollmentState::Enabled.to_string(), "enabled");
    }
}
