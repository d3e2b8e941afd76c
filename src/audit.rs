//! Security event records and the fire-and-forget audit shipper.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::provider::{IdentityProvider, ProviderError};

/// Severity of a security event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of security-relevant occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// A login attempt failed.
    LoginFailed,
    /// A rate limiter denied an action.
    RateLimitTripped,
    /// A two-factor code failed verification.
    TwoFactorFailed,
    /// A role-gated action was denied for insufficient privilege.
    PrivilegeDenied,
    /// A session was explicitly invalidated.
    SessionRevoked,
}

impl SecurityEventKind {
    /// Event kind as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::LoginFailed => "login_failed",
            SecurityEventKind::RateLimitTripped => "rate_limit_tripped",
            SecurityEventKind::TwoFactorFailed => "two_factor_failed",
            SecurityEventKind::PrivilegeDenied => "privilege_denied",
            SecurityEventKind::SessionRevoked => "session_revoked",
        }
    }

    /// Default severity for this kind of event.
    pub fn default_severity(&self) -> Severity {
        match self {
            SecurityEventKind::LoginFailed => Severity::Medium,
            SecurityEventKind::RateLimitTripped => Severity::High,
            SecurityEventKind::TwoFactorFailed => Severity::High,
            SecurityEventKind::PrivilegeDenied => Severity::High,
            SecurityEventKind::SessionRevoked => Severity::Low,
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable audit record of a security-relevant occurrence.
///
/// Events are append-only: built once, shipped, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// What happened.
    pub kind: SecurityEventKind,
    /// How bad it is.
    pub severity: Severity,
    /// Identifier of the affected subject (email, principal ID, IP).
    pub subject: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Free-form context.
    pub context: serde_json::Value,
}

impl SecurityEvent {
    /// Create an event with the kind's default severity and no context.
    pub fn new(kind: SecurityEventKind, subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity: kind.default_severity(),
            subject: subject.into(),
            timestamp: Utc::now(),
            context: serde_json::Value::Null,
        }
    }

    /// Override the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach free-form context.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Fire-and-forget shipper for security events.
///
/// Delivery failures are logged and swallowed; the action that produced an
/// event is never blocked or failed by the sink.
pub struct AuditLog<P: IdentityProvider> {
    provider: Arc<P>,
}

impl<P: IdentityProvider> Clone for AuditLog<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<P: IdentityProvider + 'static> AuditLog<P> {
    /// Create a shipper over the given provider.
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Ship one event in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn record(&self, event: SecurityEvent) {
        let provider = self.provider.clone();
        tokio::spawn(async move {
            if let Err(err) = provider
                .log_security_events(std::slice::from_ref(&event))
                .await
            {
                warn!(
                    error = %err,
                    kind = %event.kind,
                    subject = %event.subject,
                    "failed to deliver security event"
                );
            }
        });
    }

    /// Ship a batch and wait for the result.
    ///
    /// For callers that need delivery confirmation (e.g. before tearing
    /// down).
    pub async fn record_now(&self, events: &[SecurityEvent]) -> Result<(), ProviderError> {
        self.provider.log_security_events(events).await
    }
}
