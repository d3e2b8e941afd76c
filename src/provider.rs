//! External identity provider interface.
//!
//! The storefront delegates session storage, profile data, and role
//! persistence to a managed backend. This module defines the async trait
//! the core consumes, the session-change events the backend emits, and the
//! backend error taxonomy.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::audit::SecurityEvent;
use crate::principal::{Principal, Role, Session};
use crate::totp::ProvisionedSecret;

/// Identity provider (backend) errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend's row-access policy recursed while resolving a profile.
    ///
    /// A known backend failure mode that resolves on its own; suppressed
    /// from user-facing surfaces while the caller still settles into its
    /// safe default state.
    #[error("profile policy recursion")]
    PolicyRecursion,

    /// Requested record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl ProviderError {
    /// Whether this error class is suppressed from user-facing error
    /// surfaces.
    ///
    /// This is an explicit allowlist, not a catch-all: only
    /// [`ProviderError::PolicyRecursion`] qualifies.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, ProviderError::PolicyRecursion)
    }
}

/// Kind of session-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChangeKind {
    /// A principal signed in.
    SignedIn,
    /// The current principal signed out.
    SignedOut,
    /// The session token was rotated.
    TokenRefreshed,
    /// Anything the core does not recognize; processed as a no-op.
    Unknown,
}

impl SessionChangeKind {
    /// Parse a provider event name.
    ///
    /// Unrecognized names map to [`SessionChangeKind::Unknown`].
    pub fn parse(name: &str) -> Self {
        match name {
            "signed_in" => SessionChangeKind::SignedIn,
            "signed_out" => SessionChangeKind::SignedOut,
            "token_refreshed" => SessionChangeKind::TokenRefreshed,
            _ => SessionChangeKind::Unknown,
        }
    }

    /// Event name as emitted by the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionChangeKind::SignedIn => "signed_in",
            SessionChangeKind::SignedOut => "signed_out",
            SessionChangeKind::TokenRefreshed => "token_refreshed",
            SessionChangeKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SessionChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A session-change notification, with the optional session payload the
/// provider attaches.
#[derive(Debug, Clone)]
pub struct SessionChange {
    /// What happened.
    pub kind: SessionChangeKind,
    /// Session payload, when the event carries one.
    pub session: Option<Session>,
}

impl SessionChange {
    /// A sign-in event carrying the new session.
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: SessionChangeKind::SignedIn,
            session: Some(session),
        }
    }

    /// A sign-out event.
    pub fn signed_out() -> Self {
        Self {
            kind: SessionChangeKind::SignedOut,
            session: None,
        }
    }

    /// A token-refresh event carrying the rotated session.
    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: SessionChangeKind::TokenRefreshed,
            session: Some(session),
        }
    }
}

/// The externally-managed identity backend.
///
/// Every method that crosses the network is a suspension point; the core
/// never assumes ordering between two independently issued calls. Timeouts
/// are the implementation's responsibility and surface here as errors.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the current externally-managed session, if any.
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Subscribe to session-change notifications.
    ///
    /// Events are delivered in the order the provider emits them. Dropping
    /// the receiver is the unsubscribe.
    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange>;

    /// Fetch the profile for a principal.
    async fn fetch_profile(&self, principal_id: &str) -> Result<Principal, ProviderError>;

    /// Fetch a principal's role from the source of truth.
    ///
    /// Used for authoritative access checks; never served from a cache.
    async fn fetch_role(&self, principal_id: &str) -> Result<Role, ProviderError>;

    /// Generate a two-factor secret for a principal.
    async fn generate_2fa_secret(
        &self,
        principal_id: &str,
    ) -> Result<ProvisionedSecret, ProviderError>;

    /// Verify a two-factor code against a principal's secret.
    async fn verify_2fa(
        &self,
        principal_id: &str,
        secret: &str,
        code: &str,
    ) -> Result<bool, ProviderError>;

    /// Ship security events to the audit sink.
    ///
    /// Callers treat this as fire-and-forget; a failure here must never
    /// block the action that produced the events.
    async fn log_security_events(&self, events: &[SecurityEvent]) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_parse() {
        assert_eq!(
            SessionChangeKind::parse("signed_in"),
            SessionChangeKind::SignedIn
        );
        assert_eq!(
            SessionChangeKind::parse("signed_out"),
            SessionChangeKind::SignedOut
        );
        assert_eq!(
            SessionChangeKind::parse("token_refreshed"),
            SessionChangeKind::TokenRefreshed
        );
    }

    #[test]
    fn test_change_kind_parse_unrecognized() {
        assert_eq!(
            SessionChangeKind::parse("password_recovery"),
            SessionChangeKind::Unknown
        );
        assert_eq!(SessionChangeKind::parse(""), SessionChangeKind::Unknown);
    }

    #[test]
    fn test_change_kind_round_trip() {
        for kind in [
            SessionChangeKind::SignedIn,
            SessionChangeKind::SignedOut,
            SessionChangeKind::TokenRefreshed,
        ] {
            assert_eq!(SessionChangeKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_change_constructors() {
        let session = Session::new("u1", 3600);

        let change = SessionChange::signed_in(session.clone());
        assert_eq!(change.kind, SessionChangeKind::SignedIn);
        assert!(change.session.is_some());

        let change = SessionChange::signed_out();
        assert_eq!(change.kind, SessionChangeKind::SignedOut);
        assert!(change.session.is_none());

        let change = SessionChange::token_refreshed(session);
        assert_eq!(change.kind, SessionChangeKind::TokenRefreshed);
        assert!(change.session.is_some());
    }

    #[test]
    fn test_suppression_allowlist() {
        assert!(ProviderError::PolicyRecursion.is_suppressed());
        assert!(!ProviderError::Unavailable("down".to_string()).is_suppressed());
        assert!(!ProviderError::Backend("boom".to_string()).is_suppressed());
        assert!(!ProviderError::NotFound("profile".to_string()).is_suppressed());
    }

    #[test]
    fn test_provider_error_display() {
        assert_eq!(
            ProviderError::NotFound("profile".to_string()).to_string(),
            "profile not found"
        );
        assert_eq!(
            ProviderError::PolicyRecursion.to_string(),
            "profile policy recursion"
        );
    }
}
