//! Authoritative role checks for privileged operations.
//!
//! Unlike the session controller's cached, advisory flags, the guard
//! re-fetches the current session and the principal's role from the source
//! of truth on every check. It is the gate in front of every privileged
//! mutation handler.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::{AuditLog, SecurityEvent, SecurityEventKind};
use crate::principal::Role;
use crate::provider::IdentityProvider;

/// Required-role set for "any admin" operations.
pub const ANY_ADMIN: &[Role] = &[Role::Admin, Role::SuperAdmin];

/// Required-role set for super-admin-only operations.
pub const SUPER_ADMIN_ONLY: &[Role] = &[Role::SuperAdmin];

/// Why an access check resolved the way it did.
///
/// Denial reasons are distinct so callers can render different messaging:
/// an unauthenticated visitor gets a login redirect, an authenticated user
/// with the wrong role gets a permission message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// Access granted.
    Granted,
    /// No active session.
    NotAuthenticated,
    /// The session lookup itself failed.
    SessionLookupFailed,
    /// The role lookup failed.
    ProfileLookupFailed,
    /// Authenticated, but the role is not in the required set.
    InsufficientRole,
}

impl AccessReason {
    /// Reason as a short identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessReason::Granted => "granted",
            AccessReason::NotAuthenticated => "not_authenticated",
            AccessReason::SessionLookupFailed => "session_lookup_failed",
            AccessReason::ProfileLookupFailed => "profile_lookup_failed",
            AccessReason::InsufficientRole => "insufficient_role",
        }
    }

    /// Human-readable message for the caller to display.
    pub fn message(&self) -> &'static str {
        match self {
            AccessReason::Granted => "access granted",
            AccessReason::NotAuthenticated => "please sign in to continue",
            AccessReason::SessionLookupFailed => "could not verify your session",
            AccessReason::ProfileLookupFailed => "could not verify your permissions",
            AccessReason::InsufficientRole => "you do not have permission to do this",
        }
    }
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether access is granted.
    pub granted: bool,
    /// The principal's role, when it could be determined.
    pub role: Option<Role>,
    /// Why.
    pub reason: AccessReason,
}

impl AccessDecision {
    fn granted(role: Role) -> Self {
        Self {
            granted: true,
            role: Some(role),
            reason: AccessReason::Granted,
        }
    }

    fn denied(reason: AccessReason, role: Option<Role>) -> Self {
        Self {
            granted: false,
            role,
            reason,
        }
    }
}

/// Authoritative gate for role-gated actions.
///
/// Every check settles into a decision; lookup failures deny rather than
/// leaving the caller indeterminate.
pub struct AdminAccessGuard<P: IdentityProvider> {
    provider: Arc<P>,
    audit: Option<AuditLog<P>>,
}

impl<P: IdentityProvider + 'static> AdminAccessGuard<P> {
    /// Create a guard over the given provider.
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            audit: None,
        }
    }

    /// Record insufficient-privilege denials through the audit sink.
    pub fn with_audit(mut self, audit: AuditLog<P>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Check whether the current principal's role is in the required set.
    ///
    /// Both the session and the role are re-fetched from the source of
    /// truth on every call; cached role claims are never trusted here.
    pub async fn validate_access(&self, required: &[Role]) -> AccessDecision {
        let session = match self.provider.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("access check without an active session");
                return AccessDecision::denied(AccessReason::NotAuthenticated, None);
            }
            Err(err) => {
                warn!(error = %err, "session lookup failed during access check");
                return AccessDecision::denied(AccessReason::SessionLookupFailed, None);
            }
        };

        let role = match self.provider.fetch_role(&session.user_id).await {
            Ok(role) => role,
            Err(err) => {
                warn!(
                    user_id = %session.user_id,
                    error = %err,
                    "role lookup failed during access check"
                );
                return AccessDecision::denied(AccessReason::ProfileLookupFailed, None);
            }
        };

        if required.contains(&role) {
            debug!(user_id = %session.user_id, role = %role, "access granted");
            return AccessDecision::granted(role);
        }

        warn!(
            user_id = %session.user_id,
            role = %role,
            "insufficient privilege for role-gated action"
        );

        if let Some(audit) = &self.audit {
            audit.record(
                SecurityEvent::new(SecurityEventKind::PrivilegeDenied, &session.user_id)
                    .with_context(serde_json::json!({ "role": role.as_str() })),
            );
        }

        AccessDecision::denied(AccessReason::InsufficientRole, Some(role))
    }

    /// Check for admin or super admin.
    pub async fn require_admin(&self) -> AccessDecision {
        self.validate_access(ANY_ADMIN).await
    }

    /// Check for super admin only.
    pub async fn require_super_admin(&self) -> AccessDecision {
        self.validate_access(SUPER_ADMIN_ONLY).await
    }
}
