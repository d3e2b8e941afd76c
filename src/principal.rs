//! Principal and session models for the storefront auth core.
//!
//! This module defines the Principal struct, the Role enum, and the
//! externally-managed Session binding a principal to the current process.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Principal role for permission management.
///
/// Roles are ordered by privilege so that `>=` comparisons express
/// "at least this role".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular storefront customer.
    #[default]
    User = 0,
    /// Store administrator.
    Admin = 1,
    /// Super administrator (full control, including role changes).
    SuperAdmin = 2,
}

impl Role {
    /// Convert role to its canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Check if this role has at least the required permission level.
    ///
    /// # Examples
    ///
    /// ```
    /// use storefront_auth::Role;
    ///
    /// assert!(Role::SuperAdmin.can_access(Role::Admin));
    /// assert!(Role::Admin.can_access(Role::Admin));
    /// assert!(!Role::User.can_access(Role::Admin));
    /// ```
    pub fn can_access(&self, required: Role) -> bool {
        *self >= required
    }

    /// Normalize an arbitrary role string into a canonical role.
    ///
    /// The backing store has carried both `super_admin` and `superadmin`
    /// spellings over time; both map to [`Role::SuperAdmin`]. Anything
    /// unrecognized (including empty input) maps to the least-privileged
    /// role.
    ///
    /// # Examples
    ///
    /// ```
    /// use storefront_auth::Role;
    ///
    /// assert_eq!(Role::normalize("super_admin"), Role::SuperAdmin);
    /// assert_eq!(Role::normalize("superadmin"), Role::SuperAdmin);
    /// assert_eq!(Role::normalize("moderator"), Role::User);
    /// ```
    pub fn normalize(input: &str) -> Role {
        match input.trim().to_lowercase().as_str() {
            "super_admin" | "superadmin" | "super-admin" => Role::SuperAdmin,
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Identity of an authenticated user, as held by the external identity
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Unique principal ID assigned by the identity provider.
    pub id: String,
    /// Email address (unique).
    pub email: String,
    /// Display name (optional).
    pub display_name: Option<String>,
    /// Role for permission checks.
    #[serde(default)]
    pub role: Role,
    /// Avatar image reference (optional).
    pub avatar_url: Option<String>,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last profile update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Create a principal with minimal required fields.
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            role,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Check if this principal is an administrator (admin or super admin).
    pub fn is_admin(&self) -> bool {
        self.role >= Role::Admin
    }

    /// Check if this principal is a super administrator.
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

/// A time-bounded credential binding a principal to the current process.
///
/// Sessions are issued and stored by the external identity provider; the
/// core only reads them. A session ceases to be current on sign-out,
/// expiry, or explicit invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// ID of the principal this session belongs to.
    pub user_id: String,
    /// When the session was issued.
    pub issued_at: DateTime<Utc>,
    /// When the session expires (absolute).
    pub expires_at: DateTime<Utc>,
    /// Refresh token, present while the session can still be rotated.
    pub refresh_token: Option<String>,
}

impl Session {
    /// Create a session valid for the given number of seconds from now.
    pub fn new(user_id: impl Into<String>, valid_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(valid_secs),
            refresh_token: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Check if the session has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the session can be refreshed.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}
