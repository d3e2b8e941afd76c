//! Sliding-window rate limiting for credential-sensitive actions.
//!
//! Tracks attempts per identifier (email, IP+action, etc.) and denies
//! requests beyond the configured maximum within a trailing time window.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::{Config, RateLimitPolicy};

/// Per-identifier attempt state.
///
/// Owned exclusively by the limiter; never handed out.
#[derive(Debug, Clone, Copy)]
struct AttemptWindow {
    /// Attempts counted in the current window.
    count: u32,
    /// Timestamp of the last counted attempt.
    last_attempt: Instant,
}

/// Sliding-window attempt limiter keyed by an arbitrary string identifier.
///
/// Instances are constructed explicitly and dependency-injected; each
/// carries its own `(max_attempts, window)` fixed at construction, so tests
/// and independent policies get isolated state.
///
/// # Example
///
/// ```
/// use storefront_auth::SlidingWindowLimiter;
/// use std::time::Duration;
///
/// let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
///
/// assert!(limiter.is_allowed("shopper@example.com"));
/// assert!(limiter.is_allowed("shopper@example.com"));
/// assert!(limiter.is_allowed("shopper@example.com"));
/// assert!(!limiter.is_allowed("shopper@example.com"));
/// ```
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    /// Maximum attempts allowed in the window.
    max_attempts: u32,
    /// Sliding time window.
    window: Duration,
    /// Per-identifier attempt windows.
    windows: RwLock<HashMap<String, AttemptWindow>>,
}

impl SlidingWindowLimiter {
    /// Create a new limiter with the given maximum and window.
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Create a limiter from a configured policy.
    pub fn from_policy(policy: &RateLimitPolicy) -> Self {
        Self::new(policy.max_attempts, policy.window())
    }

    /// Check whether an attempt is allowed for the identifier, counting it
    /// if so.
    ///
    /// The check-then-count is a single critical section per call, so
    /// concurrent callers with the same identifier cannot squeeze more than
    /// `max_attempts` approvals out of one window.
    pub fn is_allowed(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.write().unwrap();

        match windows.get_mut(identifier) {
            None => {
                windows.insert(
                    identifier.to_string(),
                    AttemptWindow {
                        count: 1,
                        last_attempt: now,
                    },
                );
                true
            }
            Some(window) => {
                if now.duration_since(window.last_attempt) > self.window {
                    // Window expired: start a fresh one
                    window.count = 1;
                    window.last_attempt = now;
                    true
                } else if window.count >= self.max_attempts {
                    // Denied attempts are not counted and do not slide the window
                    warn!(
                        identifier = %identifier,
                        count = window.count,
                        "rate limit exceeded"
                    );
                    false
                } else {
                    window.count += 1;
                    window.last_attempt = now;
                    true
                }
            }
        }
    }

    /// Time until the identifier is allowed again.
    ///
    /// Zero when no window exists or the identifier is below the maximum.
    pub fn remaining_time(&self, identifier: &str) -> Duration {
        let windows = self.windows.read().unwrap();

        match windows.get(identifier) {
            Some(window) if window.count >= self.max_attempts => {
                let elapsed = window.last_attempt.elapsed();
                if elapsed >= self.window {
                    Duration::ZERO
                } else {
                    self.window - elapsed
                }
            }
            _ => Duration::ZERO,
        }
    }

    /// Number of counted attempts for the identifier within the window.
    pub fn attempt_count(&self, identifier: &str) -> u32 {
        let windows = self.windows.read().unwrap();

        match windows.get(identifier) {
            Some(window) if window.last_attempt.elapsed() <= self.window => window.count,
            _ => 0,
        }
    }

    /// Clear the window for an identifier (call after a successful login).
    pub fn clear(&self, identifier: &str) {
        let mut windows = self.windows.write().unwrap();
        windows.remove(identifier);
    }

    /// Drop expired windows to bound memory growth.
    ///
    /// Call this periodically.
    pub fn cleanup(&self) {
        let mut windows = self.windows.write().unwrap();
        windows.retain(|_, w| w.last_attempt.elapsed() <= self.window);
    }
}

/// The two policy-mandated limiter instances.
///
/// Authentication and checkout are limited independently and never share
/// attempt state.
#[derive(Debug)]
pub struct RateLimiters {
    /// Limiter for credential-sensitive actions (login, password reset).
    pub auth: SlidingWindowLimiter,
    /// Limiter for checkout actions.
    pub checkout: SlidingWindowLimiter,
}

impl RateLimiters {
    /// Create the limiters with policy defaults.
    ///
    /// Defaults:
    /// - Auth: 5 attempts per 15 minutes
    /// - Checkout: 3 attempts per 5 minutes
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Create the limiters from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth: SlidingWindowLimiter::from_policy(&config.rate_limit.auth),
            checkout: SlidingWindowLimiter::from_policy(&config.rate_limit.checkout),
        }
    }

    /// Cleanup both limiters.
    pub fn cleanup(&self) {
        self.auth.cleanup();
        self.checkout.cleanup();
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}
