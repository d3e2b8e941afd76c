//! Session lifecycle state machine.
//!
//! The controller owns the authenticated-principal state for the process:
//! it initializes from the externally persisted session, consumes
//! session-change notifications one at a time, and exposes a read-only
//! snapshot with role-derived capability flags. The flags are advisory
//! (UI gating only); privileged mutations go through
//! [`AdminAccessGuard`](crate::guard::AdminAccessGuard).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::principal::{Principal, Role, Session};
use crate::provider::{IdentityProvider, SessionChange, SessionChangeKind};

/// Lifecycle phase of the controller.
///
/// `Uninitialized -> Initializing -> {Authenticated, Anonymous}`, and back
/// to `Uninitialized` on teardown. The `Initializing` phase doubles as the
/// one-time guard: a re-entrant `initialize` call observes a
/// non-`Uninitialized` phase and backs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session check has run yet.
    Uninitialized,
    /// The first session check is in flight.
    Initializing,
    /// A principal is signed in.
    Authenticated,
    /// No principal; the safe default state.
    Anonymous,
}

impl Phase {
    /// Phase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initializing => "initializing",
            Phase::Authenticated => "authenticated",
            Phase::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only view of the session state, rebuilt on every transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// The signed-in principal, if any.
    pub principal: Option<Principal>,
    /// Whether the initial session check is still in flight.
    pub loading: bool,
    /// Whether the controller has settled at least once.
    pub initialized: bool,
    /// Last non-fatal error surfaced by a session or profile fetch.
    pub error: Option<String>,
    /// A principal is present.
    pub is_authenticated: bool,
    /// The principal is an admin or super admin. Advisory; UI gating only.
    pub is_admin: bool,
    /// The principal is a super admin. Advisory; UI gating only.
    pub is_super_admin: bool,
}

/// Mutable controller state. Guarded by a mutex that is never held across
/// a suspension point.
#[derive(Debug)]
struct ControllerState {
    phase: Phase,
    principal: Option<Principal>,
    error: Option<String>,
}

/// Outcome of a session resolution, applied atomically under the state
/// lock.
#[derive(Debug)]
struct Resolution {
    phase: Phase,
    principal: Option<Principal>,
    error: Option<String>,
}

impl Resolution {
    fn authenticated(principal: Principal) -> Self {
        Self {
            phase: Phase::Authenticated,
            principal: Some(principal),
            error: None,
        }
    }

    fn anonymous() -> Self {
        Self {
            phase: Phase::Anonymous,
            principal: None,
            error: None,
        }
    }

    fn anonymous_with_error(message: String) -> Self {
        Self {
            phase: Phase::Anonymous,
            principal: None,
            error: Some(message),
        }
    }
}

/// Owns the authenticated-principal lifecycle.
///
/// Single-owner: nothing outside the controller mutates its state. Session
/// changes are consumed strictly in order via [`SessionController::run`];
/// results of suspended calls are applied only when the epoch captured
/// before the suspension still matches, so completions that resolve after
/// teardown (or after a newer teardown/re-init cycle) are discarded rather
/// than applied.
pub struct SessionController<P: IdentityProvider> {
    provider: Arc<P>,
    state: Mutex<ControllerState>,
    /// Bumped on teardown; stale completions compare against it at
    /// apply time.
    epoch: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl<P: IdentityProvider> SessionController<P> {
    /// Create a controller over the given provider. No session check runs
    /// until [`SessionController::initialize`].
    pub fn new(provider: Arc<P>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            provider,
            state: Mutex::new(ControllerState {
                phase: Phase::Uninitialized,
                principal: None,
                error: None,
            }),
            epoch: AtomicU64::new(0),
            shutdown_tx,
        }
    }

    /// Run the one-time session check and settle into `Authenticated` or
    /// `Anonymous`.
    ///
    /// Re-entrant calls return the current snapshot without re-running the
    /// check.
    pub async fn initialize(&self) -> SessionSnapshot {
        {
            let mut state = self.state.lock().unwrap();
            if state.phase != Phase::Uninitialized {
                debug!(phase = %state.phase, "initialize already ran; returning snapshot");
                return snapshot_of(&state);
            }
            state.phase = Phase::Initializing;
        }

        let epoch = self.epoch.load(Ordering::Acquire);

        let resolution = match self.provider.get_session().await {
            Ok(Some(session)) => self.resolve_principal(&session).await,
            Ok(None) => {
                debug!("no persisted session; settling anonymous");
                Resolution::anonymous()
            }
            Err(err) if err.is_suppressed() => {
                warn!(error = %err, "session fetch failed with suppressed error class");
                Resolution::anonymous()
            }
            Err(err) => {
                warn!(error = %err, "session fetch failed");
                Resolution::anonymous_with_error(err.to_string())
            }
        };

        self.apply(epoch, resolution);
        self.snapshot()
    }

    /// Process a single session-change notification.
    ///
    /// Recognized transitions: sign-in and token-refresh re-fetch the
    /// principal; sign-out clears it; anything else is a no-op.
    pub async fn handle_change(&self, change: SessionChange) {
        {
            let state = self.state.lock().unwrap();
            if !matches!(state.phase, Phase::Authenticated | Phase::Anonymous) {
                debug!(
                    phase = %state.phase,
                    event = %change.kind,
                    "session change ignored outside a settled state"
                );
                return;
            }
        }

        let epoch = self.epoch.load(Ordering::Acquire);

        match change.kind {
            SessionChangeKind::SignedIn | SessionChangeKind::TokenRefreshed => {
                let Some(session) = change.session else {
                    warn!(event = %change.kind, "session change without payload ignored");
                    return;
                };
                debug!(event = %change.kind, user_id = %session.user_id, "session change");
                let resolution = self.resolve_principal(&session).await;
                self.apply(epoch, resolution);
            }
            SessionChangeKind::SignedOut => {
                info!("principal signed out");
                self.apply(epoch, Resolution::anonymous());
            }
            SessionChangeKind::Unknown => {
                debug!("ignoring unrecognized session change");
            }
        }
    }

    /// Consume session changes until teardown or the provider closes the
    /// channel.
    ///
    /// Changes are processed one at a time, in delivery order.
    pub async fn run(&self, mut changes: broadcast::Receiver<SessionChange>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        if *shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("session change loop stopped");
                        break;
                    }
                }
                received = changes.recv() => match received {
                    Ok(change) => self.handle_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session change receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("session change channel closed");
                        break;
                    }
                },
            }
        }
    }

    /// Tear the controller down: stop the change loop, invalidate
    /// in-flight completions, and return to `Uninitialized`.
    pub fn shutdown(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let _ = self.shutdown_tx.send(true);

        let mut state = self.state.lock().unwrap();
        state.phase = Phase::Uninitialized;
        state.principal = None;
        state.error = None;
        info!("session controller torn down");
    }

    /// Current read-only snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        snapshot_of(&self.state.lock().unwrap())
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase
    }

    /// A principal is present.
    pub fn is_authenticated(&self) -> bool {
        self.state.lock().unwrap().principal.is_some()
    }

    /// The principal is an admin or super admin. Advisory; UI gating only.
    pub fn is_admin(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .principal
            .as_ref()
            .is_some_and(|p| p.role >= Role::Admin)
    }

    /// The principal is a super admin. Advisory; UI gating only.
    pub fn is_super_admin(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .principal
            .as_ref()
            .is_some_and(|p| p.role == Role::SuperAdmin)
    }

    /// Fetch the principal behind a session, degrading to `Anonymous` on
    /// failure.
    ///
    /// A broken profile fetch never wedges the controller: the suppressed
    /// error class settles quietly, anything else settles with a non-fatal
    /// error surfaced.
    async fn resolve_principal(&self, session: &Session) -> Resolution {
        match self.provider.fetch_profile(&session.user_id).await {
            Ok(principal) => {
                info!(
                    user_id = %principal.id,
                    role = %principal.role,
                    "principal resolved"
                );
                Resolution::authenticated(principal)
            }
            Err(err) if err.is_suppressed() => {
                warn!(
                    user_id = %session.user_id,
                    error = %err,
                    "profile fetch failed with suppressed error class"
                );
                Resolution::anonymous()
            }
            Err(err) => {
                warn!(user_id = %session.user_id, error = %err, "profile fetch failed");
                Resolution::anonymous_with_error(err.to_string())
            }
        }
    }

    /// Apply a resolution if the epoch still matches; otherwise discard it
    /// as stale.
    fn apply(&self, epoch: u64, resolution: Resolution) {
        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!("discarding stale session resolution");
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.phase = resolution.phase;
        state.principal = resolution.principal;
        state.error = resolution.error;
    }
}

fn snapshot_of(state: &ControllerState) -> SessionSnapshot {
    let role = state.principal.as_ref().map(|p| p.role);
    SessionSnapshot {
        principal: state.principal.clone(),
        loading: state.phase == Phase::Initializing,
        initialized: matches!(state.phase, Phase::Authenticated | Phase::Anonymous),
        error: state.error.clone(),
        is_authenticated: state.principal.is_some(),
        is_admin: role.is_some_and(|r| r >= Role::Admin),
        is_super_admin: role == Some(Role::SuperAdmin),
    }
}
