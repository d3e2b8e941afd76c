//! Test helpers for the auth core integration tests.
//!
//! Provides a scriptable in-memory identity provider.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use storefront_auth::{
    IdentityProvider, Principal, ProviderError, ProvisionedSecret, Role, SecurityEvent, Session,
    SessionChange, TotpEngine,
};

/// Scriptable identity provider backed by in-memory maps.
pub struct MockProvider {
    session: Mutex<Result<Option<Session>, ProviderError>>,
    profiles: Mutex<HashMap<String, Result<Principal, ProviderError>>>,
    roles: Mutex<HashMap<String, Result<Role, ProviderError>>>,
    secrets: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<SessionChange>,
    profile_gate: Mutex<Option<Arc<Notify>>>,
    engine: TotpEngine,
    /// Events shipped through the audit sink.
    pub events: Mutex<Vec<SecurityEvent>>,
    /// Number of profile fetches served.
    pub profile_fetches: AtomicUsize,
    /// Number of role fetches served.
    pub role_fetches: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(Ok(None)),
            profiles: Mutex::new(HashMap::new()),
            roles: Mutex::new(HashMap::new()),
            secrets: Mutex::new(HashMap::new()),
            changes,
            profile_gate: Mutex::new(None),
            engine: TotpEngine::new("Storefront"),
            events: Mutex::new(Vec::new()),
            profile_fetches: AtomicUsize::new(0),
            role_fetches: AtomicUsize::new(0),
        }
    }

    /// Set the persisted session returned by `get_session`.
    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = Ok(session);
    }

    /// Make `get_session` fail.
    pub fn fail_session(&self, err: ProviderError) {
        *self.session.lock().unwrap() = Err(err);
    }

    /// Register a profile, keyed by its principal ID, and mirror its role
    /// into the role store.
    pub fn set_profile(&self, principal: Principal) {
        self.roles
            .lock()
            .unwrap()
            .insert(principal.id.clone(), Ok(principal.role));
        self.profiles
            .lock()
            .unwrap()
            .insert(principal.id.clone(), Ok(principal));
    }

    /// Make profile fetches for one principal fail.
    pub fn fail_profile(&self, principal_id: &str, err: ProviderError) {
        self.profiles
            .lock()
            .unwrap()
            .insert(principal_id.to_string(), Err(err));
    }

    /// Make role fetches for one principal fail.
    pub fn fail_role(&self, principal_id: &str, err: ProviderError) {
        self.roles
            .lock()
            .unwrap()
            .insert(principal_id.to_string(), Err(err));
    }

    /// Hold every subsequent profile fetch until the returned gate is
    /// notified.
    pub fn gate_profile_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.profile_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Emit a session-change notification to subscribers.
    pub fn emit(&self, change: SessionChange) {
        // A send error just means nobody is subscribed
        let _ = self.changes.send(change);
    }

    /// Events recorded so far.
    pub fn recorded_events(&self) -> Vec<SecurityEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        self.session.lock().unwrap().clone()
    }

    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn fetch_profile(&self, principal_id: &str) -> Result<Principal, ProviderError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);

        let gate = self.profile_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.profiles
            .lock()
            .unwrap()
            .get(principal_id)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::NotFound("profile".to_string())))
    }

    async fn fetch_role(&self, principal_id: &str) -> Result<Role, ProviderError> {
        self.role_fetches.fetch_add(1, Ordering::SeqCst);

        self.roles
            .lock()
            .unwrap()
            .get(principal_id)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::NotFound("role".to_string())))
    }

    async fn generate_2fa_secret(
        &self,
        principal_id: &str,
    ) -> Result<ProvisionedSecret, ProviderError> {
        let provisioned = self
            .engine
            .generate_secret(principal_id)
            .map_err(|e| ProviderError::Backend(e.to_string()))?;
        self.secrets
            .lock()
            .unwrap()
            .insert(principal_id.to_string(), provisioned.secret.clone());
        Ok(provisioned)
    }

    async fn verify_2fa(
        &self,
        _principal_id: &str,
        secret: &str,
        code: &str,
    ) -> Result<bool, ProviderError> {
        Ok(self.engine.verify_now(secret, code))
    }

    async fn log_security_events(&self, events: &[SecurityEvent]) -> Result<(), ProviderError> {
        self.events.lock().unwrap().extend_from_slice(events);
        Ok(())
    }
}

/// Convenience constructor for a test principal.
pub fn principal(id: &str, email: &str, role: Role) -> Principal {
    Principal::new(id, email, role)
}

/// Convenience constructor for a one-hour session.
pub fn session_for(user_id: &str) -> Session {
    Session::new(user_id, 3600).with_refresh_token("rt-test")
}
