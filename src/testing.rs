//! In-crate fakes for every external collaborator (spec §9 "mocked service
//! interfaces" redesign flag), playing the role the teacher's manual stub
//! structs and `mockall`-style fakes play in its own test suite. Used by
//! this crate's own unit tests and available to a host crate under the
//! `testing` feature for its own integration tests.

use crate::model::{AuthSession, ClaimMap, ClientInfo, ConsentDecision, PendingConsent};
use crate::provider::{ClientInfoProvider, ConsentProvider, IssuerProvider, SessionProvider, UserAuthenticator, UserInfoProvider};
use crate::signer::JwtSigner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// A clock pinned to one instant, advanced explicitly by tests.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard = *guard + delta;
    }
}

impl crate::time::TimeSource for FixedClock {
    fn utc_now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// An HMAC-backed `Signer` suitable for tests (no key provisioning needed).
pub fn hmac_test_signer(secret: &[u8]) -> JwtSigner {
    JwtSigner::from_hmac_secret(secret)
}

/// An in-memory client registry, grounded on the same in-process-map idiom
/// as `store::InMemoryStore`.
#[derive(Default)]
pub struct FakeClientRegistry {
    clients: Mutex<HashMap<String, ClientInfo>>,
}

impl FakeClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: ClientInfo) {
        self.clients.lock().unwrap().insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientInfoProvider for FakeClientRegistry {
    async fn find_client(&self, client_id: &str) -> anyhow::Result<Option<ClientInfo>> {
        Ok(self.clients.lock().unwrap().get(client_id).cloned())
    }
}

/// An in-memory session store keyed by a caller-chosen "browser session key"
/// (the same key a real host would derive from a login cookie).
#[derive(Default)]
pub struct FakeSessionStore {
    by_browser: Mutex<HashMap<String, Vec<AuthSession>>>,
    by_id: Mutex<HashMap<String, String>>,
}

impl FakeSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, browser_session_key: &str, session: AuthSession) {
        self.by_id
            .lock()
            .unwrap()
            .insert(session.session_id.clone(), browser_session_key.to_string());
        self.by_browser
            .lock()
            .unwrap()
            .entry(browser_session_key.to_string())
            .or_default()
            .push(session);
    }
}

#[async_trait]
impl SessionProvider for FakeSessionStore {
    async fn list_sessions(&self, browser_session_key: &str) -> anyhow::Result<Vec<AuthSession>> {
        Ok(self
            .by_browser
            .lock()
            .unwrap()
            .get(browser_session_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_session(&self, session: &AuthSession) -> anyhow::Result<()> {
        let browser_key = self
            .by_id
            .lock()
            .unwrap()
            .get(&session.session_id)
            .cloned()
            .unwrap_or_else(|| session.session_id.clone());
        let mut by_browser = self.by_browser.lock().unwrap();
        let sessions = by_browser.entry(browser_key.clone()).or_default();
        if let Some(existing) = sessions.iter_mut().find(|s| s.session_id == session.session_id) {
            *existing = session.clone();
        } else {
            sessions.push(session.clone());
        }
        self.by_id.lock().unwrap().insert(session.session_id.clone(), browser_key);
        Ok(())
    }

    async fn destroy_session(&self, session_id: &str) -> anyhow::Result<()> {
        if let Some(browser_key) = self.by_id.lock().unwrap().remove(session_id) {
            if let Some(sessions) = self.by_browser.lock().unwrap().get_mut(&browser_key) {
                sessions.retain(|s| s.session_id != session_id);
            }
        }
        Ok(())
    }
}

/// A consent provider whose decision per `(client_id, subject)` pair is set
/// up by the test; defaults to granting everything requested.
#[derive(Default)]
pub struct FakeConsentProvider {
    pending: Mutex<HashMap<(String, String), PendingConsent>>,
}

impl FakeConsentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_consent(&self, client_id: &str, subject: &str, pending: PendingConsent) {
        self.pending
            .lock()
            .unwrap()
            .insert((client_id.to_string(), subject.to_string()), pending);
    }
}

#[async_trait]
impl ConsentProvider for FakeConsentProvider {
    async fn evaluate(
        &self,
        client_id: &str,
        session: &AuthSession,
        requested_scope: &[String],
        requested_resources: &[String],
    ) -> anyhow::Result<ConsentDecision> {
        let key = (client_id.to_string(), session.subject.clone());
        match self.pending.lock().unwrap().get(&key) {
            Some(pending) => Ok(ConsentDecision {
                granted_scopes: Vec::new(),
                granted_resources: Vec::new(),
                pending: pending.clone(),
            }),
            None => Ok(ConsentDecision {
                granted_scopes: requested_scope.to_vec(),
                granted_resources: requested_resources.to_vec(),
                pending: PendingConsent::default(),
            }),
        }
    }
}

/// A password-grant authenticator backed by an in-memory credential map.
#[derive(Default)]
pub struct FakeUserAuthenticator {
    credentials: Mutex<HashMap<(String, String), AuthSession>>,
}

impl FakeUserAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, username: &str, password: &str, session: AuthSession) {
        self.credentials
            .lock()
            .unwrap()
            .insert((username.to_string(), password.to_string()), session);
    }
}

#[async_trait]
impl UserAuthenticator for FakeUserAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> anyhow::Result<Option<AuthSession>> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .get(&(username.to_string(), password.to_string()))
            .cloned())
    }
}

/// A userinfo provider backed by an in-memory claim map.
#[derive(Default)]
pub struct FakeUserInfoProvider {
    claims: Mutex<HashMap<String, ClaimMap>>,
}

impl FakeUserInfoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subject: &str, claims: ClaimMap) {
        self.claims.lock().unwrap().insert(subject.to_string(), claims);
    }
}

#[async_trait]
impl UserInfoProvider for FakeUserInfoProvider {
    async fn claims(&self, subject: &str, claim_names: &[String]) -> anyhow::Result<Option<ClaimMap>> {
        let all = self.claims.lock().unwrap().get(subject).cloned();
        Ok(all.map(|claims| {
            if claim_names.is_empty() {
                claims
            } else {
                claims
                    .into_iter()
                    .filter(|(k, _)| claim_names.iter().any(|n| n == k))
                    .collect()
            }
        }))
    }
}

/// A fixed issuer URI.
pub struct FixedIssuer(pub String);

impl IssuerProvider for FixedIssuer {
    fn issuer(&self) -> &str {
        &self.0
    }
}
