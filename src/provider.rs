//! The narrow external-collaborator traits from spec §6, generalized from
//! the teacher's `SessionHandler` trait shape
//! (`app/services/session/mod.rs`) and its `ClientService`/`ScopeService`
//! lookup call shapes (spec §9 "mocked service interfaces" redesign flag:
//! every collaborator becomes a small interface with a fake for tests).

use crate::model::{AuthSession, ClientInfo, ConsentDecision};
use async_trait::async_trait;

/// `(client_id) -> ClientInfo?` (spec §6).
#[async_trait]
pub trait ClientInfoProvider: Send + Sync {
    async fn find_client(&self, client_id: &str) -> anyhow::Result<Option<ClientInfo>>;
}

/// Enumerates a subject's (or browser's) currently live sessions, and
/// persists the sign-in tick from spec §4.1 step 6.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn list_sessions(&self, browser_session_key: &str) -> anyhow::Result<Vec<AuthSession>>;
    async fn save_session(&self, session: &AuthSession) -> anyhow::Result<()>;
    async fn destroy_session(&self, session_id: &str) -> anyhow::Result<()>;
}

/// `(request, session) -> {granted, pending}` (spec §6).
#[async_trait]
pub trait ConsentProvider: Send + Sync {
    async fn evaluate(
        &self,
        client_id: &str,
        session: &AuthSession,
        requested_scope: &[String],
        requested_resources: &[String],
    ) -> anyhow::Result<ConsentDecision>;
}

/// `(username,password) -> AuthSession?`, consulted only by the `password`
/// grant (spec §6).
#[async_trait]
pub trait UserAuthenticator: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> anyhow::Result<Option<AuthSession>>;
}

/// `(subject, claim_names) -> claim_map?` (spec §6).
#[async_trait]
pub trait UserInfoProvider: Send + Sync {
    async fn claims(
        &self,
        subject: &str,
        claim_names: &[String],
    ) -> anyhow::Result<Option<crate::model::ClaimMap>>;
}

/// `() -> issuer_uri` (spec §6).
pub trait IssuerProvider: Send + Sync {
    fn issuer(&self) -> &str;
}

/// The bundle of collaborators a pipeline needs. Grouping them lets a
/// pipeline constructor take one argument instead of five, mirroring how
/// the teacher threads a single `&DbPool` through its services.
pub struct Services<'a> {
    pub clients: &'a dyn ClientInfoProvider,
    pub sessions: &'a dyn SessionProvider,
    pub consent: &'a dyn ConsentProvider,
    pub user_authenticator: &'a dyn UserAuthenticator,
    pub user_info: &'a dyn UserInfoProvider,
    pub issuer: &'a dyn IssuerProvider,
    pub store: &'a dyn crate::store::KVStore,
    pub signer: &'a dyn crate::signer::Signer,
    pub clock: &'a dyn crate::time::TimeSource,
}
