//! Shared fixtures for the scenario tests in this directory: a default
//! confidential client, a `ServerConfig` pinned to the HMAC test signer, and
//! a `Services` bundle wired from `oidc_core::testing`'s fakes.

use chrono::{DateTime, Utc};
use oidc_core::config::ServerConfig;
use oidc_core::model::client::ClientTokenShaping;
use oidc_core::model::{CibaDeliveryMode, ClientInfo, GrantType, PkceMethod, ResponseType, SubjectType};
use oidc_core::provider::Services;
use oidc_core::signer::{JwtSigner, Signer, SigningAlg};
use oidc_core::testing::{
    FakeClientRegistry, FakeConsentProvider, FakeSessionStore, FakeUserAuthenticator,
    FakeUserInfoProvider, FixedClock, FixedIssuer,
};
use std::collections::HashSet;

pub const ISSUER: &str = "https://issuer.example";

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::from_env().expect("env-backed defaults always parse");
    config.issuer = ISSUER.to_string();
    config.signing_alg = SigningAlg::Hs256;
    config
}

pub fn test_signer() -> JwtSigner {
    JwtSigner::from_hmac_secret(b"integration-test-secret")
}

/// A confidential client allowed every grant/response type this crate
/// implements, PKCE-optional, HS256 throughout so it round-trips against
/// `test_signer()`.
pub fn confidential_client(client_id: &str, redirect_uri: &str) -> ClientInfo {
    ClientInfo {
        client_id: client_id.to_string(),
        secret_hash: Some(hex_sha256("shh")),
        allowed_grant_types: HashSet::from([
            GrantType::AuthorizationCode,
            GrantType::RefreshToken,
            GrantType::ClientCredentials,
            GrantType::Password,
            GrantType::Ciba,
            GrantType::DeviceCode,
        ]),
        allowed_response_types: HashSet::from([ResponseType::Code, ResponseType::Token, ResponseType::IdToken]),
        redirect_uris: vec![redirect_uri.to_string()],
        post_logout_redirect_uris: vec![],
        sector_identifier_uri: None,
        subject_type: SubjectType::Public,
        pkce_required: false,
        allowed_pkce_methods: HashSet::from([PkceMethod::S256]),
        allowed_scopes: HashSet::from(["openid".to_string(), "offline_access".to_string()]),
        offline_access_allowed: true,
        token_shaping: ClientTokenShaping {
            access_token_seconds: 3600,
            id_token_seconds: 3600,
            refresh_token_seconds: 1_209_600,
            authorization_code_seconds: 600,
            refresh_allow_reuse: false,
            refresh_absolute_seconds: 1_209_600,
            refresh_sliding_seconds: 1_209_600,
            id_token_signing_alg: SigningAlg::Hs256,
        },
        front_channel_logout_uri: None,
        front_channel_logout_requires_session_id: false,
        back_channel_logout_uri: None,
        back_channel_logout_requires_session_id: false,
        ciba_client_notification_endpoint: None,
        ciba_delivery_mode: CibaDeliveryMode::Poll,
        force_user_claims_in_id_token: false,
        allow_localhost_http: false,
    }
}

fn hex_sha256(s: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct Fixture {
    pub clients: FakeClientRegistry,
    pub sessions: FakeSessionStore,
    pub consent: FakeConsentProvider,
    pub user_authenticator: FakeUserAuthenticator,
    pub user_info: FakeUserInfoProvider,
    pub issuer: FixedIssuer,
    pub clock: FixedClock,
}

impl Fixture {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            clients: FakeClientRegistry::new(),
            sessions: FakeSessionStore::new(),
            consent: FakeConsentProvider::new(),
            user_authenticator: FakeUserAuthenticator::new(),
            user_info: FakeUserInfoProvider::new(),
            issuer: FixedIssuer(ISSUER.to_string()),
            clock: FixedClock::new(now),
        }
    }

    pub fn services<'a>(&'a self, store: &'a dyn oidc_core::store::KVStore, signer: &'a dyn Signer) -> Services<'a> {
        Services {
            clients: &self.clients,
            sessions: &self.sessions,
            consent: &self.consent,
            user_authenticator: &self.user_authenticator,
            user_info: &self.user_info,
            issuer: &self.issuer,
            store,
            signer,
            clock: &self.clock,
        }
    }
}
