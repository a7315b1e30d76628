//! Authorization endpoint pipeline (spec §4.1, component G).
//!
//! Grounded on
//! `app/http/controllers/oauth/authorization_controller.rs`'s
//! validate→process→respond shape, generalized off axum extractors and
//! Diesel lookups into the injected `Services` bundle.

use crate::error::ProtocolError;
use crate::model::{
    AuthSession, AuthorizationContext, AuthorizedGrant, AuthorizationCodeRecord, ClientInfo,
    PendingConsent, PkceMethod, RequestedClaims, ResponseType,
};
use crate::config::ServerConfig;
use crate::provider::{ClientInfoProvider, ConsentProvider, IssuerProvider, Services, SessionProvider, UserInfoProvider};
use crate::service::registry::RegistryKind;
use crate::service::{TokenMinter, TokenRegistry};
use crate::store::{KVStore, StoreKey};
use crate::time::TimeSource;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    None,
    Login,
    Consent,
    SelectAccount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Query,
    Fragment,
    FormPost,
}

/// The wire-level default when a request omits `response_mode`: `query` for
/// a pure `code` response_type, `fragment` for anything implicit or hybrid
/// (spec §4.1 "response_mode defaults to query for code, fragment for
/// implicit/hybrid").
pub fn default_response_mode(response_type: &[ResponseType]) -> ResponseMode {
    if response_type.iter().any(|rt| matches!(rt, ResponseType::Token | ResponseType::IdToken)) {
        ResponseMode::Fragment
    } else {
        ResponseMode::Query
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub client_id: String,
    /// The caller's opaque key for "sessions belonging to this browser" —
    /// typically derived from a login cookie by the host.
    pub browser_session_key: String,
    pub response_type: Vec<ResponseType>,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub resources: Vec<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub prompt: Option<Prompt>,
    pub max_age: Option<i64>,
    pub acr_values: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<PkceMethod>,
    pub requested_claims: RequestedClaims,
    pub response_mode: Option<ResponseMode>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationSuccess {
    pub code: Option<String>,
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: Option<&'static str>,
    pub session_id: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AuthorizationOutcome {
    Success(AuthorizationSuccess),
    LoginRequired,
    AccountSelectionRequired(Vec<AuthSession>),
    ConsentRequired(PendingConsent),
}

pub struct AuthorizationPipeline<'a> {
    services: &'a Services<'a>,
    config: &'a ServerConfig,
}

impl<'a> AuthorizationPipeline<'a> {
    pub fn new(services: &'a Services<'a>, config: &'a ServerConfig) -> Self {
        Self { services, config }
    }

    pub async fn authorize(
        &self,
        req: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, ProtocolError> {
        let now = self.services.clock.utc_now();

        let client = self
            .services
            .clients
            .find_client(&req.client_id)
            .await
            .map_err(|e| ProtocolError::server_error("client lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_client("unknown client_id"))?;

        if !client.allows_redirect_uri(&req.redirect_uri) {
            return Err(ProtocolError::invalid_request("redirect_uri is not registered for this client"));
        }
        for rt in &req.response_type {
            if !client.has_response_type(*rt) {
                return Err(ProtocolError::unauthorized_client("response_type not permitted for this client"));
            }
        }

        // Steps 1-3: enumerate and filter sessions.
        let mut sessions = self
            .services
            .sessions
            .list_sessions(&req.browser_session_key)
            .await
            .map_err(|e| ProtocolError::server_error("session lookup", e))?;

        if let Some(max_age) = req.max_age {
            sessions.retain(|s| s.age_seconds(now) <= max_age);
        }
        if !req.acr_values.is_empty() {
            sessions.retain(|s| s.acr.as_deref().map(|acr| req.acr_values.iter().any(|v| v == acr)).unwrap_or(false));
        }

        // Step 4: apply prompt.
        match req.prompt {
            Some(Prompt::None) => {
                if sessions.is_empty() {
                    return Err(ProtocolError::login_required());
                }
                if sessions.len() > 1 {
                    return Err(ProtocolError::account_selection_required());
                }
            }
            Some(Prompt::Login) => return Ok(AuthorizationOutcome::LoginRequired),
            Some(Prompt::SelectAccount) => {
                return Ok(AuthorizationOutcome::AccountSelectionRequired(sessions));
            }
            _ => {
                if sessions.is_empty() {
                    return Ok(AuthorizationOutcome::LoginRequired);
                }
                if sessions.len() > 1 {
                    return Ok(AuthorizationOutcome::AccountSelectionRequired(sessions));
                }
            }
        }

        let mut session = sessions.into_iter().next().expect("exactly one session survives prompt handling");

        // Step 5: consent.
        let decision = self
            .services
            .consent
            .evaluate(&req.client_id, &session, &req.scope, &req.resources)
            .await
            .map_err(|e| ProtocolError::server_error("consent lookup", e))?;

        if !decision.pending.is_empty() {
            if req.prompt == Some(Prompt::None) {
                return Err(ProtocolError::consent_required());
            }
            return Ok(AuthorizationOutcome::ConsentRequired(decision.pending));
        }

        // Step 6: sign-in tick.
        if session.record_client(&req.client_id) {
            self.services
                .sessions
                .save_session(&session)
                .await
                .map_err(|e| ProtocolError::server_error("session save", e))?;
        }

        // Step 7: build the authorization context.
        let context = AuthorizationContext {
            client_id: req.client_id.clone(),
            scope: decision.granted_scopes,
            resources: decision.granted_resources,
            nonce: req.nonce.clone(),
            redirect_uri: req.redirect_uri.clone(),
            code_challenge: req.code_challenge.clone(),
            code_challenge_method: req.code_challenge_method,
            requested_claims: req.requested_claims.clone(),
        };
        let grant = AuthorizedGrant {
            session: session.clone(),
            context,
        };

        self.mint_response(&client, &grant, req, now).await.map(AuthorizationOutcome::Success)
    }

    async fn mint_response(
        &self,
        client: &ClientInfo,
        grant: &AuthorizedGrant,
        req: &AuthorizationRequest,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationSuccess, ProtocolError> {
        let minter = TokenMinter::new(self.services.signer, self.services.issuer.issuer(), self.config.signing_alg);
        let registry = TokenRegistry::new(self.services.store);

        let mut code = None;
        if req.response_type.contains(&ResponseType::Code) {
            let raw_code = ulid::Ulid::new().to_string();
            let expires_at = now + chrono::Duration::seconds(client.token_shaping.authorization_code_seconds);
            let record = AuthorizationCodeRecord {
                grant: grant.clone(),
                expires_at,
            };
            self.services
                .store
                .set(
                    &StoreKey::AuthorizationCode(raw_code.clone()),
                    serde_json::to_vec(&record).map_err(|e| ProtocolError::server_error("encode auth code", e.into()))?,
                    ttl_until(expires_at, now),
                )
                .await
                .map_err(|e| ProtocolError::server_error("store auth code", e))?;
            code = Some(raw_code);
        }

        let mut access_token = None;
        if req.response_type.contains(&ResponseType::Token) {
            let jti = ulid::Ulid::new().to_string();
            let (jws, claims) = minter
                .mint_access_token(grant, client, &jti, now)
                .await
                .map_err(|e| ProtocolError::server_error("mint access token", e))?;
            registry
                .register_active(RegistryKind::AccessToken, &jti, chrono::DateTime::from_timestamp(claims.exp, 0).unwrap_or(now), now)
                .await
                .map_err(|e| ProtocolError::server_error("register access token", e))?;
            access_token = Some(jws);
        }

        let mut id_token = None;
        if req.response_type.contains(&ResponseType::IdToken) {
            let include_user_claims = req.response_type.len() == 1 || client.force_user_claims_in_id_token;
            let user_claims = if include_user_claims {
                self.services
                    .user_info
                    .claims(&grant.session.subject, &grant.context.requested_claims.id_token)
                    .await
                    .map_err(|e| ProtocolError::server_error("userinfo lookup", e))?
                    .unwrap_or_default()
            } else {
                Default::default()
            };
            let jti = ulid::Ulid::new().to_string();
            let (jws, _claims) = minter
                .mint_id_token(
                    grant,
                    client,
                    &jti,
                    now,
                    &self.config.pairwise.salt,
                    user_claims,
                    code.as_deref(),
                    access_token.as_deref(),
                )
                .await
                .map_err(|e| ProtocolError::server_error("mint id token", e))?;
            id_token = Some(jws);
        }

        Ok(AuthorizationSuccess {
            code,
            token_type: access_token.as_ref().map(|_| "Bearer"),
            access_token,
            id_token,
            session_id: grant.session.session_id.clone(),
            state: req.state.clone(),
        })
    }
}

fn ttl_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expiry - now).to_std().unwrap_or(Duration::from_secs(0))
}
