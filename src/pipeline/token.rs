//! Token endpoint pipeline (spec §4.2, component H): one variant per grant
//! type, each with its own validator, all producing `TokenIssued`.
//!
//! Grounded on `app/http/controllers/oauth/token_controller.rs`'s grant-type
//! dispatch and `TokenService::exchange_auth_code_for_tokens` /
//! `refresh_access_token` for the authorization_code and refresh_token
//! branches; CIBA/device branches are grounded on
//! `app/services/oauth/{ciba_service,device_service}.rs`'s poll-and-transition
//! shape.

use crate::config::ServerConfig;
use crate::error::ProtocolError;
use crate::model::{
    AuthSession, AuthorizationContext, AuthorizationCodeRecord, AuthorizedGrant, CibaRequest,
    CibaStatus, ClientInfo, DeviceRequest, DeviceStatus, RefreshTokenClaims, RequestedClaims,
};
use crate::provider::{ClientInfoProvider, IssuerProvider, Services, UserAuthenticator, UserInfoProvider};
use crate::service::minting::verify_pkce;
use crate::service::registry::RegistryKind;
use crate::service::{TokenMinter, TokenRegistry};
use crate::signer::Signer;
use crate::store::{KVStore, StoreKey, TypedStore};
use crate::time::TimeSource;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum TokenRequest {
    AuthorizationCode {
        client_id: String,
        client_secret: Option<String>,
        code: String,
        redirect_uri: String,
        code_verifier: Option<String>,
    },
    RefreshToken {
        client_id: String,
        client_secret: Option<String>,
        refresh_token: String,
        scope: Option<Vec<String>>,
    },
    ClientCredentials {
        client_id: String,
        client_secret: Option<String>,
        scope: Vec<String>,
        resources: Vec<String>,
    },
    Password {
        client_id: String,
        client_secret: Option<String>,
        username: String,
        password: String,
        scope: Vec<String>,
    },
    Ciba {
        client_id: String,
        client_secret: Option<String>,
        auth_req_id: String,
    },
    DeviceCode {
        client_id: String,
        client_secret: Option<String>,
        device_code: String,
    },
}

#[derive(Debug, Clone)]
pub struct TokenIssued {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

pub struct TokenPipeline<'a> {
    services: &'a Services<'a>,
    config: &'a ServerConfig,
}

impl<'a> TokenPipeline<'a> {
    pub fn new(services: &'a Services<'a>, config: &'a ServerConfig) -> Self {
        Self { services, config }
    }

    pub async fn handle(&self, req: TokenRequest) -> Result<TokenIssued, ProtocolError> {
        let now = self.services.clock.utc_now();
        match req {
            TokenRequest::AuthorizationCode {
                client_id,
                client_secret,
                code,
                redirect_uri,
                code_verifier,
            } => {
                let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;
                self.authorization_code(&client, &code, &redirect_uri, code_verifier.as_deref(), now).await
            }
            TokenRequest::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
                scope,
            } => {
                let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;
                self.refresh_token(&client, &refresh_token, scope, now).await
            }
            TokenRequest::ClientCredentials {
                client_id,
                client_secret,
                scope,
                resources,
            } => {
                let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;
                self.client_credentials(&client, scope, resources, now).await
            }
            TokenRequest::Password {
                client_id,
                client_secret,
                username,
                password,
                scope,
            } => {
                let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;
                self.password(&client, &username, &password, scope, now).await
            }
            TokenRequest::Ciba {
                client_id,
                client_secret,
                auth_req_id,
            } => {
                let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;
                self.ciba(&client, &auth_req_id, now).await
            }
            TokenRequest::DeviceCode {
                client_id,
                client_secret,
                device_code,
            } => {
                let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;
                self.device_code(&client, &device_code, now).await
            }
        }
    }

    async fn authenticate_client(&self, client_id: &str, secret: Option<&str>) -> Result<ClientInfo, ProtocolError> {
        let client = self
            .services
            .clients
            .find_client(client_id)
            .await
            .map_err(|e| ProtocolError::server_error("client lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_client("unknown client_id"))?;

        if let Some(hash) = &client.secret_hash {
            match secret {
                Some(s) if secret_matches(s, hash) => {}
                _ => return Err(ProtocolError::invalid_client("client secret missing or incorrect")),
            }
        }
        Ok(client)
    }

    async fn authorization_code(
        &self,
        client: &ClientInfo,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TokenIssued, ProtocolError> {
        let record: Option<AuthorizationCodeRecord> = self
            .services
            .store
            .remove_json(&StoreKey::AuthorizationCode(code.to_string()))
            .await
            .map_err(|e| ProtocolError::server_error("redeem authorization code", e))?;
        let record = record.ok_or_else(|| ProtocolError::invalid_grant("authorization code is unknown or already used"))?;

        if record.is_expired(now) {
            return Err(ProtocolError::invalid_grant("authorization code has expired"));
        }
        if record.grant.context.client_id != client.client_id {
            return Err(ProtocolError::invalid_grant("authorization code was not issued to this client"));
        }
        if record.grant.context.redirect_uri != redirect_uri {
            return Err(ProtocolError::invalid_grant("redirect_uri does not match the authorization request"));
        }

        match (&record.grant.context.code_challenge, &record.grant.context.code_challenge_method) {
            (Some(challenge), Some(method)) => {
                let verifier = code_verifier.ok_or_else(|| ProtocolError::invalid_grant("code_verifier is required"))?;
                if !verify_pkce(*method, verifier, challenge) {
                    return Err(ProtocolError::invalid_grant("code_verifier does not match code_challenge"));
                }
            }
            (None, _) if client.pkce_required => {
                return Err(ProtocolError::invalid_grant("PKCE is required for this client"));
            }
            _ => {}
        }

        self.mint_full_bundle(client, &record.grant, now).await
    }

    async fn refresh_token(
        &self,
        client: &ClientInfo,
        presented: &str,
        requested_scope: Option<Vec<String>>,
        now: DateTime<Utc>,
    ) -> Result<TokenIssued, ProtocolError> {
        let verified = self
            .services
            .signer
            .verify(self.config.signing_alg, presented)
            .await
            .map_err(|e| ProtocolError::server_error("verify refresh token", e))?
            .ok_or_else(|| ProtocolError::invalid_grant("refresh token signature is invalid"))?;
        let claims: RefreshTokenClaims = serde_json::from_value(verified.payload)
            .map_err(|_| ProtocolError::invalid_grant("refresh token claims are malformed"))?;

        let registry = TokenRegistry::new(self.services.store);
        if !registry
            .is_active(RegistryKind::RefreshToken, &claims.jti, now)
            .await
            .map_err(|e| ProtocolError::server_error("refresh token registry lookup", e))?
        {
            return Err(ProtocolError::invalid_grant("refresh token has been revoked or is unknown"));
        }
        if claims.aud != client.client_id {
            return Err(ProtocolError::invalid_grant("refresh token was not issued to this client"));
        }
        if claims.exp <= now.timestamp() {
            return Err(ProtocolError::invalid_grant("refresh token has expired"));
        }

        let scope = requested_scope.unwrap_or_else(|| claims.scope.clone());
        for s in &scope {
            if !claims.scope.iter().any(|granted| granted == s) {
                return Err(ProtocolError::invalid_scope("requested scope exceeds the originally granted scope"));
            }
        }

        let original_expiry = DateTime::from_timestamp(claims.exp, 0).unwrap_or(now);
        if !client.token_shaping.refresh_allow_reuse {
            registry
                .revoke(RegistryKind::RefreshToken, &claims.jti, original_expiry, now)
                .await
                .map_err(|e| ProtocolError::server_error("revoke used refresh token", e))?;
        }

        let session = AuthSession {
            subject: claims.sub.clone(),
            session_id: claims.sid.clone().unwrap_or_default(),
            authentication_time: now,
            identity_provider: "refresh_token".to_string(),
            acr: None,
            affected_client_ids: vec![client.client_id.clone()],
        };
        let context = AuthorizationContext {
            client_id: client.client_id.clone(),
            scope: scope.clone(),
            resources: claims.resources.clone(),
            nonce: None,
            redirect_uri: String::new(),
            code_challenge: None,
            code_challenge_method: None,
            requested_claims: RequestedClaims::default(),
        };
        let grant = AuthorizedGrant { session, context };

        let minter = TokenMinter::new(self.services.signer, self.services.issuer.issuer(), self.config.signing_alg);
        let access_jti = ulid::Ulid::new().to_string();
        let (access_jws, access_claims) = minter
            .mint_access_token(&grant, client, &access_jti, now)
            .await
            .map_err(|e| ProtocolError::server_error("mint access token", e))?;
        registry
            .register_active(
                RegistryKind::AccessToken,
                &access_jti,
                DateTime::from_timestamp(access_claims.exp, 0).unwrap_or(now),
                now,
            )
            .await
            .map_err(|e| ProtocolError::server_error("register access token", e))?;

        let mut id_token = None;
        if scope.iter().any(|s| s == "openid") {
            let user_claims = self
                .services
                .user_info
                .claims(&grant.session.subject, &[])
                .await
                .map_err(|e| ProtocolError::server_error("userinfo lookup", e))?
                .unwrap_or_default();
            let id_jti = ulid::Ulid::new().to_string();
            let (jws, _) = minter
                .mint_id_token(&grant, client, &id_jti, now, &self.config.pairwise.salt, user_claims, None, None)
                .await
                .map_err(|e| ProtocolError::server_error("mint id token", e))?;
            id_token = Some(jws);
        }

        let absolute_deadline = DateTime::from_timestamp(claims.iat, 0).unwrap_or(now)
            + chrono::Duration::seconds(client.token_shaping.refresh_absolute_seconds);
        let sliding_deadline = now + chrono::Duration::seconds(client.token_shaping.refresh_sliding_seconds);
        let new_exp = absolute_deadline.min(sliding_deadline);

        let refresh_token = if new_exp > now {
            let new_jti = ulid::Ulid::new().to_string();
            let (jws, _) = minter
                .mint_refresh_token(&grant, client, &new_jti, new_exp, now)
                .await
                .map_err(|e| ProtocolError::server_error("mint refresh token", e))?;
            registry
                .register_active(RegistryKind::RefreshToken, &new_jti, new_exp, now)
                .await
                .map_err(|e| ProtocolError::server_error("register refresh token", e))?;
            Some(jws)
        } else {
            None
        };

        Ok(TokenIssued {
            access_token: access_jws,
            token_type: "Bearer",
            expires_in: access_claims.exp - now.timestamp(),
            refresh_token,
            id_token,
            scope: Some(scope.join(" ")),
        })
    }

    async fn client_credentials(
        &self,
        client: &ClientInfo,
        scope: Vec<String>,
        resources: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<TokenIssued, ProtocolError> {
        if client.is_public() {
            return Err(ProtocolError::unauthorized_client("public clients cannot use the client_credentials grant"));
        }
        let session = AuthSession::new(client.client_id.clone(), ulid::Ulid::new().to_string(), "client_credentials".to_string(), now);
        let context = AuthorizationContext {
            client_id: client.client_id.clone(),
            scope,
            resources,
            nonce: None,
            redirect_uri: String::new(),
            code_challenge: None,
            code_challenge_method: None,
            requested_claims: RequestedClaims::default(),
        };
        let grant = AuthorizedGrant { session, context };
        self.mint_access_only(client, &grant, now).await
    }

    async fn password(
        &self,
        client: &ClientInfo,
        username: &str,
        password: &str,
        scope: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<TokenIssued, ProtocolError> {
        if client.is_public() {
            return Err(ProtocolError::unauthorized_client("public clients cannot use the password grant"));
        }
        let session = self
            .services
            .user_authenticator
            .authenticate(username, password)
            .await
            .map_err(|e| ProtocolError::server_error("authenticate resource owner", e))?
            .ok_or_else(|| ProtocolError::invalid_grant("invalid resource owner credentials"))?;
        let context = AuthorizationContext {
            client_id: client.client_id.clone(),
            scope,
            resources: Vec::new(),
            nonce: None,
            redirect_uri: String::new(),
            code_challenge: None,
            code_challenge_method: None,
            requested_claims: RequestedClaims::default(),
        };
        let grant = AuthorizedGrant { session, context };
        self.mint_full_bundle(client, &grant, now).await
    }

    async fn ciba(&self, client: &ClientInfo, auth_req_id: &str, now: DateTime<Utc>) -> Result<TokenIssued, ProtocolError> {
        let key = StoreKey::CibaRequest(auth_req_id.to_string());
        let req: CibaRequest = self
            .services
            .store
            .get_json(&key)
            .await
            .map_err(|e| ProtocolError::server_error("ciba request lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_grant("unknown auth_req_id"))?;

        if req.client_id != client.client_id {
            return Err(ProtocolError::invalid_grant("auth_req_id was not issued to this client"));
        }
        if req.is_expired(now) {
            return Err(ProtocolError::expired_token("the CIBA request has expired"));
        }

        match req.status {
            CibaStatus::Pending => {
                if let Some(last) = req.last_poll_at {
                    if (now - last).num_seconds() < req.interval as i64 {
                        return Err(ProtocolError::slow_down());
                    }
                }
                let mut updated = req;
                updated.last_poll_at = Some(now);
                self.services
                    .store
                    .set_json(&key, &updated, ttl_until(updated.expires_at, now))
                    .await
                    .map_err(|e| ProtocolError::server_error("update ciba poll timestamp", e))?;
                Err(ProtocolError::authorization_pending())
            }
            CibaStatus::Authenticated => {
                let grant = req
                    .grant
                    .clone()
                    .ok_or_else(|| ProtocolError::server_error("ciba authenticated without a grant", anyhow::anyhow!("missing grant")))?;
                self.services
                    .store
                    .remove(&key)
                    .await
                    .map_err(|e| ProtocolError::server_error("remove ciba request", e))?;
                self.mint_full_bundle(client, &grant, now).await
            }
            CibaStatus::Denied => Err(ProtocolError::access_denied("the end user denied the authentication request")),
            CibaStatus::Expired => Err(ProtocolError::expired_token("the CIBA request has expired")),
        }
    }

    async fn device_code(&self, client: &ClientInfo, device_code: &str, now: DateTime<Utc>) -> Result<TokenIssued, ProtocolError> {
        let key = StoreKey::DeviceCodeByPrimary(device_code.to_string());
        let req: DeviceRequest = self
            .services
            .store
            .get_json(&key)
            .await
            .map_err(|e| ProtocolError::server_error("device code lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_grant("unknown device_code"))?;

        if req.client_id != client.client_id {
            return Err(ProtocolError::invalid_grant("device_code was not issued to this client"));
        }
        if req.is_expired(now) {
            return Err(ProtocolError::expired_token("the device code has expired"));
        }

        match req.status {
            DeviceStatus::Pending => {
                if let Some(last) = req.last_poll_at {
                    if (now - last).num_seconds() < req.interval as i64 {
                        return Err(ProtocolError::slow_down());
                    }
                }
                let mut updated = req;
                updated.last_poll_at = Some(now);
                self.services
                    .store
                    .set_json(&key, &updated, ttl_until(updated.expires_at, now))
                    .await
                    .map_err(|e| ProtocolError::server_error("update device poll timestamp", e))?;
                Err(ProtocolError::authorization_pending())
            }
            DeviceStatus::Authorized => {
                let subject = req
                    .subject
                    .clone()
                    .ok_or_else(|| ProtocolError::server_error("device authorized without a subject", anyhow::anyhow!("missing subject")))?;
                let session_id = req.session_id.clone().unwrap_or_else(|| ulid::Ulid::new().to_string());
                let session = AuthSession::new(subject, session_id, "device_code".to_string(), now);
                let context = AuthorizationContext {
                    client_id: client.client_id.clone(),
                    scope: req.scope.clone(),
                    resources: req.resources.clone(),
                    nonce: None,
                    redirect_uri: String::new(),
                    code_challenge: None,
                    code_challenge_method: None,
                    requested_claims: RequestedClaims::default(),
                };
                let grant = AuthorizedGrant { session, context };
                self.services
                    .store
                    .remove(&key)
                    .await
                    .map_err(|e| ProtocolError::server_error("remove device code record", e))?;
                self.services
                    .store
                    .remove(&StoreKey::DeviceCodeByUserCode(req.user_code.clone()))
                    .await
                    .map_err(|e| ProtocolError::server_error("remove user code index", e))?;
                self.mint_full_bundle(client, &grant, now).await
            }
            DeviceStatus::Denied => Err(ProtocolError::access_denied("the end user denied the device authorization request")),
            DeviceStatus::Expired => Err(ProtocolError::expired_token("the device code has expired")),
        }
    }

    async fn mint_access_only(&self, client: &ClientInfo, grant: &AuthorizedGrant, now: DateTime<Utc>) -> Result<TokenIssued, ProtocolError> {
        let minter = TokenMinter::new(self.services.signer, self.services.issuer.issuer(), self.config.signing_alg);
        let registry = TokenRegistry::new(self.services.store);
        let jti = ulid::Ulid::new().to_string();
        let (jws, claims) = minter
            .mint_access_token(grant, client, &jti, now)
            .await
            .map_err(|e| ProtocolError::server_error("mint access token", e))?;
        registry
            .register_active(RegistryKind::AccessToken, &jti, DateTime::from_timestamp(claims.exp, 0).unwrap_or(now), now)
            .await
            .map_err(|e| ProtocolError::server_error("register access token", e))?;
        Ok(TokenIssued {
            access_token: jws,
            token_type: "Bearer",
            expires_in: claims.exp - now.timestamp(),
            refresh_token: None,
            id_token: None,
            scope: Some(grant.context.scope.join(" ")),
        })
    }

    /// Mints access + (if `openid` is in scope) identity + (if the client
    /// allows offline access) refresh tokens — the bundle every
    /// code-redemption, CIBA-completion, and device-code-completion path
    /// returns (spec §4.2). `pub(crate)` so the CIBA push-delivery path
    /// (`pipeline::ciba`) can assemble the same bundle for its POST body.
    pub(crate) async fn mint_full_bundle(&self, client: &ClientInfo, grant: &AuthorizedGrant, now: DateTime<Utc>) -> Result<TokenIssued, ProtocolError> {
        let minter = TokenMinter::new(self.services.signer, self.services.issuer.issuer(), self.config.signing_alg);
        let registry = TokenRegistry::new(self.services.store);

        let access_jti = ulid::Ulid::new().to_string();
        let (access_jws, access_claims) = minter
            .mint_access_token(grant, client, &access_jti, now)
            .await
            .map_err(|e| ProtocolError::server_error("mint access token", e))?;
        registry
            .register_active(
                RegistryKind::AccessToken,
                &access_jti,
                DateTime::from_timestamp(access_claims.exp, 0).unwrap_or(now),
                now,
            )
            .await
            .map_err(|e| ProtocolError::server_error("register access token", e))?;

        let mut id_token = None;
        if grant.context.has_scope("openid") {
            let user_claims = self
                .services
                .user_info
                .claims(&grant.session.subject, &grant.context.requested_claims.id_token)
                .await
                .map_err(|e| ProtocolError::server_error("userinfo lookup", e))?
                .unwrap_or_default();
            let id_jti = ulid::Ulid::new().to_string();
            let (jws, _) = minter
                .mint_id_token(grant, client, &id_jti, now, &self.config.pairwise.salt, user_claims, None, None)
                .await
                .map_err(|e| ProtocolError::server_error("mint id token", e))?;
            id_token = Some(jws);
        }

        let mut refresh_token = None;
        if client.offline_access_allowed && grant.context.has_scope("offline_access") {
            let exp = now + chrono::Duration::seconds(client.token_shaping.refresh_absolute_seconds.min(client.token_shaping.refresh_sliding_seconds));
            let refresh_jti = ulid::Ulid::new().to_string();
            let (jws, _) = minter
                .mint_refresh_token(grant, client, &refresh_jti, exp, now)
                .await
                .map_err(|e| ProtocolError::server_error("mint refresh token", e))?;
            registry
                .register_active(RegistryKind::RefreshToken, &refresh_jti, exp, now)
                .await
                .map_err(|e| ProtocolError::server_error("register refresh token", e))?;
            refresh_token = Some(jws);
        }

        Ok(TokenIssued {
            access_token: access_jws,
            token_type: "Bearer",
            expires_in: access_claims.exp - now.timestamp(),
            refresh_token,
            id_token,
            scope: Some(grant.context.scope.join(" ")),
        })
    }
}

/// Used only by the device-flow's `slow_down` bookkeeping and CIBA poll
/// bookkeeping above; kept next to the pipeline that owns both records'
/// TTL semantics rather than duplicated in `service::registry`.
fn ttl_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expiry - now).to_std().unwrap_or(Duration::from_secs(0))
}

/// Compares a presented client secret against the stored hash. Hashing
/// itself is out of scope (spec §1 treats key/secret provisioning as the
/// host's concern); this crate only needs a stable, collision-resistant
/// comparison, so it hashes with the same SHA-256 primitive used for
/// pairwise-subject derivation.
fn secret_matches(provided: &str, hash: &str) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(provided.as_bytes());
    hex::encode(hasher.finalize()) == hash
}
