//! Introspection & revocation (spec §4.6, component L, RFC 7662 / RFC 7009).
//!
//! Grounded on `app/services/oauth/token_service.rs`'s
//! `revoke_access_token` / `revoke_refresh_token` pair, generalized off the
//! Diesel `revoked` column onto `service::registry::TokenRegistry`.

use crate::config::ServerConfig;
use crate::error::ProtocolError;
use crate::model::{AccessTokenClaims, RefreshTokenClaims};
use crate::provider::Services;
use crate::service::registry::RegistryKind;
use crate::service::TokenRegistry;
use crate::signer::{Signer, SigningAlg};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct IntrospectionResult {
    pub active: bool,
    /// Populated only when `active` — no claims leak on an inactive token
    /// (spec §4.6 "no other claims are leaked in the inactive case").
    pub payload: Option<serde_json::Value>,
}

impl IntrospectionResult {
    fn inactive() -> Self {
        Self { active: false, payload: None }
    }
}

pub struct IntrospectionService<'a> {
    services: &'a Services<'a>,
    config: &'a ServerConfig,
}

impl<'a> IntrospectionService<'a> {
    pub fn new(services: &'a Services<'a>, config: &'a ServerConfig) -> Self {
        Self { services, config }
    }

    /// `token_type_hint` steers which kind is tried first; both kinds are
    /// attempted regardless, since RFC 7662 treats the hint as advisory.
    pub async fn introspect(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IntrospectionResult, ProtocolError> {
        let try_refresh_first = token_type_hint == Some("refresh_token");
        let order = if try_refresh_first {
            [RegistryKind::RefreshToken, RegistryKind::AccessToken]
        } else {
            [RegistryKind::AccessToken, RegistryKind::RefreshToken]
        };

        for kind in order {
            if let Some(result) = self.try_kind(kind, token, now).await? {
                return Ok(result);
            }
        }
        Ok(IntrospectionResult::inactive())
    }

    async fn try_kind(
        &self,
        kind: RegistryKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IntrospectionResult>, ProtocolError> {
        let verified = self
            .services
            .signer
            .verify(self.config.signing_alg, token)
            .await
            .map_err(|e| ProtocolError::server_error("verify token for introspection", e))?;
        let Some(verified) = verified else { return Ok(None) };

        let jti = match kind {
            RegistryKind::AccessToken => {
                let claims: AccessTokenClaims = match serde_json::from_value(verified.payload.clone()) {
                    Ok(c) => c,
                    Err(_) => return Ok(None),
                };
                if claims.exp < now.timestamp() {
                    return Ok(Some(IntrospectionResult::inactive()));
                }
                claims.jti
            }
            RegistryKind::RefreshToken => {
                let claims: RefreshTokenClaims = match serde_json::from_value(verified.payload.clone()) {
                    Ok(c) => c,
                    Err(_) => return Ok(None),
                };
                if claims.exp < now.timestamp() {
                    return Ok(Some(IntrospectionResult::inactive()));
                }
                claims.jti
            }
        };

        let registry = TokenRegistry::new(self.services.store);
        let active = registry
            .is_active(kind, &jti, now)
            .await
            .map_err(|e| ProtocolError::server_error("registry lookup for introspection", e))?;
        if !active {
            return Ok(Some(IntrospectionResult::inactive()));
        }
        Ok(Some(IntrospectionResult { active: true, payload: Some(verified.payload) }))
    }
}

pub struct RevocationService<'a> {
    services: &'a Services<'a>,
    config: &'a ServerConfig,
}

impl<'a> RevocationService<'a> {
    pub fn new(services: &'a Services<'a>, config: &'a ServerConfig) -> Self {
        Self { services, config }
    }

    /// Always succeeds regardless of whether `token` existed or decoded
    /// (spec §4.6 "always return HTTP 200 whether the token existed or
    /// not"); a caller-visible error here would only be possible for
    /// storage I/O failure, which is logged, not surfaced.
    pub async fn revoke(&self, token: &str, token_type_hint: Option<&str>, now: DateTime<Utc>) {
        let try_refresh_first = token_type_hint == Some("refresh_token");
        let order = if try_refresh_first {
            [RegistryKind::RefreshToken, RegistryKind::AccessToken]
        } else {
            [RegistryKind::AccessToken, RegistryKind::RefreshToken]
        };

        for kind in order {
            if self.try_revoke(kind, token, now).await {
                return;
            }
        }
    }

    async fn try_revoke(&self, kind: RegistryKind, token: &str, now: DateTime<Utc>) -> bool {
        let verified = match self.services.signer.verify(self.config.signing_alg, token).await {
            Ok(Some(v)) => v,
            Ok(None) => return false,
            Err(e) => {
                tracing::error!(error = %e, "token verification failed during revocation");
                return false;
            }
        };

        let (jti, exp) = match kind {
            RegistryKind::AccessToken => match serde_json::from_value::<AccessTokenClaims>(verified.payload) {
                Ok(c) => (c.jti, c.exp),
                Err(_) => return false,
            },
            RegistryKind::RefreshToken => match serde_json::from_value::<RefreshTokenClaims>(verified.payload) {
                Ok(c) => (c.jti, c.exp),
                Err(_) => return false,
            },
        };

        let registry = TokenRegistry::new(self.services.store);
        let expiry = DateTime::from_timestamp(exp, 0).unwrap_or(now);
        if let Err(e) = registry.revoke(kind, &jti, expiry, now).await {
            tracing::error!(error = %e, jti, "failed to record revocation");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccessTokenClaims;
    use crate::store::{InMemoryStore, KVStore};
    use crate::testing::hmac_test_signer;

    fn access_claims(jti: &str, now: DateTime<Utc>) -> AccessTokenClaims {
        AccessTokenClaims {
            iss: "https://issuer.example".to_string(),
            aud: vec!["client-1".to_string()],
            sub: "user-1".to_string(),
            sid: Some("sess-1".to_string()),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + chrono::Duration::seconds(300)).timestamp(),
            jti: jti.to_string(),
            scope: "openid".to_string(),
            resources: vec![],
        }
    }

    #[tokio::test]
    async fn inactive_when_never_registered() {
        let signer = hmac_test_signer(b"secret");
        let store = InMemoryStore::new();
        let now = Utc::now();
        let claims = access_claims("never-registered", now);
        let jws = signer.sign(SigningAlg::Hs256, &serde_json::to_value(&claims).unwrap()).await.unwrap();

        let services = test_services(&signer, &store);
        let config = test_config();
        let svc = IntrospectionService::new(&services, &config);

        let result = svc.introspect(&jws, Some("access_token"), now).await.unwrap();
        assert!(!result.active);
        assert!(result.payload.is_none());
    }

    #[tokio::test]
    async fn active_after_registration_and_inactive_after_revoke() {
        let signer = hmac_test_signer(b"secret");
        let store = InMemoryStore::new();
        let now = Utc::now();
        let claims = access_claims("jti-1", now);
        let exp = DateTime::from_timestamp(claims.exp, 0).unwrap();
        let jws = signer.sign(SigningAlg::Hs256, &serde_json::to_value(&claims).unwrap()).await.unwrap();

        let registry = TokenRegistry::new(&store);
        registry.register_active(RegistryKind::AccessToken, "jti-1", exp, now).await.unwrap();

        let services = test_services(&signer, &store);
        let config = test_config();
        let svc = IntrospectionService::new(&services, &config);

        let active = svc.introspect(&jws, Some("access_token"), now).await.unwrap();
        assert!(active.active);
        assert_eq!(active.payload.unwrap()["jti"], "jti-1");

        let revocation = RevocationService::new(&services, &config);
        revocation.revoke(&jws, Some("access_token"), now).await;

        let after = svc.introspect(&jws, Some("access_token"), now).await.unwrap();
        assert!(!after.active);
    }

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::from_env().unwrap();
        config.signing_alg = SigningAlg::Hs256;
        config
    }

    fn test_services<'a>(signer: &'a dyn Signer, store: &'a dyn KVStore) -> Services<'a> {
        use crate::testing::{FakeClientRegistry, FakeConsentProvider, FakeSessionStore, FakeUserAuthenticator, FakeUserInfoProvider, FixedClock, FixedIssuer};
        Services {
            signer,
            store,
            clients: Box::leak(Box::new(FakeClientRegistry::new())),
            sessions: Box::leak(Box::new(FakeSessionStore::new())),
            consent: Box::leak(Box::new(FakeConsentProvider::new())),
            user_authenticator: Box::leak(Box::new(FakeUserAuthenticator::new())),
            user_info: Box::leak(Box::new(FakeUserInfoProvider::new())),
            issuer: Box::leak(Box::new(FixedIssuer("https://issuer.example".to_string()))),
            clock: Box::leak(Box::new(FixedClock::new(Utc::now()))),
        }
    }
}
