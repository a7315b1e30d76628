//! Device Authorization engine (spec §4.4, component J, RFC 8628).
//!
//! Grounded on `app/services/oauth/device_service.rs`'s
//! `create_device_authorization` / `poll_device_token` shape; the
//! rate-limiting half lives in `service::rate_limit` and is invoked here at
//! the point a user submits a code at the verification URI (the token-poll
//! side of this state machine lives in `pipeline::token::TokenPipeline::device_code`).

use crate::config::ServerConfig;
use crate::error::ProtocolError;
use crate::model::{AuthorizedGrant, DeviceRequest, DeviceStatus};
use crate::provider::Services;
use crate::service::rate_limit::RateLimitError;
use crate::service::RateLimiter;
use crate::store::{StoreKey, TypedStore};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ0123456789";

pub struct DeviceInitiation {
    pub device_code: String,
    pub user_code: String,
    pub expires_in: i64,
    pub interval: u32,
}

pub enum DeviceDecision {
    Approved(AuthorizedGrant),
    Denied,
}

/// Distinct from `ProtocolError` because a rate-limited verification
/// attempt is not one of the OAuth/OIDC wire error codes (spec §4.4's
/// `CheckAsync` contract is its own thing, surfaced to the host as-is).
#[derive(Debug)]
pub enum DeviceResolveError {
    RateLimited { retry_after_seconds: i64 },
    NotFound,
    Server(ProtocolError),
}

pub struct DeviceEngine<'a> {
    services: &'a Services<'a>,
    config: &'a ServerConfig,
}

impl<'a> DeviceEngine<'a> {
    pub fn new(services: &'a Services<'a>, config: &'a ServerConfig) -> Self {
        Self { services, config }
    }

    pub async fn initiate(
        &self,
        client_id: &str,
        scope: Vec<String>,
        resources: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<DeviceInitiation, ProtocolError> {
        let device_code = ulid::Ulid::new().to_string();
        let user_code = generate_user_code();
        let expires_at = now + chrono::Duration::seconds(self.config.lifetimes.device_code_seconds);
        let interval = 5;

        let record = DeviceRequest {
            device_code: device_code.clone(),
            user_code: user_code.clone(),
            client_id: client_id.to_string(),
            scope,
            resources,
            status: DeviceStatus::Pending,
            interval,
            expires_at,
            subject: None,
            session_id: None,
            last_poll_at: None,
        };
        let ttl = ttl_until(expires_at, now);
        self.services
            .store
            .set_json(&StoreKey::DeviceCodeByPrimary(device_code.clone()), &record, ttl)
            .await
            .map_err(|e| ProtocolError::server_error("store device code", e))?;
        self.services
            .store
            .set_json(&StoreKey::DeviceCodeByUserCode(user_code.clone()), &device_code, ttl)
            .await
            .map_err(|e| ProtocolError::server_error("store user code index", e))?;

        Ok(DeviceInitiation {
            device_code,
            user_code,
            expires_in: self.config.lifetimes.device_code_seconds,
            interval,
        })
    }

    /// Called when a user submits a code at the verification URI. Rate
    /// limited per spec §4.4; on success, clears the limiter state for this
    /// `user_code` and returns the pending record for the host to render a
    /// consent prompt against.
    pub async fn submit_user_code(
        &self,
        user_code: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<DeviceRequest, DeviceResolveError> {
        let limiter = RateLimiter::new(self.services.store, &self.config.rate_limit);
        limiter
            .check(user_code, client_ip, now)
            .await
            .map_err(|RateLimitError::Blocked { retry_after_seconds }| DeviceResolveError::RateLimited { retry_after_seconds })?;

        let device_code: Option<String> = self
            .services
            .store
            .get_json(&StoreKey::DeviceCodeByUserCode(user_code.to_string()))
            .await
            .map_err(|e| DeviceResolveError::Server(ProtocolError::server_error("user code lookup", e)))?;

        let device_code = match device_code {
            Some(dc) => dc,
            None => {
                limiter
                    .record_failure(user_code, client_ip, now)
                    .await
                    .map_err(|e| DeviceResolveError::Server(ProtocolError::server_error("record rate-limit failure", e)))?;
                return Err(DeviceResolveError::NotFound);
            }
        };

        let req: DeviceRequest = self
            .services
            .store
            .get_json(&StoreKey::DeviceCodeByPrimary(device_code))
            .await
            .map_err(|e| DeviceResolveError::Server(ProtocolError::server_error("device code lookup", e)))?
            .ok_or(DeviceResolveError::NotFound)?;

        limiter
            .clear(user_code)
            .await
            .map_err(|e| DeviceResolveError::Server(ProtocolError::server_error("clear rate-limit state", e)))?;

        Ok(req)
    }

    /// Records the end user's approve/deny decision against the device
    /// record (spec §4.4 "on success, both records are deleted" — deletion
    /// itself happens on token redemption in `pipeline::token`, once the
    /// client actually claims the tokens).
    pub async fn resolve(&self, user_code: &str, decision: DeviceDecision, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        let device_code: String = self
            .services
            .store
            .get_json(&StoreKey::DeviceCodeByUserCode(user_code.to_string()))
            .await
            .map_err(|e| ProtocolError::server_error("user code lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_grant("unknown user_code"))?;

        let key = StoreKey::DeviceCodeByPrimary(device_code);
        let mut req: DeviceRequest = self
            .services
            .store
            .get_json(&key)
            .await
            .map_err(|e| ProtocolError::server_error("device code lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_grant("unknown device_code"))?;

        match decision {
            DeviceDecision::Approved(grant) => {
                req.status = DeviceStatus::Authorized;
                req.subject = Some(grant.session.subject.clone());
                req.session_id = Some(grant.session.session_id.clone());
            }
            DeviceDecision::Denied => req.status = DeviceStatus::Denied,
        }

        self.services
            .store
            .set_json(&key, &req, ttl_until(req.expires_at, now))
            .await
            .map_err(|e| ProtocolError::server_error("persist device decision", e))
    }
}

/// An 8-character user code grouped `XXXX-XXXX`, drawn from RFC 8628's
/// recommended ambiguity-reduced alphabet (no `A`, `E`, `I`, `O`, `U`, `1`).
fn generate_user_code() -> String {
    let mut rng = rand::thread_rng();
    let chars: String = (0..8).map(|_| USER_CODE_ALPHABET[rng.gen_range(0..USER_CODE_ALPHABET.len())] as char).collect();
    format!("{}-{}", &chars[..4], &chars[4..])
}

fn ttl_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expiry - now).to_std().unwrap_or(Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_code_has_expected_shape() {
        let code = generate_user_code();
        assert_eq!(code.len(), 9);
        assert_eq!(code.chars().nth(4), Some('-'));
    }
}
