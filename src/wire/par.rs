//! Pushed Authorization Request endpoint wire adapter (spec §6, §9
//! GLOSSARY "PAR"): authorization parameters pre-registered server-side,
//! referenced later by `request_uri`.
//!
//! Has no teacher counterpart; built fresh in the idiom of
//! `pipeline::device`'s two-keyed-record pattern (primary record +
//! caller-facing opaque reference).

use super::authorization::RawAuthorizationRequest;
use crate::error::ProtocolError;
use crate::store::{KVStore, StoreKey, TypedStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

const PAR_TTL_SECONDS: i64 = 90;
const REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";

#[derive(Debug, Clone, Serialize)]
pub struct PushedAuthorizationResponseWire {
    pub request_uri: String,
    pub expires_in: i64,
}

pub struct PushedAuthorizationService<'a> {
    store: &'a dyn KVStore,
}

impl<'a> PushedAuthorizationService<'a> {
    pub fn new(store: &'a dyn KVStore) -> Self {
        Self { store }
    }

    pub async fn push(&self, raw: &RawAuthorizationRequest, now: DateTime<Utc>) -> Result<PushedAuthorizationResponseWire, ProtocolError> {
        let id = ulid::Ulid::new().to_string();
        let request_uri = format!("{REQUEST_URI_PREFIX}{id}");
        self.store
            .set_json(&StoreKey::PushedAuthorizationRequest(id), raw, Duration::from_secs(PAR_TTL_SECONDS as u64))
            .await
            .map_err(|e| ProtocolError::server_error("store pushed authorization request", e))?;
        let _ = now;
        Ok(PushedAuthorizationResponseWire { request_uri, expires_in: PAR_TTL_SECONDS })
    }

    /// Resolves a `request_uri` back into the original parameters; single-use,
    /// mirroring the authorization-code redemption idiom (atomic remove).
    pub async fn resolve(&self, request_uri: &str) -> Result<RawAuthorizationRequest, ProtocolError> {
        let id = request_uri
            .strip_prefix(REQUEST_URI_PREFIX)
            .ok_or_else(|| ProtocolError::invalid_request("unrecognized request_uri"))?;
        self.store
            .remove_json::<RawAuthorizationRequest>(&StoreKey::PushedAuthorizationRequest(id.to_string()))
            .await
            .map_err(|e| ProtocolError::server_error("resolve pushed authorization request", e))?
            .ok_or_else(|| ProtocolError::invalid_request("request_uri is unknown or expired"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn pushed_request_resolves_once() {
        let store = InMemoryStore::new();
        let svc = PushedAuthorizationService::new(&store);
        let raw = RawAuthorizationRequest {
            client_id: "c1".to_string(),
            response_type: "code".to_string(),
            redirect_uri: "https://c1/cb".to_string(),
            ..Default::default()
        };
        let pushed = svc.push(&raw, Utc::now()).await.unwrap();
        assert!(pushed.request_uri.starts_with(REQUEST_URI_PREFIX));

        let resolved = svc.resolve(&pushed.request_uri).await.unwrap();
        assert_eq!(resolved.client_id, "c1");

        let err = svc.resolve(&pushed.request_uri).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidRequest);
    }
}
