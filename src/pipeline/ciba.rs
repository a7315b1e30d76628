//! CIBA engine (spec §4.3, component I): initiate a backchannel
//! authentication request and drive its completion, dispatching by the
//! client's delivery mode.
//!
//! Grounded on `app/services/oauth/ciba_service.rs`: `notify_client_auth_complete`'s
//! `reqwest::Client` POST-with-bearer-auth-and-JSON-body, matched on response
//! status with `tracing::info!/warn!/error!`, is reused here verbatim for the
//! ping and push branches. The reactive poll-for-tokens half of CIBA lives in
//! `pipeline::token::TokenPipeline::ciba`, which shares this module's store
//! records.

use crate::config::ServerConfig;
use crate::error::ProtocolError;
use crate::model::{AuthorizedGrant, CibaDeliveryMode, CibaRequest, CibaStatus, ClientInfo};
use crate::pipeline::token::TokenPipeline;
use crate::provider::{ClientInfoProvider, Services};
use crate::store::{KVStore, StoreKey, TypedStore};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub struct CibaInitiation {
    pub auth_req_id: String,
    pub expires_in: i64,
    pub interval: u32,
}

pub enum CibaDecision {
    Approved(AuthorizedGrant),
    Denied,
}

pub struct CibaEngine<'a> {
    services: &'a Services<'a>,
    config: &'a ServerConfig,
    http: &'a reqwest::Client,
}

impl<'a> CibaEngine<'a> {
    pub fn new(services: &'a Services<'a>, config: &'a ServerConfig, http: &'a reqwest::Client) -> Self {
        Self { services, config, http }
    }

    pub async fn initiate(
        &self,
        client: &ClientInfo,
        scope: Vec<String>,
        resources: Vec<String>,
        client_notification_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CibaInitiation, ProtocolError> {
        if client.ciba_delivery_mode != CibaDeliveryMode::Poll && client_notification_token.is_none() {
            return Err(ProtocolError::invalid_request(
                "client_notification_token is required for ping and push delivery modes",
            ));
        }

        let auth_req_id = ulid::Ulid::new().to_string();
        let expires_at = now + chrono::Duration::seconds(self.config.lifetimes.ciba_request_seconds);
        let interval = 5;
        let record = CibaRequest {
            auth_req_id: auth_req_id.clone(),
            client_id: client.client_id.clone(),
            scope,
            resources,
            grant: None,
            status: CibaStatus::Pending,
            client_notification_endpoint: client.ciba_client_notification_endpoint.clone(),
            client_notification_token,
            expires_at,
            interval,
            last_poll_at: None,
        };
        self.services
            .store
            .set_json(&StoreKey::CibaRequest(auth_req_id.clone()), &record, ttl_until(expires_at, now))
            .await
            .map_err(|e| ProtocolError::server_error("store ciba request", e))?;

        Ok(CibaInitiation {
            auth_req_id,
            expires_in: self.config.lifetimes.ciba_request_seconds,
            interval,
        })
    }

    /// Called once the out-of-band user interaction resolves (the host
    /// decides how; this crate only owns the state transition and
    /// notification dispatch that follows). The storage write always
    /// happens before the outbound notification (spec §5, §8 property 8).
    pub async fn complete(&self, auth_req_id: &str, decision: CibaDecision, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        let key = StoreKey::CibaRequest(auth_req_id.to_string());
        let mut req: CibaRequest = self
            .services
            .store
            .get_json(&key)
            .await
            .map_err(|e| ProtocolError::server_error("ciba request lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_grant("unknown auth_req_id"))?;
        let client = self
            .services
            .clients
            .find_client(&req.client_id)
            .await
            .map_err(|e| ProtocolError::server_error("client lookup", e))?
            .ok_or_else(|| ProtocolError::invalid_client("unknown client_id"))?;

        match decision {
            CibaDecision::Denied => req.status = CibaStatus::Denied,
            CibaDecision::Approved(grant) => {
                req.status = CibaStatus::Authenticated;
                req.grant = Some(grant);
            }
        }
        self.services
            .store
            .set_json(&key, &req, ttl_until(req.expires_at, now))
            .await
            .map_err(|e| ProtocolError::server_error("persist ciba completion", e))?;

        self.notify(&client, &req, now).await;
        Ok(())
    }

    async fn notify(&self, client: &ClientInfo, req: &CibaRequest, now: DateTime<Utc>) {
        match client.ciba_delivery_mode {
            CibaDeliveryMode::Poll => {}
            CibaDeliveryMode::Ping => self.ping(client, req).await,
            CibaDeliveryMode::Push => self.push(client, req, now).await,
        }
    }

    /// Best-effort: a non-2xx response is a warning, a transport error is
    /// logged as an error, and nothing propagates to the caller (spec §4.3
    /// "one attempt, no retry").
    async fn ping(&self, client: &ClientInfo, req: &CibaRequest) {
        let (Some(endpoint), Some(token)) = (&req.client_notification_endpoint, &req.client_notification_token) else {
            tracing::warn!(client_id = %client.client_id, "ciba ping mode configured without a notification endpoint or token");
            return;
        };
        let body = serde_json::json!({ "authenticationRequestId": req.auth_req_id });
        match self.http.post(endpoint).bearer_auth(token).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(client_id = %client.client_id, auth_req_id = %req.auth_req_id, "ciba ping delivered");
            }
            Ok(resp) => {
                tracing::warn!(client_id = %client.client_id, status = %resp.status(), "ciba ping received a non-2xx response");
            }
            Err(e) => {
                tracing::error!(client_id = %client.client_id, error = %e, "ciba ping delivery failed");
            }
        }
    }

    /// Generates the full token bundle and POSTs it; on generation failure
    /// the request transitions to Denied and the record is kept (spec
    /// §4.3). On a missing endpoint, transitions to Denied without
    /// attempting delivery.
    async fn push(&self, client: &ClientInfo, req: &CibaRequest, now: DateTime<Utc>) {
        let Some(endpoint) = req.client_notification_endpoint.clone() else {
            tracing::warn!(client_id = %client.client_id, "ciba push mode configured without a notification endpoint");
            self.mark_denied(req, now).await;
            return;
        };

        let payload = match req.status {
            CibaStatus::Authenticated => {
                let grant = req
                    .grant
                    .clone()
                    .expect("an Authenticated ciba request always carries a grant");
                let token_pipeline = TokenPipeline::new(self.services, self.config);
                match token_pipeline.mint_full_bundle(client, &grant, now).await {
                    Ok(issued) => serde_json::json!({
                        "access_token": issued.access_token,
                        "token_type": issued.token_type,
                        "expires_in": issued.expires_in,
                        "refresh_token": issued.refresh_token,
                        "id_token": issued.id_token,
                        "scope": issued.scope,
                    }),
                    Err(e) => {
                        tracing::error!(client_id = %client.client_id, error = %e, "ciba push token generation failed");
                        self.mark_denied(req, now).await;
                        return;
                    }
                }
            }
            _ => serde_json::json!({ "error": "access_denied" }),
        };

        let token = req.client_notification_token.as_deref().unwrap_or_default();
        match self.http.post(&endpoint).bearer_auth(token).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                if let Err(e) = self.services.store.remove(&StoreKey::CibaRequest(req.auth_req_id.clone())).await {
                    tracing::error!(auth_req_id = %req.auth_req_id, error = %e, "failed to clear delivered ciba request");
                }
                tracing::info!(client_id = %client.client_id, auth_req_id = %req.auth_req_id, "ciba push delivered");
            }
            Ok(resp) => {
                tracing::warn!(client_id = %client.client_id, status = %resp.status(), "ciba push received a non-2xx response");
            }
            Err(e) => {
                tracing::error!(client_id = %client.client_id, error = %e, "ciba push delivery failed");
            }
        }
    }

    async fn mark_denied(&self, req: &CibaRequest, now: DateTime<Utc>) {
        let mut denied = req.clone();
        denied.status = CibaStatus::Denied;
        if let Err(e) = self
            .services
            .store
            .set_json(&StoreKey::CibaRequest(req.auth_req_id.clone()), &denied, ttl_until(denied.expires_at, now))
            .await
        {
            tracing::error!(auth_req_id = %req.auth_req_id, error = %e, "failed to mark ciba request denied after push failure");
        }
    }
}

fn ttl_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expiry - now).to_std().unwrap_or(Duration::from_secs(0))
}
