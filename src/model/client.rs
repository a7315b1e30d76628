//! Registered-client metadata (spec §3 `ClientInfo`), grounded on
//! `app/models/oauth/client.rs`'s field vocabulary, generalized off Diesel
//! and widened with the policy/token-shaping/endpoint fields §3 names.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
    ClientCredentials,
    Password,
    Ciba,
    DeviceCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
    Token,
    IdToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Public,
    Pairwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibaDeliveryMode {
    Poll,
    Ping,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PkceMethod {
    Plain,
    S256,
    S512,
}

/// Per-client token lifetimes, overriding server defaults (spec §3 "Token
/// shaping").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTokenShaping {
    pub access_token_seconds: i64,
    pub id_token_seconds: i64,
    pub refresh_token_seconds: i64,
    pub authorization_code_seconds: i64,
    pub refresh_allow_reuse: bool,
    pub refresh_absolute_seconds: i64,
    pub refresh_sliding_seconds: i64,
    pub id_token_signing_alg: crate::signer::SigningAlg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: String,
    /// Hash of the client secret; `None` for a public client.
    pub secret_hash: Option<String>,

    pub allowed_grant_types: HashSet<GrantType>,
    pub allowed_response_types: HashSet<ResponseType>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub sector_identifier_uri: Option<String>,
    pub subject_type: SubjectType,
    pub pkce_required: bool,
    pub allowed_pkce_methods: HashSet<PkceMethod>,
    pub allowed_scopes: HashSet<String>,
    pub offline_access_allowed: bool,

    pub token_shaping: ClientTokenShaping,

    pub front_channel_logout_uri: Option<String>,
    pub front_channel_logout_requires_session_id: bool,
    pub back_channel_logout_uri: Option<String>,
    pub back_channel_logout_requires_session_id: bool,

    pub ciba_client_notification_endpoint: Option<String>,
    pub ciba_delivery_mode: CibaDeliveryMode,

    /// Include user claims inline in the id-token even when an access token
    /// is also returned in a hybrid response (spec §9 pinned decision).
    pub force_user_claims_in_id_token: bool,

    /// Permit plain `http://localhost` redirect/logout URIs (spec §3
    /// invariant carve-out for native app loopback redirects).
    pub allow_localhost_http: bool,
}

impl ClientInfo {
    pub fn is_public(&self) -> bool {
        self.secret_hash.is_none()
    }

    pub fn has_grant(&self, grant: GrantType) -> bool {
        self.allowed_grant_types.contains(&grant)
    }

    pub fn has_response_type(&self, rt: ResponseType) -> bool {
        self.allowed_response_types.contains(&rt)
    }

    /// Redirect URIs compare by exact string equality (spec §4.1 edge
    /// policy) — never prefix or host-only matching.
    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Validates the URI-field invariant from spec §3: absolute HTTPS,
    /// unless it's `http://localhost` (or `127.0.0.1`) and the client
    /// explicitly opts into that.
    pub fn validate_uri(&self, uri: &str) -> anyhow::Result<()> {
        let parsed = url::Url::parse(uri).map_err(|e| anyhow::anyhow!("invalid URI {uri}: {e}"))?;
        if parsed.scheme() == "https" {
            return Ok(());
        }
        let is_loopback_host = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
        if parsed.scheme() == "http" && is_loopback_host && self.allow_localhost_http {
            return Ok(());
        }
        anyhow::bail!("URI {uri} must be absolute HTTPS (localhost HTTP only if explicitly allowed)")
    }

    /// Pairwise subject derivation requires either a sector-identifier URI
    /// or an unambiguous redirect-URI host (spec §3 invariant).
    pub fn validate_pairwise_invariant(&self) -> anyhow::Result<()> {
        if self.subject_type != SubjectType::Pairwise {
            return Ok(());
        }
        if self.sector_identifier_uri.is_some() {
            return Ok(());
        }
        let hosts: HashSet<Option<String>> = self
            .redirect_uris
            .iter()
            .map(|uri| url::Url::parse(uri).ok().map(|u| u.host_str().unwrap_or("").to_string()))
            .collect();
        if hosts.len() == 1 && hosts.iter().next().map(|h| h.is_some()).unwrap_or(false) {
            return Ok(());
        }
        anyhow::bail!(
            "pairwise subject type requires a sector_identifier_uri or an unambiguous redirect-URI host"
        )
    }

    /// The host used to derive a pairwise subject (spec §4.7): the sector
    /// identifier URI's host if set, else the sole redirect-URI host.
    pub fn sector_host(&self) -> Option<String> {
        if let Some(sector) = &self.sector_identifier_uri {
            return url::Url::parse(sector).ok().and_then(|u| u.host_str().map(str::to_string));
        }
        self.redirect_uris
            .first()
            .and_then(|uri| url::Url::parse(uri).ok())
            .and_then(|u| u.host_str().map(str::to_string))
    }
}
