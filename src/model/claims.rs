//! JWT claim sets minted by the token-minting subsystem (spec §4.7).
//! Field order is explicit (derive order = serialize order under
//! `serde_json`'s default map-ordering when built through these structs)
//! so payloads stay byte-stable under test, per spec §9's "lazy claim
//! population" redesign flag.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub aud: Vec<String>,
    pub sub: String,
    pub sid: Option<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub scope: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub sid: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    /// Userinfo-scoped claims merged atop the standard claims (spec §4.7),
    /// flattened into the top-level JWT object at serialization time.
    #[serde(flatten)]
    pub user_claims: std::collections::BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub jti: String,
    pub sub: String,
    pub sid: Option<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub aud: String,
    pub scope: Vec<String>,
    pub resources: Vec<String>,
    /// RFC 7519 `typ`-like marker carried inside the claim set (the real
    /// `typ` lives in the JWS header) so a refresh token is never accepted
    /// where an access token is expected, even if both are HS256 JWTs.
    pub typ: RefreshTokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshTokenType {
    #[serde(rename = "refresh+jwt")]
    RefreshJwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutTokenEvents {
    #[serde(rename = "http://schemas.openid.net/event/backchannel-logout")]
    pub backchannel_logout: serde_json::Value,
}

impl Default for LogoutTokenEvents {
    fn default() -> Self {
        Self {
            backchannel_logout: serde_json::json!({}),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub iat: i64,
    pub jti: String,
    pub events: LogoutTokenEvents,
}
