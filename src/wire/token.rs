//! Token endpoint wire adapter (spec §6, §9).
//!
//! Grounded on `app/http/controllers/oauth/token_controller.rs`'s
//! `application/x-www-form-urlencoded` grant-type dispatch.

use super::split_space_separated;
use crate::error::ProtocolError;
use crate::pipeline::{TokenIssued, TokenRequest};
use serde::Serialize;

/// The raw form body of a token request, all fields optional strings since
/// which ones are required depends entirely on `grant_type` (spec §6).
#[derive(Debug, Clone, Default)]
pub struct RawTokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub resource: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_req_id: Option<String>,
    pub device_code: Option<String>,
}

pub fn decode(raw: &RawTokenRequest) -> Result<TokenRequest, ProtocolError> {
    let scope_list = || raw.scope.as_deref().map(split_space_separated).unwrap_or_default();

    match raw.grant_type.as_str() {
        "authorization_code" => Ok(TokenRequest::AuthorizationCode {
            client_id: raw.client_id.clone(),
            client_secret: raw.client_secret.clone(),
            code: raw.code.clone().ok_or_else(|| ProtocolError::invalid_request("code is required"))?,
            redirect_uri: raw.redirect_uri.clone().ok_or_else(|| ProtocolError::invalid_request("redirect_uri is required"))?,
            code_verifier: raw.code_verifier.clone(),
        }),
        "refresh_token" => Ok(TokenRequest::RefreshToken {
            client_id: raw.client_id.clone(),
            client_secret: raw.client_secret.clone(),
            refresh_token: raw.refresh_token.clone().ok_or_else(|| ProtocolError::invalid_request("refresh_token is required"))?,
            scope: raw.scope.as_deref().map(split_space_separated),
        }),
        "client_credentials" => Ok(TokenRequest::ClientCredentials {
            client_id: raw.client_id.clone(),
            client_secret: raw.client_secret.clone(),
            scope: scope_list(),
            resources: raw.resource.clone(),
        }),
        "password" => Ok(TokenRequest::Password {
            client_id: raw.client_id.clone(),
            client_secret: raw.client_secret.clone(),
            username: raw.username.clone().ok_or_else(|| ProtocolError::invalid_request("username is required"))?,
            password: raw.password.clone().ok_or_else(|| ProtocolError::invalid_request("password is required"))?,
            scope: scope_list(),
        }),
        "urn:openid:params:grant-type:ciba" => Ok(TokenRequest::Ciba {
            client_id: raw.client_id.clone(),
            client_secret: raw.client_secret.clone(),
            auth_req_id: raw.auth_req_id.clone().ok_or_else(|| ProtocolError::invalid_request("auth_req_id is required"))?,
        }),
        "urn:ietf:params:oauth:grant-type:device_code" => Ok(TokenRequest::DeviceCode {
            client_id: raw.client_id.clone(),
            client_secret: raw.client_secret.clone(),
            device_code: raw.device_code.clone().ok_or_else(|| ProtocolError::invalid_request("device_code is required"))?,
        }),
        other => Err(ProtocolError::unsupported_grant_type(format!("unsupported grant_type: {other}"))),
    }
}

/// The literal `{access_token, token_type, expires_in, refresh_token?,
/// id_token?, scope?}` response shape (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponseWire {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

pub fn encode(issued: TokenIssued) -> TokenResponseWire {
    TokenResponseWire {
        access_token: issued.access_token,
        token_type: issued.token_type,
        expires_in: issued.expires_in,
        refresh_token: issued.refresh_token,
        id_token: issued.id_token,
        scope: issued.scope,
    }
}
