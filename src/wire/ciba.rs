//! CIBA backchannel authentication endpoint wire adapter (spec §6).

use super::split_space_separated;
use crate::pipeline::CibaInitiation;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct RawCibaAuthenticationRequest {
    pub client_id: String,
    pub scope: Option<String>,
    pub resource: Vec<String>,
    pub client_notification_token: Option<String>,
}

pub struct DecodedCibaAuthenticationRequest {
    pub scope: Vec<String>,
    pub resources: Vec<String>,
    pub client_notification_token: Option<String>,
}

pub fn decode(raw: &RawCibaAuthenticationRequest) -> DecodedCibaAuthenticationRequest {
    DecodedCibaAuthenticationRequest {
        scope: raw.scope.as_deref().map(split_space_separated).unwrap_or_default(),
        resources: raw.resource.clone(),
        client_notification_token: raw.client_notification_token.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CibaResponseWire {
    pub auth_req_id: String,
    pub expires_in: i64,
    pub interval: u32,
}

pub fn encode(initiation: CibaInitiation) -> CibaResponseWire {
    CibaResponseWire {
        auth_req_id: initiation.auth_req_id,
        expires_in: initiation.expires_in,
        interval: initiation.interval,
    }
}
