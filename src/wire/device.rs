//! Device authorization endpoint wire adapter (spec §6, RFC 8628).

use super::split_space_separated;
use crate::pipeline::DeviceInitiation;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct RawDeviceAuthorizationRequest {
    pub client_id: String,
    pub scope: Option<String>,
    pub resource: Vec<String>,
}

pub struct DecodedDeviceAuthorizationRequest {
    pub client_id: String,
    pub scope: Vec<String>,
    pub resources: Vec<String>,
}

pub fn decode(raw: &RawDeviceAuthorizationRequest) -> DecodedDeviceAuthorizationRequest {
    DecodedDeviceAuthorizationRequest {
        client_id: raw.client_id.clone(),
        scope: raw.scope.as_deref().map(split_space_separated).unwrap_or_default(),
        resources: raw.resource.clone(),
    }
}

/// `{device_code, user_code, verification_uri, verification_uri_complete?,
/// expires_in, interval}` (spec §6). `verification_uri` is supplied by the
/// host at encode time since this crate owns no HTTP routes of its own.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAuthorizationResponseWire {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    pub expires_in: i64,
    pub interval: u32,
}

pub fn encode(initiation: DeviceInitiation, verification_uri: &str) -> DeviceAuthorizationResponseWire {
    let complete = format!("{verification_uri}?user_code={}", urlencoding::encode(&initiation.user_code));
    DeviceAuthorizationResponseWire {
        device_code: initiation.device_code,
        user_code: initiation.user_code,
        verification_uri: verification_uri.to_string(),
        verification_uri_complete: Some(complete),
        expires_in: initiation.expires_in,
        interval: initiation.interval,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawUserCodeSubmission {
    pub user_code: String,
    pub client_ip: String,
}
