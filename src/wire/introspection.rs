//! Introspection & revocation endpoint wire adapter (spec §6, RFC 7662 /
//! RFC 7009).

use crate::pipeline::IntrospectionResult;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct RawIntrospectionRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawRevocationRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
}

/// `{active:true, <payload>}` or `{active:false}` (spec §4.6) — the inner
/// claims are flattened so `active` sits alongside them at the top level,
/// never nested.
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionResponseWire {
    pub active: bool,
    #[serde(flatten)]
    pub payload: Option<serde_json::Value>,
}

pub fn encode(result: IntrospectionResult) -> IntrospectionResponseWire {
    IntrospectionResponseWire {
        active: result.active,
        payload: result.payload,
    }
}
