//! Typed key factory (spec §3 "all records live in an abstract KV store
//! keyed by a typed key factory"). Centralizing key construction here means
//! every pipeline reaches `StoreKey` variants instead of hand-building
//! strings, so a colliding prefix is a compile error, not a runtime bug.

/// A key into the shared `KVStore`. `as_bytes` is the wire representation;
/// two `StoreKey`s with the same bytes MUST address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    AuthorizationCode(String),
    RefreshTokenRegistry(String),
    AccessTokenRegistry(String),
    Session(String),
    SessionsBySubject(String),
    DeviceCodeByPrimary(String),
    DeviceCodeByUserCode(String),
    UserCodeRateLimit(String),
    IpRateLimit(String),
    CibaRequest(String),
    PushedAuthorizationRequest(String),
}

impl StoreKey {
    pub fn as_bytes(&self) -> Vec<u8> {
        let s = match self {
            StoreKey::AuthorizationCode(id) => format!("auth_code:{id}"),
            StoreKey::RefreshTokenRegistry(jti) => format!("registry:refresh:{jti}"),
            StoreKey::AccessTokenRegistry(jti) => format!("registry:access:{jti}"),
            StoreKey::Session(sid) => format!("session:{sid}"),
            StoreKey::SessionsBySubject(sub) => format!("sessions_by_subject:{sub}"),
            StoreKey::DeviceCodeByPrimary(code) => format!("device_code:{code}"),
            StoreKey::DeviceCodeByUserCode(code) => format!("user_code:{code}"),
            StoreKey::UserCodeRateLimit(code) => format!("rate_limit:user_code:{code}"),
            StoreKey::IpRateLimit(ip) => format!("rate_limit:ip:{ip}"),
            StoreKey::CibaRequest(id) => format!("ciba:{id}"),
            StoreKey::PushedAuthorizationRequest(id) => format!("par:{id}"),
        };
        s.into_bytes()
    }
}
