//! Immutable server configuration, passed by reference into every pipeline
//! constructor (spec §9 "static configuration singletons" redesign flag).
//!
//! Loading follows the teacher's `config/oauth.rs` idiom: read an env var,
//! fall back to a sane default, parse, fall back again on a parse failure.

use crate::signer::SigningAlg;
use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub issuer: String,
    /// Algorithm used to sign server-issued access/refresh/logout tokens
    /// (id-tokens use the per-client `token_shaping.id_token_signing_alg`
    /// instead, spec §3).
    pub signing_alg: SigningAlg,
    pub lifetimes: TokenLifetimes,
    pub pairwise: PairwiseConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct TokenLifetimes {
    pub access_token_seconds: i64,
    pub id_token_seconds: i64,
    pub refresh_token_absolute_seconds: i64,
    pub refresh_token_sliding_seconds: i64,
    pub authorization_code_seconds: i64,
    pub device_code_seconds: i64,
    pub ciba_request_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct PairwiseConfig {
    /// Server-side secret salted into pairwise subject derivation (§4.7).
    /// Never transmitted; rotating it invalidates every pairwise subject.
    pub salt: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_failures_before_backoff: u32,
    pub max_backoff_seconds: u64,
    pub max_ip_failures_per_minute: u32,
    pub ip_sliding_window_seconds: i64,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(ServerConfig {
            issuer: env::var("OIDC_ISSUER").unwrap_or_else(|_| "https://localhost".to_string()),
            signing_alg: env::var("OAUTH_SIGNING_ALG")
                .ok()
                .and_then(|v| signing_alg_from_str(&v))
                .unwrap_or(SigningAlg::Rs256),
            lifetimes: TokenLifetimes {
                access_token_seconds: env_parse("OAUTH_ACCESS_TOKEN_TTL", 3600),
                id_token_seconds: env_parse("OAUTH_ID_TOKEN_TTL", 3600),
                refresh_token_absolute_seconds: env_parse("OAUTH_REFRESH_TOKEN_TTL", 604_800),
                refresh_token_sliding_seconds: env_parse("OAUTH_REFRESH_TOKEN_SLIDING_TTL", 1_209_600),
                authorization_code_seconds: env_parse("OAUTH_AUTH_CODE_TTL", 600),
                device_code_seconds: env_parse("OAUTH_DEVICE_CODE_TTL", 1800),
                ciba_request_seconds: env_parse("OAUTH_CIBA_REQUEST_TTL", 300),
            },
            pairwise: PairwiseConfig {
                salt: env::var("OAUTH_PAIRWISE_SALT")
                    .unwrap_or_else(|_| "change-me-pairwise-salt".to_string()),
            },
            rate_limit: RateLimitConfig {
                max_failures_before_backoff: env_parse("OAUTH_DEVICE_MAX_FAILURES", 5),
                max_backoff_seconds: env_parse("OAUTH_DEVICE_MAX_BACKOFF_SECONDS", 3600),
                max_ip_failures_per_minute: env_parse("OAUTH_DEVICE_MAX_IP_FAILURES", 10),
                ip_sliding_window_seconds: env_parse("OAUTH_DEVICE_IP_WINDOW_SECONDS", 60),
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn signing_alg_from_str(v: &str) -> Option<SigningAlg> {
    match v.to_ascii_uppercase().as_str() {
        "HS256" => Some(SigningAlg::Hs256),
        "RS256" => Some(SigningAlg::Rs256),
        "ES256" => Some(SigningAlg::Es256),
        "RS512" => Some(SigningAlg::Rs512),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = ServerConfig {
            issuer: "https://issuer.example".into(),
            signing_alg: SigningAlg::Rs256,
            lifetimes: TokenLifetimes {
                access_token_seconds: 3600,
                id_token_seconds: 3600,
                refresh_token_absolute_seconds: 604_800,
                refresh_token_sliding_seconds: 1_209_600,
                authorization_code_seconds: 600,
                device_code_seconds: 1800,
                ciba_request_seconds: 300,
            },
            pairwise: PairwiseConfig { salt: "s".into() },
            rate_limit: RateLimitConfig {
                max_failures_before_backoff: 5,
                max_backoff_seconds: 3600,
                max_ip_failures_per_minute: 10,
                ip_sliding_window_seconds: 60,
            },
        };
        assert_eq!(cfg.lifetimes.access_token_seconds, 3600);
    }
}
