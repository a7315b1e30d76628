//! User-code rate limiter (spec §4.4), the half of component J that is not
//! the device-flow state machine itself. Grounded on the teacher's
//! `app/utils/rate_limiter.rs` token-bucket (`RateLimitError` shape,
//! `Arc<Mutex<HashMap<..>>>` style state), but keyed into the shared
//! `KVStore` rather than an in-process map, since spec §5 requires the
//! limiter state to live wherever every other record lives.

use crate::config::RateLimitConfig;
use crate::store::{KVStore, StoreKey, TypedStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limited, retry after {retry_after_seconds}s")]
    Blocked { retry_after_seconds: i64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserCodeState {
    first_failure_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    failure_count: u32,
    blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IpWindowState {
    /// Failure timestamps within the sliding window; pruned on read.
    failures: Vec<DateTime<Utc>>,
}

pub struct RateLimiter<'a> {
    store: &'a dyn KVStore,
    config: &'a RateLimitConfig,
}

impl<'a> RateLimiter<'a> {
    pub fn new(store: &'a dyn KVStore, config: &'a RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Returns `Ok(true)` to proceed, `Err(retry_after)` to reject (spec
    /// §4.4 `CheckAsync`). Call before attempting to resolve `user_code`.
    pub async fn check(
        &self,
        user_code: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RateLimitError> {
        if let Some(retry_after) = self.user_code_blocked_for(user_code, now).await {
            tracing::warn!(user_code, retry_after, "device flow user-code rate limited");
            return Err(RateLimitError::Blocked {
                retry_after_seconds: retry_after,
            });
        }
        if let Some(retry_after) = self.ip_blocked_for(client_ip, now).await {
            tracing::warn!(client_ip, retry_after, "device flow per-ip rate limited");
            return Err(RateLimitError::Blocked {
                retry_after_seconds: retry_after,
            });
        }
        Ok(true)
    }

    async fn user_code_blocked_for(&self, user_code: &str, now: DateTime<Utc>) -> Option<i64> {
        let key = StoreKey::UserCodeRateLimit(user_code.to_string());
        let state: UserCodeState = self.store.get_json(&key).await.ok().flatten().unwrap_or_default();
        match state.blocked_until {
            Some(until) if until > now => Some((until - now).num_seconds().max(1)),
            _ => None,
        }
    }

    async fn ip_blocked_for(&self, client_ip: &str, now: DateTime<Utc>) -> Option<i64> {
        let key = StoreKey::IpRateLimit(client_ip.to_string());
        let state: IpWindowState = self.store.get_json(&key).await.ok().flatten().unwrap_or_default();
        let window = chrono::Duration::seconds(self.config.ip_sliding_window_seconds);
        let recent: Vec<_> = state
            .failures
            .into_iter()
            .filter(|ts| now - *ts < window)
            .collect();
        if recent.len() as u32 >= self.config.max_ip_failures_per_minute {
            let oldest = *recent.iter().min().unwrap();
            let elapsed = now - oldest;
            let remaining = window - elapsed;
            return Some(remaining.num_seconds().max(1));
        }
        None
    }

    /// Records a mismatched user-code attempt, applying exponential
    /// backoff after `max_failures_before_backoff` failures (spec §4.4).
    pub async fn record_failure(&self, user_code: &str, client_ip: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.record_user_code_failure(user_code, now).await?;
        self.record_ip_failure(client_ip, now).await?;
        Ok(())
    }

    async fn record_user_code_failure(&self, user_code: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        let key = StoreKey::UserCodeRateLimit(user_code.to_string());
        let mut state: UserCodeState = self.store.get_json(&key).await?.unwrap_or_default();
        state.first_failure_at.get_or_insert(now);
        state.last_failure_at = Some(now);
        state.failure_count += 1;

        if state.failure_count > self.config.max_failures_before_backoff {
            let exponent = state.failure_count - self.config.max_failures_before_backoff;
            let backoff_seconds = 2u64
                .checked_pow(exponent)
                .unwrap_or(u64::MAX)
                .min(self.config.max_backoff_seconds);
            state.blocked_until = Some(now + chrono::Duration::seconds(backoff_seconds as i64));
            tracing::warn!(user_code, backoff_seconds, "device flow user-code backoff engaged");
        }

        self.store.set_json(&key, &state, Duration::from_secs(86_400)).await
    }

    async fn record_ip_failure(&self, client_ip: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        let key = StoreKey::IpRateLimit(client_ip.to_string());
        let mut state: IpWindowState = self.store.get_json(&key).await?.unwrap_or_default();
        let window = chrono::Duration::seconds(self.config.ip_sliding_window_seconds);
        state.failures.retain(|ts| now - *ts < window);
        state.failures.push(now);
        self.store
            .set_json(
                &key,
                &state,
                Duration::from_secs(self.config.ip_sliding_window_seconds.max(0) as u64),
            )
            .await
    }

    /// Clears a user code's limiter state on success (spec §4.4 "on
    /// success, both records are deleted" — the rate-limit record follows
    /// suit so a reissued code with the same text, if ever recycled,
    /// starts clean).
    pub async fn clear(&self, user_code: &str) -> anyhow::Result<()> {
        self.store
            .remove(&StoreKey::UserCodeRateLimit(user_code.to_string()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            max_failures_before_backoff: 2,
            max_backoff_seconds: 3600,
            max_ip_failures_per_minute: 100,
            ip_sliding_window_seconds: 60,
        }
    }

    #[tokio::test]
    async fn backoff_engages_after_threshold() {
        let store = InMemoryStore::new();
        let cfg = config();
        let limiter = RateLimiter::new(&store, &cfg);
        let now = Utc::now();

        for _ in 0..2 {
            limiter.record_failure("U1", "1.2.3.4", now).await.unwrap();
        }
        assert!(limiter.check("U1", "1.2.3.4", now).await.unwrap());

        limiter.record_failure("U1", "1.2.3.4", now).await.unwrap();
        let err = limiter.check("U1", "1.2.3.4", now).await.unwrap_err();
        match err {
            RateLimitError::Blocked { retry_after_seconds } => assert!(retry_after_seconds > 0),
        }
    }

    #[tokio::test]
    async fn unblocks_once_retry_after_elapses() {
        let store = InMemoryStore::new();
        let cfg = config();
        let limiter = RateLimiter::new(&store, &cfg);
        let now = Utc::now();

        for _ in 0..3 {
            limiter.record_failure("U2", "1.2.3.4", now).await.unwrap();
        }
        limiter.check("U2", "1.2.3.4", now).await.unwrap_err();

        let later = now + chrono::Duration::seconds(10);
        assert!(limiter.check("U2", "1.2.3.4", later).await.unwrap());
    }
}
