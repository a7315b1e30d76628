//! Token registry (spec §3, component A): a revocation bitset keyed by
//! token id, TTL-bounded. Generalized from the teacher's
//! `TokenService::revoke_access_token` / `revoke_refresh_token`, which flip
//! a Diesel `revoked` column — here the same status-flip lives in the
//! `KVStore` as a small JSON record that the store itself evicts once its
//! TTL elapses.

use crate::model::{RegistryEntry, RegistryStatus};
use crate::store::{KVStore, StoreKey, TypedStore};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub struct TokenRegistry<'a> {
    store: &'a dyn KVStore,
}

impl<'a> TokenRegistry<'a> {
    pub fn new(store: &'a dyn KVStore) -> Self {
        Self { store }
    }

    fn key(kind: RegistryKind, jti: &str) -> StoreKey {
        match kind {
            RegistryKind::AccessToken => StoreKey::AccessTokenRegistry(jti.to_string()),
            RegistryKind::RefreshToken => StoreKey::RefreshTokenRegistry(jti.to_string()),
        }
    }

    pub async fn register_active(
        &self,
        kind: RegistryKind,
        jti: &str,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let entry = RegistryEntry::active(expiry);
        let ttl = ttl_until(expiry, now);
        self.store.set_json(&Self::key(kind, jti), &entry, ttl).await
    }

    /// Marks `jti` Revoked with `expiry=original_exp`, durable before any
    /// caller proceeds to hand out a replacement token (spec §5 ordering
    /// guarantee on refresh-token rotation).
    pub async fn revoke(
        &self,
        kind: RegistryKind,
        jti: &str,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let entry = RegistryEntry {
            status: RegistryStatus::Revoked,
            expiry,
        };
        let ttl = ttl_until(expiry, now);
        self.store.set_json(&Self::key(kind, jti), &entry, ttl).await
    }

    /// `true` only when the entry exists, is `Active`, and has not expired.
    /// A missing entry (evicted by TTL, or never registered) is treated as
    /// not usable — callers that need "absent means valid" should register
    /// every minted token immediately.
    pub async fn is_active(&self, kind: RegistryKind, jti: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
        match self.store.get_json::<RegistryEntry>(&Self::key(kind, jti)).await? {
            Some(entry) => Ok(entry.is_usable(now)),
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    AccessToken,
    RefreshToken,
}

fn ttl_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expiry - now).to_std().unwrap_or(Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn revoked_entry_is_not_active() {
        let store = InMemoryStore::new();
        let registry = TokenRegistry::new(&store);
        let now = Utc::now();
        let expiry = now + chrono::Duration::seconds(60);

        registry
            .register_active(RegistryKind::RefreshToken, "jti-1", expiry, now)
            .await
            .unwrap();
        assert!(registry.is_active(RegistryKind::RefreshToken, "jti-1", now).await.unwrap());

        registry
            .revoke(RegistryKind::RefreshToken, "jti-1", expiry, now)
            .await
            .unwrap();
        assert!(!registry.is_active(RegistryKind::RefreshToken, "jti-1", now).await.unwrap());
    }

    #[tokio::test]
    async fn unregistered_jti_is_not_active() {
        let store = InMemoryStore::new();
        let registry = TokenRegistry::new(&store);
        assert!(!registry
            .is_active(RegistryKind::AccessToken, "never-seen", Utc::now())
            .await
            .unwrap());
    }
}
