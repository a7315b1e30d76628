//! An in-memory `KVStore` fake, grounded on the teacher's
//! `app/services/session/drivers/array_driver.rs` in-process driver: a
//! `HashMap` behind a lock standing in for a real backend. Suitable for
//! tests and for embedding this crate without a distributed cache.

use super::{KVStore, StoreKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<StoreKey, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry, now: DateTime<Utc>) -> bool {
        entry.expires_at > now
    }
}

#[async_trait]
impl KVStore for InMemoryStore {
    async fn get(&self, key: &StoreKey) -> anyhow::Result<Option<Vec<u8>>> {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if Self::is_live(entry, now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &StoreKey, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        self.entries.lock().unwrap().insert(
            key.clone(),
            Entry {
                value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &StoreKey) -> anyhow::Result<Option<Vec<u8>>> {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.remove(key) {
            Some(entry) if Self::is_live(&entry, now) => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStore::new();
        let key = StoreKey::Session("s1".into());
        store
            .set(&key, b"hello".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn remove_is_at_most_once() {
        let store = InMemoryStore::new();
        let key = StoreKey::AuthorizationCode("c1".into());
        store
            .set(&key, b"grant".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let first = store.remove(&key).await.unwrap();
        let second = store.remove(&key).await.unwrap();
        assert_eq!(first, Some(b"grant".to_vec()));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = InMemoryStore::new();
        let key = StoreKey::DeviceCodeByPrimary("d1".into());
        store
            .set(&key, b"x".to_vec(), Duration::from_secs(0))
            .await
            .unwrap();
        // TTL of 0 already elapsed relative to "now" at read time.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
