//! The one shared mutable surface (spec §5): an abstract, linearizable-per-key
//! KV store. The core owns record lifecycle; the store owns raw bytes and TTL
//! enforcement, and is expected to be backed by a distributed cache in
//! production — that backend is an external collaborator, out of scope here.

pub mod keys;
pub mod memory;

use async_trait::async_trait;
use std::time::Duration;

pub use keys::StoreKey;
pub use memory::InMemoryStore;

/// Narrow storage interface every pipeline depends on. Implementations must
/// linearize writes per key (spec §5's rate-limiter ordering note) and must
/// make authorization-code / refresh-token removal atomic: a successful
/// `remove` is observed by at most one caller.
#[async_trait]
pub trait KVStore: Send + Sync {
    async fn get(&self, key: &StoreKey) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &StoreKey, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()>;
    /// Atomically removes and returns the prior value, or `None` if absent.
    /// Authorization-code redemption and refresh-token rotation both depend
    /// on this being a single remove-and-return, not a read followed by a
    /// remove.
    async fn remove(&self, key: &StoreKey) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Convenience helpers layered on `KVStore` for JSON-encoded records, so
/// pipelines never touch raw bytes directly.
#[async_trait]
pub trait TypedStore: KVStore {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &StoreKey,
    ) -> anyhow::Result<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &StoreKey,
        value: &T,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, ttl).await
    }

    async fn remove_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &StoreKey,
    ) -> anyhow::Result<Option<T>> {
        match self.remove(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<S: KVStore + ?Sized> TypedStore for S {}
