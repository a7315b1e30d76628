//! Token-registry entry (spec §3): `{jti -> {status, expiry}}`, auto-evicted
//! by the store's own TTL once `now > expiry`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub status: RegistryStatus,
    pub expiry: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn active(expiry: DateTime<Utc>) -> Self {
        Self {
            status: RegistryStatus::Active,
            expiry,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == RegistryStatus::Active && now <= self.expiry
    }
}
