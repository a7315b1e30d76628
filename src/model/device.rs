//! Device Authorization record (spec §3 `DeviceRequest`, RFC 8628).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Pending,
    Authorized,
    Denied,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRequest {
    pub device_code: String,
    pub user_code: String,
    pub client_id: String,
    pub scope: Vec<String>,
    pub resources: Vec<String>,
    pub status: DeviceStatus,
    pub interval: u32,
    pub expires_at: DateTime<Utc>,
    /// Populated once a user authorizes the request at the verification URI.
    pub subject: Option<String>,
    pub session_id: Option<String>,
    /// Timestamp of the most recent poll, used for `slow_down` enforcement
    /// (spec §4.4, §8 S4).
    pub last_poll_at: Option<DateTime<Utc>>,
}

impl DeviceRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
