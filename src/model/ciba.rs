//! Client-Initiated Backchannel Authentication request record (spec §3).

use crate::model::AuthorizedGrant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibaStatus {
    Pending,
    Authenticated,
    Denied,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CibaRequest {
    pub auth_req_id: String,
    pub client_id: String,
    pub scope: Vec<String>,
    pub resources: Vec<String>,
    pub grant: Option<AuthorizedGrant>,
    pub status: CibaStatus,
    pub client_notification_endpoint: Option<String>,
    pub client_notification_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub interval: u32,
    pub last_poll_at: Option<DateTime<Utc>>,
}

impl CibaRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
