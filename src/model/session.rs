//! Authenticated user session (spec §3 `AuthSession`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    /// Opaque user id.
    pub subject: String,
    /// Opaque session id (the OIDC `sid`).
    pub session_id: String,
    pub authentication_time: DateTime<Utc>,
    pub identity_provider: String,
    pub acr: Option<String>,
    /// Ordered set of clients that have reused this session (spec §3: "sign-in tick").
    pub affected_client_ids: Vec<String>,
}

impl AuthSession {
    pub fn new(subject: String, session_id: String, identity_provider: String, now: DateTime<Utc>) -> Self {
        Self {
            subject,
            session_id,
            authentication_time: now,
            identity_provider,
            acr: None,
            affected_client_ids: Vec::new(),
        }
    }

    /// Appends `client_id` to `affected_client_ids` if not already present
    /// (spec §4.1 step 6 "sign-in tick"). Returns whether a mutation occurred.
    pub fn record_client(&mut self, client_id: &str) -> bool {
        if self.affected_client_ids.iter().any(|c| c == client_id) {
            return false;
        }
        self.affected_client_ids.push(client_id.to_string());
        true
    }

    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.authentication_time).num_seconds()
    }
}
