//! Authorization-code record (spec §3): `{grant, expires_at}`, single-use,
//! keyed by an opaque code; removed on first redemption.

use crate::model::AuthorizedGrant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCodeRecord {
    pub grant: AuthorizedGrant,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCodeRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
