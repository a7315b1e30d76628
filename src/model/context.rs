//! The authorization agreement (spec §3 `AuthorizationContext`,
//! `AuthorizedGrant`).

use crate::model::{AuthSession, PkceMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The subset of id-token/userinfo claims a client requested via the
/// `claims` authorization parameter (spec §3 "requested_claims").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestedClaims {
    pub id_token: Vec<String>,
    pub userinfo: Vec<String>,
}

/// Immutable once produced by the authorization pipeline (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub client_id: String,
    pub scope: Vec<String>,
    pub resources: Vec<String>,
    pub nonce: Option<String>,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<PkceMethod>,
    pub requested_claims: RequestedClaims,
}

impl AuthorizationContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }
}

/// The tuple every downstream token operation consumes (spec §3
/// `AuthorizedGrant`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizedGrant {
    pub session: AuthSession,
    pub context: AuthorizationContext,
}

/// A flattened, JWT-claim-ready view of extra claims an id-token should
/// carry, populated from a `UserInfoProvider` lookup (spec §6).
pub type ClaimMap = BTreeMap<String, serde_json::Value>;

/// Non-sensitive bookkeeping attached to a grant once code/tokens are
/// minted, used to compute `expires_at` for stored records.
#[derive(Debug, Clone, Copy)]
pub struct GrantTiming {
    pub issued_at: DateTime<Utc>,
}
