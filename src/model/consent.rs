//! Consent decision returned by a `ConsentProvider` (spec §4.1 step 5,
//! §6 `ConsentProvider: (request, session) -> {granted, pending}`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingConsent {
    pub scopes: Vec<String>,
    pub resources: Vec<String>,
}

impl PendingConsent {
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty() && self.resources.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentDecision {
    pub granted_scopes: Vec<String>,
    pub granted_resources: Vec<String>,
    pub pending: PendingConsent,
}
