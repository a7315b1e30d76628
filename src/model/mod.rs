//! The data model (spec §3), generalized from the teacher's
//! `app/models/oauth/*` Diesel-backed structs: same field vocabulary
//! (id/user_id/client_id/scopes/revoked/expires_at), minus the `Queryable`/
//! `Insertable` coupling to a schema this crate does not own, plus the
//! fields §3 names that the teacher's schema does not carry (resources,
//! acr, sector identifier, pairwise subject type, CIBA delivery mode).

pub mod ciba;
pub mod claims;
pub mod client;
pub mod code;
pub mod consent;
pub mod context;
pub mod device;
pub mod registry;
pub mod session;

pub use ciba::{CibaRequest, CibaStatus};
pub use claims::{
    AccessTokenClaims, IdTokenClaims, LogoutTokenClaims, LogoutTokenEvents, RefreshTokenClaims,
    RefreshTokenType,
};
pub use client::{CibaDeliveryMode, ClientInfo, GrantType, PkceMethod, ResponseType, SubjectType};
pub use code::AuthorizationCodeRecord;
pub use consent::{ConsentDecision, PendingConsent};
pub use context::{AuthorizationContext, AuthorizedGrant, ClaimMap, RequestedClaims};
pub use device::{DeviceRequest, DeviceStatus};
pub use registry::{RegistryEntry, RegistryStatus};
pub use session::AuthSession;
