//! The boundary error type every endpoint pipeline returns.
//!
//! `ProtocolError` carries one of the OAuth 2.0 / OIDC error codes the
//! client is allowed to see. Internal failures (storage, signing) are never
//! surfaced directly — they are wrapped with `anyhow::Context` at the call
//! site and classified into `ProtocolError::ServerError` here, so no cause
//! chain leaks implementation detail into the wire response.

use serde::Serialize;
use thiserror::Error;

/// A single OAuth/OIDC error code, serialized exactly as the spec names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    LoginRequired,
    ConsentRequired,
    AccountSelectionRequired,
    InteractionRequired,
    AuthorizationPending,
    SlowDown,
    ExpiredToken,
    AccessDenied,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidClient => "invalid_client",
            ErrorCode::InvalidGrant => "invalid_grant",
            ErrorCode::UnauthorizedClient => "unauthorized_client",
            ErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            ErrorCode::InvalidScope => "invalid_scope",
            ErrorCode::LoginRequired => "login_required",
            ErrorCode::ConsentRequired => "consent_required",
            ErrorCode::AccountSelectionRequired => "account_selection_required",
            ErrorCode::InteractionRequired => "interaction_required",
            ErrorCode::AuthorizationPending => "authorization_pending",
            ErrorCode::SlowDown => "slow_down",
            ErrorCode::ExpiredToken => "expired_token",
            ErrorCode::AccessDenied => "access_denied",
            ErrorCode::ServerError => "server_error",
        }
    }
}

/// Structured `{error, error_description}` returned to the client.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{code:?}: {description}")]
#[serde(into = "ErrorBody")]
pub struct ProtocolError {
    pub code: ErrorCode,
    pub description: String,
}

/// The literal `{error, error_description}` wire shape (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

impl From<ProtocolError> for ErrorBody {
    fn from(e: ProtocolError) -> Self {
        ErrorBody {
            error: e.code.as_str(),
            error_description: e.description,
        }
    }
}

impl ProtocolError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidClient, description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant, description)
    }

    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnauthorizedClient, description)
    }

    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedGrantType, description)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidScope, description)
    }

    pub fn login_required() -> Self {
        Self::new(ErrorCode::LoginRequired, "interactive login is required")
    }

    pub fn consent_required() -> Self {
        Self::new(ErrorCode::ConsentRequired, "user consent is required")
    }

    pub fn account_selection_required() -> Self {
        Self::new(
            ErrorCode::AccountSelectionRequired,
            "more than one session is available; account selection is required",
        )
    }

    pub fn authorization_pending() -> Self {
        Self::new(
            ErrorCode::AuthorizationPending,
            "the authorization request is still pending end-user interaction",
        )
    }

    pub fn slow_down() -> Self {
        Self::new(
            ErrorCode::SlowDown,
            "the client is polling more frequently than the allowed interval",
        )
    }

    pub fn expired_token(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExpiredToken, description)
    }

    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessDenied, description)
    }

    /// Wraps an internal/infra failure (storage, signer, ...) as a `server_error`,
    /// logging the cause so it is not lost but never placing it on the wire.
    pub fn server_error(context: &str, cause: anyhow::Error) -> Self {
        tracing::error!(error = %cause, context, "server_error");
        Self::new(ErrorCode::ServerError, context.to_string())
    }
}

/// Non-error terminal states in the authorization pipeline (§4.1, §7).
///
/// These are not failures — a caller translates them into UI redirects
/// (login page, account picker, consent screen) rather than an error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainDecision<S> {
    LoginRequired,
    AccountSelectionRequired(Vec<crate::model::AuthSession>),
    ConsentRequired(crate::model::PendingConsent),
    Success(S),
}
