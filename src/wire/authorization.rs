//! Authorization endpoint wire adapter (spec §6, §9).
//!
//! Grounded on
//! `app/http/controllers/oauth/authorization_controller.rs`'s query-struct
//! extraction, generalized off axum's `Query<T>` into a plain decode
//! function so the crate stays transport-agnostic.

use super::{append_params, decode_code_challenge_method, decode_prompt, decode_response_mode, decode_response_type, split_space_separated};
use crate::error::{ErrorCode, ProtocolError};
use crate::pipeline::{default_response_mode, AuthorizationOutcome, AuthorizationRequest, AuthorizationSuccess, Prompt, ResponseMode};

/// The raw query/form parameters an HTTP layer hands in, all still strings
/// (spec §6 "Authorization request: query or form").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RawAuthorizationRequest {
    pub client_id: String,
    pub browser_session_key: String,
    pub response_type: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub resource: Vec<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub prompt: Option<String>,
    pub max_age: Option<String>,
    pub acr_values: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub claims: Option<String>,
    pub response_mode: Option<String>,
    /// A self-contained request object JWT (unsupported here beyond the
    /// mutual-exclusion check with `request_uri`, spec §1 Non-goal).
    pub request: Option<String>,
    pub request_uri: Option<String>,
}

/// Decodes the wire shape into the pipeline's typed request, enforcing
/// enum validity and the `request`/`request_uri` mutual exclusion pinned
/// in spec §9's open question #1.
pub fn decode(raw: &RawAuthorizationRequest) -> Result<AuthorizationRequest, ProtocolError> {
    if raw.request.is_some() && raw.request_uri.is_some() {
        return Err(ProtocolError::invalid_request(
            "request and request_uri are mutually exclusive",
        ));
    }

    let response_type = decode_response_type(&raw.response_type)?;
    let prompt = raw.prompt.as_deref().map(decode_prompt).transpose()?;
    let response_mode = raw.response_mode.as_deref().map(decode_response_mode).transpose()?;
    let code_challenge_method = raw
        .code_challenge_method
        .as_deref()
        .map(decode_code_challenge_method)
        .transpose()?;
    let max_age = raw
        .max_age
        .as_deref()
        .map(|v| v.parse::<i64>().map_err(|_| ProtocolError::invalid_request("max_age must be an integer")))
        .transpose()?;
    let requested_claims = raw
        .claims
        .as_deref()
        .map(|v| serde_json::from_str::<crate::model::RequestedClaims>(v).map_err(|_| ProtocolError::invalid_request("claims must be a valid JSON object")))
        .transpose()?
        .unwrap_or_default();

    Ok(AuthorizationRequest {
        client_id: raw.client_id.clone(),
        browser_session_key: raw.browser_session_key.clone(),
        response_type,
        redirect_uri: raw.redirect_uri.clone(),
        scope: raw.scope.as_deref().map(split_space_separated).unwrap_or_default(),
        resources: raw.resource.clone(),
        state: raw.state.clone(),
        nonce: raw.nonce.clone(),
        prompt,
        max_age,
        acr_values: raw.acr_values.as_deref().map(split_space_separated).unwrap_or_default(),
        code_challenge: raw.code_challenge.clone(),
        code_challenge_method,
        requested_claims,
        response_mode,
    })
}

/// A terminal instruction for the HTTP layer: redirect the user agent
/// somewhere, hand back an HTML body to serve directly (`form_post`), or
/// render an interaction surface the host owns.
#[derive(Debug, Clone)]
pub enum AuthorizationResponseAction {
    Redirect(String),
    FormPost(String),
    LoginRequired,
    AccountSelectionRequired(Vec<crate::model::AuthSession>),
    ConsentRequired(crate::model::PendingConsent),
}

/// Resolves the `response_mode` a request actually gets: its own explicit
/// value, falling back to [`default_response_mode`] when the request left
/// it unset. Callers thread this into [`encode_outcome`] /
/// [`encode_error_redirect`] instead of each recomputing the default.
pub fn resolve_response_mode(req: &AuthorizationRequest) -> ResponseMode {
    req.response_mode.unwrap_or_else(|| default_response_mode(&req.response_type))
}

/// Folds an `AuthorizationOutcome` into a concrete redirect/interaction
/// instruction. Errors are folded by the caller via
/// [`encode_error_redirect`] since they need the request's own
/// `redirect_uri`/`response_mode`/`state` even when validation fails before
/// an outcome exists.
pub fn encode_outcome(outcome: AuthorizationOutcome, redirect_uri: &str, mode: ResponseMode) -> AuthorizationResponseAction {
    match outcome {
        AuthorizationOutcome::Success(success) => {
            let body = encode_success(&success, redirect_uri, mode);
            if matches!(mode, ResponseMode::FormPost) {
                AuthorizationResponseAction::FormPost(body)
            } else {
                AuthorizationResponseAction::Redirect(body)
            }
        }
        AuthorizationOutcome::LoginRequired => AuthorizationResponseAction::LoginRequired,
        AuthorizationOutcome::AccountSelectionRequired(sessions) => AuthorizationResponseAction::AccountSelectionRequired(sessions),
        AuthorizationOutcome::ConsentRequired(pending) => AuthorizationResponseAction::ConsentRequired(pending),
    }
}

fn encode_success(success: &AuthorizationSuccess, redirect_uri: &str, mode: ResponseMode) -> String {
    let mut params = Vec::new();
    if let Some(code) = &success.code {
        params.push(("code", code.clone()));
    }
    if let Some(token) = &success.access_token {
        params.push(("access_token", token.clone()));
        params.push(("token_type", success.token_type.unwrap_or("Bearer").to_string()));
    }
    if let Some(id_token) = &success.id_token {
        params.push(("id_token", id_token.clone()));
    }
    if let Some(state) = &success.state {
        params.push(("state", state.clone()));
    }
    append_params(redirect_uri, &params, mode)
}

/// A validation failure translates into a redirect carrying
/// `{error, error_description, state?}`, per RFC 6749 §4.1.2.1 — the one
/// path where a `ProtocolError` is turned back into a redirect rather than
/// a JSON body.
pub fn encode_error_redirect(err: &ProtocolError, redirect_uri: &str, state: Option<&str>, mode: ResponseMode) -> String {
    let mut params = vec![("error", err.code.as_str().to_string()), ("error_description", err.description.clone())];
    if let Some(state) = state {
        params.push(("state", state.to_string()));
    }
    append_params(redirect_uri, &params, mode)
}

/// `true` when the error is safe to redirect (the client's `redirect_uri`
/// was itself validated); `unknown_client`/bad `redirect_uri` errors must
/// instead be rendered as an error page, never redirected.
pub fn is_redirectable(err: &ProtocolError) -> bool {
    !matches!(err.code, ErrorCode::InvalidClient)
}
