//! Request/response adapters (spec §6, §9, component M): typed decoders
//! from the wire shapes named in spec §6 into the pipeline request types,
//! and encoders back into the literal JSON/form/HTML shapes spec §6 pins.
//!
//! Every enum-valued wire parameter (`response_type`, `prompt`,
//! `response_mode`, `grant_type`, `code_challenge_method`) decodes through
//! one of the helpers below; an unrecognised token is always
//! `invalid_request` (spec §9 "Runtime request binding" redesign flag),
//! never a panic or a silently-dropped value.

pub mod authorization;
pub mod ciba;
pub mod device;
pub mod introspection;
pub mod par;
pub mod token;

use crate::error::ProtocolError;
use crate::model::PkceMethod;
use crate::pipeline::{Prompt, ResponseMode};

pub(crate) fn split_space_separated(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

pub(crate) fn decode_response_type(raw: &str) -> Result<Vec<crate::model::ResponseType>, ProtocolError> {
    use crate::model::ResponseType;
    raw.split_whitespace()
        .map(|tok| match tok {
            "code" => Ok(ResponseType::Code),
            "token" => Ok(ResponseType::Token),
            "id_token" => Ok(ResponseType::IdToken),
            other => Err(ProtocolError::invalid_request(format!("unsupported response_type token: {other}"))),
        })
        .collect()
}

pub(crate) fn decode_prompt(raw: &str) -> Result<Prompt, ProtocolError> {
    match raw {
        "none" => Ok(Prompt::None),
        "login" => Ok(Prompt::Login),
        "consent" => Ok(Prompt::Consent),
        "select_account" => Ok(Prompt::SelectAccount),
        other => Err(ProtocolError::invalid_request(format!("unsupported prompt value: {other}"))),
    }
}

pub(crate) fn decode_response_mode(raw: &str) -> Result<ResponseMode, ProtocolError> {
    match raw {
        "query" => Ok(ResponseMode::Query),
        "fragment" => Ok(ResponseMode::Fragment),
        "form_post" => Ok(ResponseMode::FormPost),
        other => Err(ProtocolError::invalid_request(format!("unsupported response_mode value: {other}"))),
    }
}

pub(crate) fn decode_code_challenge_method(raw: &str) -> Result<PkceMethod, ProtocolError> {
    match raw {
        "plain" => Ok(PkceMethod::Plain),
        "S256" => Ok(PkceMethod::S256),
        "S512" => Ok(PkceMethod::S512),
        other => Err(ProtocolError::invalid_request(format!("unsupported code_challenge_method value: {other}"))),
    }
}

/// Assembles a redirect target for a query/fragment response mode, or an
/// auto-submitting HTML form body for `form_post` (spec §6 "Authorization
/// request: query or form"). `form_post` never falls through to the
/// query-string path; it gets its own rendering via [`render_form_post`].
pub(crate) fn append_params(redirect_uri: &str, params: &[(&str, String)], mode: ResponseMode) -> String {
    match mode {
        ResponseMode::FormPost => return render_form_post(redirect_uri, params),
        ResponseMode::Query | ResponseMode::Fragment => {}
    }
    let encoded: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    let joined = encoded.join("&");
    if joined.is_empty() {
        return redirect_uri.to_string();
    }
    match mode {
        ResponseMode::Fragment => format!("{redirect_uri}#{joined}"),
        ResponseMode::Query => {
            let sep = if redirect_uri.contains('?') { '&' } else { '?' };
            format!("{redirect_uri}{sep}{joined}")
        }
        ResponseMode::FormPost => unreachable!("returned above"),
    }
}

/// Renders the `form_post` response mode (OAuth Form Post Response Mode):
/// an auto-submitting HTML form posting `params` to `redirect_uri` as one
/// hidden input each, mirroring the escaped-HTML-fragment idiom
/// `pipeline::logout::assemble_logout_page` uses for its iframe markup.
pub(crate) fn render_form_post(redirect_uri: &str, params: &[(&str, String)]) -> String {
    let inputs: String = params
        .iter()
        .map(|(k, v)| format!("<input type=\"hidden\" name=\"{}\" value=\"{}\">", html_escape(k), html_escape(v)))
        .collect();
    format!(
        "<!DOCTYPE html><html><head><title>Continue</title></head>\
<body onload=\"document.forms[0].submit()\">\
<form method=\"post\" action=\"{}\">{inputs}\
<noscript><input type=\"submit\" value=\"Continue\"></noscript></form></body></html>",
        html_escape(redirect_uri)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}
