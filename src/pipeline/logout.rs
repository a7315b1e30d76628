//! Session management & logout orchestrator (spec §4.5, component K):
//! front-channel iframe page assembly and back-channel logout-token
//! dispatch.
//!
//! The back-channel POST is grounded on the same
//! `reqwest::Client`/bearer-auth/status-match idiom as
//! `app/services/oauth/ciba_service.rs::notify_client_auth_complete`, swapped
//! to a form-encoded body per RFC 8471 back-channel logout.

use crate::config::ServerConfig;
use crate::error::ProtocolError;
use crate::model::ClientInfo;
use crate::provider::{IssuerProvider, Services};
use crate::service::TokenMinter;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::BTreeSet;

pub struct LogoutResult {
    pub html: String,
    /// `(client_id, cause)` for every back-channel POST that failed; the
    /// orchestrator continues past these rather than aborting the whole
    /// logout (spec §5 "the logout orchestrator chooses to continue
    /// per-client").
    pub back_channel_failures: Vec<(String, anyhow::Error)>,
}

pub struct LogoutOrchestrator<'a> {
    services: &'a Services<'a>,
    config: &'a ServerConfig,
    http: &'a reqwest::Client,
}

impl<'a> LogoutOrchestrator<'a> {
    pub fn new(services: &'a Services<'a>, config: &'a ServerConfig, http: &'a reqwest::Client) -> Self {
        Self { services, config, http }
    }

    pub async fn orchestrate(
        &self,
        clients: &[ClientInfo],
        subject: &str,
        session_id: Option<&str>,
        cookie_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LogoutResult, ProtocolError> {
        let mut frame_sources = Vec::new();
        let mut failures = Vec::new();

        for client in clients {
            if client.front_channel_logout_uri.is_some() {
                frame_sources.push(self.front_channel_uri(client, session_id)?);
            }
            if client.back_channel_logout_uri.is_some() {
                if let Err(e) = self.back_channel_logout(client, subject, session_id, now).await {
                    failures.push((client.client_id.clone(), e));
                }
            }
        }

        Ok(LogoutResult {
            html: assemble_logout_page(&frame_sources, cookie_name),
            back_channel_failures: failures,
        })
    }

    fn front_channel_uri(&self, client: &ClientInfo, session_id: Option<&str>) -> Result<String, ProtocolError> {
        let base = client
            .front_channel_logout_uri
            .clone()
            .expect("caller only invokes this when front_channel_logout_uri is Some");

        if !client.front_channel_logout_requires_session_id {
            return Ok(base);
        }
        let sid = session_id.ok_or_else(|| {
            ProtocolError::invalid_request(format!(
                "client {} requires a session id for front-channel logout but none is present",
                client.client_id
            ))
        })?;
        let mut url = url::Url::parse(&base)
            .map_err(|e| ProtocolError::server_error("parse front-channel logout uri", anyhow::anyhow!(e)))?;
        url.query_pairs_mut()
            .append_pair("iss", self.services.issuer.issuer())
            .append_pair("sid", sid);
        Ok(url.to_string())
    }

    /// Propagates transport/HTTP errors to the caller (returned as a
    /// per-client failure rather than aborting the whole logout, spec §4.5).
    async fn back_channel_logout(
        &self,
        client: &ClientInfo,
        subject: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let uri = client
            .back_channel_logout_uri
            .as_ref()
            .expect("caller only invokes this when back_channel_logout_uri is Some");
        if client.back_channel_logout_requires_session_id && session_id.is_none() {
            anyhow::bail!(
                "client {} requires a session id for back-channel logout but none is present",
                client.client_id
            );
        }

        let minter = TokenMinter::new(self.services.signer, self.services.issuer.issuer(), self.config.signing_alg);
        let jti = ulid::Ulid::new().to_string();
        let (jws, _claims) = minter.mint_logout_token(&client.client_id, subject, session_id, &jti, now).await?;

        let resp = self.http.post(uri).form(&[("logout_token", jws)]).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("client {} back-channel logout endpoint returned {}", client.client_id, resp.status());
        }
        tracing::info!(client_id = %client.client_id, "back-channel logout delivered");
        Ok(())
    }
}

/// Builds the front-channel logout page: one `<iframe>` per (deduplicated)
/// URI, a CSP `frame-src` listing unique origins, and a nonce shared by an
/// inline `<style>`/`<script>` pair (spec §4.5). Byte-identical across calls
/// with the same inputs except for the nonce and iframe ordering (spec §8
/// property 10).
fn assemble_logout_page(frame_sources: &[String], cookie_name: Option<&str>) -> String {
    let mut seen = BTreeSet::new();
    let mut unique_uris = Vec::new();
    for uri in frame_sources {
        if seen.insert(uri.clone()) {
            unique_uris.push(uri.clone());
        }
    }

    let mut origins = BTreeSet::new();
    for uri in &unique_uris {
        if let Ok(parsed) = url::Url::parse(uri) {
            origins.insert(format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or("")));
        }
    }

    let mut nonce_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = STANDARD.encode(nonce_bytes);

    let iframes: String = unique_uris
        .iter()
        .map(|uri| format!("<iframe src=\"{}\"></iframe>", html_escape(uri)))
        .collect();
    let frame_src = origins.into_iter().collect::<Vec<_>>().join(" ");

    let clear_cookie_js = cookie_name
        .map(|name| format!("document.cookie = \"{}=; Max-Age=0\";", js_escape(name)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<meta http-equiv=\"Content-Security-Policy\" content=\"frame-src {frame_src}\">\
<style nonce=\"{nonce}\">iframe{{display:none}}</style></head><body>{iframes}\
<script nonce=\"{nonce}\">{clear_cookie_js}</script></body></html>"
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupes_identical_frame_sources() {
        let html = assemble_logout_page(
            &["https://a/cb".to_string(), "https://a/cb".to_string()],
            None,
        );
        assert_eq!(html.matches("<iframe").count(), 1);
    }

    #[test]
    fn escapes_cookie_name_in_script() {
        let html = assemble_logout_page(&[], Some("evil\"</script>"));
        assert!(!html.contains("</script>\""));
    }
}
