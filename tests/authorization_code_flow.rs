//! Scenario S1-style coverage: authorization_code issuance through the
//! authorization pipeline, redemption (with PKCE) through the token
//! pipeline, then refresh-token rotation.

mod support;

use chrono::Utc;
use oidc_core::model::{AuthSession, PkceMethod, RequestedClaims, ResponseType};
use oidc_core::pipeline::{
    AuthorizationOutcome, AuthorizationPipeline, AuthorizationRequest, ResponseMode, TokenPipeline,
    TokenRequest,
};
use oidc_core::store::InMemoryStore;
use oidc_core::wire::authorization::{encode_outcome, resolve_response_mode, AuthorizationResponseAction};
use sha2::{Digest, Sha256};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

fn pkce_pair() -> (String, String) {
    let verifier = "integration-test-verifier-with-enough-entropy-123";
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());
    (verifier.to_string(), challenge)
}

fn auth_request(client_id: &str, browser_key: &str, challenge: &str) -> AuthorizationRequest {
    AuthorizationRequest {
        client_id: client_id.to_string(),
        browser_session_key: browser_key.to_string(),
        response_type: vec![ResponseType::Code],
        redirect_uri: "https://client.example/cb".to_string(),
        scope: vec!["openid".to_string(), "offline_access".to_string()],
        resources: vec![],
        state: Some("xyz".to_string()),
        nonce: Some("n-0s6".to_string()),
        prompt: None,
        max_age: None,
        acr_values: vec![],
        code_challenge: Some(challenge.to_string()),
        code_challenge_method: Some(PkceMethod::S256),
        requested_claims: RequestedClaims::default(),
        response_mode: Some(ResponseMode::Query),
    }
}

#[tokio::test]
async fn code_issued_then_redeemed_then_refreshed() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let client = support::confidential_client("client-1", "https://client.example/cb");
    fixture.clients.register(client.clone());
    fixture.sessions.seed(
        "browser-1",
        AuthSession::new("user-1".to_string(), "sess-1".to_string(), "password".to_string(), now),
    );

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let (verifier, challenge) = pkce_pair();
    let req = auth_request("client-1", "browser-1", &challenge);

    let pipeline = AuthorizationPipeline::new(&services, &config);
    let outcome = pipeline.authorize(&req).await.expect("authorization succeeds");
    let code = match outcome {
        AuthorizationOutcome::Success(success) => success.code.expect("code response_type requested"),
        other => panic!("expected Success, got {other:?}"),
    };

    let token_pipeline = TokenPipeline::new(&services, &config);
    let issued = token_pipeline
        .handle(TokenRequest::AuthorizationCode {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            code: code.clone(),
            redirect_uri: "https://client.example/cb".to_string(),
            code_verifier: Some(verifier),
        })
        .await
        .expect("code redemption succeeds");

    assert_eq!(issued.token_type, "Bearer");
    assert!(issued.id_token.is_some(), "openid scope was granted");
    let refresh_token = issued.refresh_token.clone().expect("offline_access scope was granted");

    // The code is single-use.
    let replay = token_pipeline
        .handle(TokenRequest::AuthorizationCode {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            code,
            redirect_uri: "https://client.example/cb".to_string(),
            code_verifier: None,
        })
        .await;
    assert!(replay.is_err());

    let refreshed = token_pipeline
        .handle(TokenRequest::RefreshToken {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            refresh_token: refresh_token.clone(),
            scope: None,
        })
        .await
        .expect("refresh succeeds");
    assert!(refreshed.access_token != issued.access_token);

    // Rotation: the original refresh token is now revoked.
    let reuse = token_pipeline
        .handle(TokenRequest::RefreshToken {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            refresh_token,
            scope: None,
        })
        .await;
    assert!(reuse.is_err());
}

#[tokio::test]
async fn wrong_pkce_verifier_is_rejected() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let client = support::confidential_client("client-1", "https://client.example/cb");
    fixture.clients.register(client);
    fixture.sessions.seed(
        "browser-1",
        AuthSession::new("user-1".to_string(), "sess-1".to_string(), "password".to_string(), now),
    );

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let (_verifier, challenge) = pkce_pair();
    let req = auth_request("client-1", "browser-1", &challenge);

    let pipeline = AuthorizationPipeline::new(&services, &config);
    let outcome = pipeline.authorize(&req).await.expect("authorization succeeds");
    let code = match outcome {
        AuthorizationOutcome::Success(success) => success.code.unwrap(),
        other => panic!("expected Success, got {other:?}"),
    };

    let token_pipeline = TokenPipeline::new(&services, &config);
    let result = token_pipeline
        .handle(TokenRequest::AuthorizationCode {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            code,
            redirect_uri: "https://client.example/cb".to_string(),
            code_verifier: Some("not-the-right-verifier".to_string()),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn no_session_yields_login_required() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let client = support::confidential_client("client-1", "https://client.example/cb");
    fixture.clients.register(client);

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let (_verifier, challenge) = pkce_pair();
    let req = auth_request("client-1", "browser-without-a-session", &challenge);

    let pipeline = AuthorizationPipeline::new(&services, &config);
    let outcome = pipeline.authorize(&req).await.expect("no error, just an interaction outcome");
    assert!(matches!(outcome, AuthorizationOutcome::LoginRequired));
}

#[tokio::test]
async fn form_post_response_mode_renders_an_auto_submitting_form() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let client = support::confidential_client("client-1", "https://client.example/cb");
    fixture.clients.register(client);
    fixture.sessions.seed(
        "browser-1",
        AuthSession::new("user-1".to_string(), "sess-1".to_string(), "password".to_string(), now),
    );

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let (_verifier, challenge) = pkce_pair();
    let mut req = auth_request("client-1", "browser-1", &challenge);
    req.response_mode = Some(ResponseMode::FormPost);

    let pipeline = AuthorizationPipeline::new(&services, &config);
    let outcome = pipeline.authorize(&req).await.expect("authorization succeeds");

    let mode = resolve_response_mode(&req);
    assert_eq!(mode, ResponseMode::FormPost);
    let action = encode_outcome(outcome, &req.redirect_uri, mode);
    let html = match action {
        AuthorizationResponseAction::FormPost(html) => html,
        other => panic!("expected FormPost, got {other:?}"),
    };

    assert!(html.contains("<form method=\"post\" action=\"https://client.example/cb\">"));
    assert!(html.contains("<input type=\"hidden\" name=\"code\""));
    assert!(html.contains("<input type=\"hidden\" name=\"state\" value=\"xyz\">"));
    assert!(!html.contains("?code="), "form_post must not also append a query string");
}

#[tokio::test]
async fn implicit_request_with_no_response_mode_defaults_to_fragment() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let client = support::confidential_client("client-1", "https://client.example/cb");
    fixture.clients.register(client);
    fixture.sessions.seed(
        "browser-1",
        AuthSession::new("user-1".to_string(), "sess-1".to_string(), "password".to_string(), now),
    );

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let mut req = auth_request("client-1", "browser-1", "unused-for-implicit");
    req.response_type = vec![ResponseType::Token];
    req.code_challenge = None;
    req.code_challenge_method = None;
    req.response_mode = None;

    let mode = resolve_response_mode(&req);
    assert_eq!(mode, ResponseMode::Fragment, "implicit response_type defaults to fragment, not query");

    let pipeline = AuthorizationPipeline::new(&services, &config);
    let outcome = pipeline.authorize(&req).await.expect("authorization succeeds");
    let action = encode_outcome(outcome, &req.redirect_uri, mode);
    let redirect = match action {
        AuthorizationResponseAction::Redirect(redirect) => redirect,
        other => panic!("expected Redirect, got {other:?}"),
    };

    assert!(redirect.contains('#'), "fragment-mode redirects carry params after '#'");
    assert!(redirect.contains("access_token="));
    assert!(!redirect.contains("?access_token="), "implicit default must not leak into the query string");
}

#[tokio::test]
async fn unregistered_redirect_uri_is_rejected() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let client = support::confidential_client("client-1", "https://client.example/cb");
    fixture.clients.register(client);

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let (_verifier, challenge) = pkce_pair();
    let mut req = auth_request("client-1", "browser-1", &challenge);
    req.redirect_uri = "https://evil.example/cb".to_string();

    let pipeline = AuthorizationPipeline::new(&services, &config);
    let result = pipeline.authorize(&req).await;
    assert!(result.is_err());
}
