//! Introspection/revocation (RFC 7662/7009) and session/logout orchestration,
//! exercised against access tokens minted through the real token pipeline
//! rather than hand-built claims.

mod support;

use chrono::Utc;
use oidc_core::pipeline::{IntrospectionService, LogoutOrchestrator, RevocationService, TokenPipeline, TokenRequest};
use oidc_core::store::InMemoryStore;

#[tokio::test]
async fn access_token_is_active_then_inactive_after_revocation() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    fixture.clients.register(support::confidential_client("client-1", "https://client.example/cb"));

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let token_pipeline = TokenPipeline::new(&services, &config);
    let issued = token_pipeline
        .handle(TokenRequest::ClientCredentials {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            scope: vec![],
            resources: vec![],
        })
        .await
        .expect("client_credentials succeeds for a confidential client");

    let introspection = IntrospectionService::new(&services, &config);
    let active = introspection
        .introspect(&issued.access_token, Some("access_token"), now)
        .await
        .expect("introspection does not error on a well-formed token");
    assert!(active.active);

    let revocation = RevocationService::new(&services, &config);
    revocation.revoke(&issued.access_token, Some("access_token"), now).await;

    let after = introspection
        .introspect(&issued.access_token, Some("access_token"), now)
        .await
        .expect("introspection does not error on a well-formed token");
    assert!(!after.active);
    assert!(after.payload.is_none());
}

#[tokio::test]
async fn revoking_an_unknown_token_still_returns_success() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let revocation = RevocationService::new(&services, &config);
    // Garbage input; RFC 7009 says revocation always reports success to the
    // caller regardless of whether the token existed.
    revocation.revoke("not-a-real-token", None, now).await;
}

#[tokio::test]
async fn client_credentials_grant_has_no_refresh_or_id_token() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    fixture.clients.register(support::confidential_client("client-1", "https://client.example/cb"));

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let token_pipeline = TokenPipeline::new(&services, &config);
    let issued = token_pipeline
        .handle(TokenRequest::ClientCredentials {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            scope: vec![],
            resources: vec![],
        })
        .await
        .expect("client_credentials succeeds for a confidential client");
    assert!(issued.refresh_token.is_none());
    assert!(issued.id_token.is_none());
}

#[tokio::test]
async fn front_channel_logout_page_embeds_one_iframe_per_client() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let mut first = support::confidential_client("client-1", "https://client-1.example/cb");
    first.front_channel_logout_uri = Some("https://client-1.example/logout".to_string());
    let mut second = support::confidential_client("client-2", "https://client-2.example/cb");
    second.front_channel_logout_uri = Some("https://client-2.example/logout".to_string());

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();
    let http = reqwest::Client::new();

    let orchestrator = LogoutOrchestrator::new(&services, &config, &http);
    let result = orchestrator
        .orchestrate(&[first, second], "user-1", Some("sess-1"), Some("session_cookie"), now)
        .await
        .expect("no back-channel clients means no network calls");

    assert_eq!(result.html.matches("<iframe").count(), 2);
    assert!(result.html.contains("client-1.example"));
    assert!(result.html.contains("client-2.example"));
    assert!(result.back_channel_failures.is_empty());
}

#[tokio::test]
async fn back_channel_logout_without_a_listener_is_reported_as_a_failure() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let mut client = support::confidential_client("client-1", "https://client.example/cb");
    // Port 0 on loopback refuses the connection immediately.
    client.back_channel_logout_uri = Some("http://127.0.0.1:0/back-channel-logout".to_string());

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();
    let http = reqwest::Client::new();

    let orchestrator = LogoutOrchestrator::new(&services, &config, &http);
    let result = orchestrator
        .orchestrate(&[client], "user-1", Some("sess-1"), None, now)
        .await
        .expect("the orchestrator continues past per-client back-channel failures");

    assert_eq!(result.back_channel_failures.len(), 1);
    assert_eq!(result.back_channel_failures[0].0, "client-1");
}
