//! Scenario-style coverage for RFC 8628 device authorization (poll→approve→
//! redeem) and CIBA in poll delivery mode (initiate→approve→redeem), both of
//! which need no outbound HTTP since push/ping notification is skipped for
//! `Poll` delivery.

mod support;

use chrono::Utc;
use oidc_core::model::{AuthSession, AuthorizationContext, AuthorizedGrant, RequestedClaims};
use oidc_core::pipeline::{
    CibaDecision, CibaEngine, DeviceDecision, DeviceEngine, TokenPipeline, TokenRequest,
};
use oidc_core::store::InMemoryStore;

#[tokio::test]
async fn device_code_polls_pending_then_redeems_after_approval() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    let client = support::confidential_client("client-1", "https://client.example/cb");
    fixture.clients.register(client.clone());

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let device_engine = DeviceEngine::new(&services, &config);
    let initiation = device_engine
        .initiate("client-1", vec!["openid".to_string()], vec![], now)
        .await
        .expect("device initiation succeeds");

    let token_pipeline = TokenPipeline::new(&services, &config);
    let pending = token_pipeline
        .handle(TokenRequest::DeviceCode {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            device_code: initiation.device_code.clone(),
        })
        .await;
    assert!(pending.is_err(), "not yet approved");

    let submitted = device_engine
        .submit_user_code(&initiation.user_code, "203.0.113.9", now)
        .await
        .expect("user code is known and not rate-limited");
    assert_eq!(submitted.client_id, "client-1");

    let session = AuthSession::new("user-1".to_string(), "sess-1".to_string(), "device".to_string(), now);
    let grant = AuthorizedGrant {
        session,
        context: AuthorizationContext {
            client_id: "client-1".to_string(),
            scope: vec!["openid".to_string()],
            resources: vec![],
            nonce: None,
            redirect_uri: String::new(),
            code_challenge: None,
            code_challenge_method: None,
            requested_claims: RequestedClaims::default(),
        },
    };
    device_engine
        .resolve(&initiation.user_code, DeviceDecision::Approved(grant), now)
        .await
        .expect("approval persists");

    let issued = token_pipeline
        .handle(TokenRequest::DeviceCode {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            device_code: initiation.device_code.clone(),
        })
        .await
        .expect("redeems after approval");
    assert!(issued.id_token.is_some());

    // Both records were removed on redemption; a second attempt sees an
    // unknown device_code.
    let replay = token_pipeline
        .handle(TokenRequest::DeviceCode {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            device_code: initiation.device_code,
        })
        .await;
    assert!(replay.is_err());
}

#[tokio::test]
async fn device_code_denial_surfaces_access_denied() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    fixture.clients.register(support::confidential_client("client-1", "https://client.example/cb"));

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();

    let device_engine = DeviceEngine::new(&services, &config);
    let initiation = device_engine
        .initiate("client-1", vec!["openid".to_string()], vec![], now)
        .await
        .unwrap();
    device_engine.resolve(&initiation.user_code, DeviceDecision::Denied, now).await.unwrap();

    let token_pipeline = TokenPipeline::new(&services, &config);
    let result = token_pipeline
        .handle(TokenRequest::DeviceCode {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            device_code: initiation.device_code,
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ciba_poll_mode_completes_without_network() {
    let now = Utc::now();
    let fixture = support::Fixture::new(now);
    fixture.clients.register(support::confidential_client("client-1", "https://client.example/cb"));

    let store = InMemoryStore::new();
    let signer = support::test_signer();
    let services = fixture.services(&store, &signer);
    let config = support::test_config();
    let http = reqwest::Client::new();

    let ciba_engine = CibaEngine::new(&services, &config, &http);
    let initiation = ciba_engine
        .initiate(
            &support::confidential_client("client-1", "https://client.example/cb"),
            vec!["openid".to_string()],
            vec![],
            None,
            now,
        )
        .await
        .expect("poll mode needs no notification token");

    let token_pipeline = TokenPipeline::new(&services, &config);
    let pending = token_pipeline
        .handle(TokenRequest::Ciba {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            auth_req_id: initiation.auth_req_id.clone(),
        })
        .await;
    assert!(pending.is_err(), "not yet approved");

    let session = AuthSession::new("user-1".to_string(), "sess-1".to_string(), "ciba".to_string(), now);
    let grant = AuthorizedGrant {
        session,
        context: AuthorizationContext {
            client_id: "client-1".to_string(),
            scope: vec!["openid".to_string()],
            resources: vec![],
            nonce: None,
            redirect_uri: String::new(),
            code_challenge: None,
            code_challenge_method: None,
            requested_claims: RequestedClaims::default(),
        },
    };
    ciba_engine
        .complete(&initiation.auth_req_id, CibaDecision::Approved(grant), now)
        .await
        .expect("completion persists and poll-mode notify is a no-op");

    let issued = token_pipeline
        .handle(TokenRequest::Ciba {
            client_id: "client-1".to_string(),
            client_secret: Some("shh".to_string()),
            auth_req_id: initiation.auth_req_id,
        })
        .await
        .expect("redeems after approval");
    assert!(issued.id_token.is_some());
}
