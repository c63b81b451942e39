//! End-to-end scenarios across the token context, dispatcher, authenticators
//! and HTTP surface, with the gateway simulated by wiremock.

use std::time::Duration;

use axum::body::Body;
use http::{Request, StatusCode};
use reqwest::Method;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::create_router;
use crate::auth::client_credentials::ClientCredentialsAuthenticator;
use crate::auth::context::TokenContext;
use crate::auth::user::{RegisterRequest, UserAuthenticator};
use crate::client::retry::RetryPolicy;
use crate::client::{RequestDispatcher, build_gateway_client, build_token_client};
use crate::config::GatewayConfig;
use crate::create_app_state;
use crate::normalizer::ExpectedShape;

fn fast_config(server: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::with_base_url(&server.uri()).unwrap();
    config.dispatcher_retry = RetryPolicy::new(2, Duration::from_millis(5));
    config.register_retry = RetryPolicy::new(3, Duration::from_millis(5));
    config
}

fn user_authenticator(config: &GatewayConfig) -> UserAuthenticator {
    let tokens = ClientCredentialsAuthenticator::new(build_token_client(config).unwrap(), config);
    UserAuthenticator::new(build_gateway_client(config).unwrap(), tokens, config)
}

fn registration() -> RegisterRequest {
    RegisterRequest {
        username: "mbarga".to_string(),
        email: "mbarga@example.com".to_string(),
        password: "s3cret".to_string(),
        first_name: Some("Paul".to_string()),
        last_name: Some("Mbarga".to_string()),
        name: Some("Paul Mbarga".to_string()),
        phone_number: Some("+237699000000".to_string()),
    }
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth-service/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "svc-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "read write"
        })))
        .mount(server)
        .await;
}

async fn register_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/auth-service/api/register")
        .count()
}

#[tokio::test]
async fn test_inbound_bearer_reaches_upstream_through_router() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organization-service/organizations/o-1/practical-infos/i-1"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("open 8-17")))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_router(create_app_state(&fast_config(&server)).unwrap());
    let response = app
        .oneshot(
            Request::get("/organisations/o-1/practical-infos/i-1")
                .header("Authorization", "Bearer T1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers["authorization"], "Bearer T1");
}

#[tokio::test]
async fn test_request_without_bearer_goes_out_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let app = create_router(create_app_state(&fast_config(&server)).unwrap());
    let response = app
        .oneshot(Request::get("/organisations").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_concurrent_callers_keep_their_own_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(Duration::from_millis(30)))
        .mount(&server)
        .await;

    let dispatcher = RequestDispatcher::from_config(&fast_config(&server)).unwrap();
    let a = {
        let d = dispatcher.clone();
        tokio::spawn(TokenContext::scope(Some("token-A".to_string()), async move {
            d.send(Method::GET, "/whoami", None, ExpectedShape::Mapping).await
        }))
    };
    let b = {
        let d = dispatcher.clone();
        tokio::spawn(TokenContext::scope(Some("token-B".to_string()), async move {
            d.send(Method::GET, "/whoami", None, ExpectedShape::Mapping).await
        }))
    };

    assert_eq!(a.await.unwrap().status(), 200);
    assert_eq!(b.await.unwrap().status(), 200);

    let mut seen: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.headers["authorization"].to_str().unwrap().to_string())
        .collect();
    seen.sort();
    assert_eq!(seen, vec!["Bearer token-A", "Bearer token-B"]);
}

#[tokio::test]
async fn test_register_recovers_after_two_unavailable_replies() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth-service/api/register"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth-service/api/register"))
        .and(header("authorization", "Bearer svc-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-77",
            "username": "mbarga"
        })))
        .mount(&server)
        .await;

    let envelope = user_authenticator(&fast_config(&server))
        .register(&registration())
        .await;

    assert_eq!(envelope.status(), 200);
    assert_eq!(envelope.message(), "operation succeeded");
    assert_eq!(envelope.data(), Some(&json!({"id": "u-77", "username": "mbarga"})));
    assert_eq!(register_calls(&server).await, 3);
}

#[tokio::test]
async fn test_register_gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth-service/api/register"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let envelope = user_authenticator(&fast_config(&server))
        .register(&registration())
        .await;

    assert_eq!(envelope.status(), 503);
    assert!(envelope.message().contains("retry budget exhausted"));
    assert!(envelope.message().contains("after 4 attempts"));
    assert!(envelope.data().is_none());
    assert_eq!(register_calls(&server).await, 4);
}

#[tokio::test]
async fn test_register_retries_token_endpoint_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth-service/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth-service/api/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "u-1"})))
        .mount(&server)
        .await;

    let envelope = user_authenticator(&fast_config(&server))
        .register(&registration())
        .await;

    assert_eq!(envelope.status(), 201);
    assert_eq!(envelope.message(), "resource created");
    assert_eq!(register_calls(&server).await, 1);
}

#[tokio::test]
async fn test_register_through_router() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth-service/api/register"))
        .respond_with(ResponseTemplate::new(409).set_body_string("username taken"))
        .mount(&server)
        .await;

    let app = create_router(create_app_state(&fast_config(&server)).unwrap());
    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&registration()).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    // Every non-2xx registration reply is retried before giving up.
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(register_calls(&server).await, 4);
}
