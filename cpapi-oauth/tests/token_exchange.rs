mod common;

use chrono::Utc;
use common::{claims_of, gateway, http, identity, key_store};
use cpapi_oauth::{
    AccessToken, AssertionBuilder, Audience, Error, GatewayConfig, SessionClient, TokenClient,
};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/oauth2/api/v1/token";
const SSO_PATH: &str = "/gw/api/v1/sso-sessions";

#[tokio::test]
async fn access_token_is_returned_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok123",
            "token_type": "Bearer",
            "expires_in": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = gateway(&server);
    let client = TokenClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Token, &identity(), Utc::now())
        .unwrap();

    let token = client
        .request_access_token(&identity(), assertion)
        .await
        .unwrap();
    assert_eq!(token.as_str(), "tok123");

    let requests = server.received_requests().await.unwrap();
    let form: HashMap<String, String> = serde_urlencoded::from_bytes(&requests[0].body).unwrap();
    assert_eq!(
        form["client_assertion_type"],
        "urn:ietf:params:oauth:client-assertion-type:jwt-bearer"
    );
    assert_eq!(form["grant_type"], "client_credentials");
    assert_eq!(form["scope"], "sso-sessions.write");
    assert_eq!(form.len(), 4);

    let claims = claims_of(&form["client_assertion"]);
    assert_eq!(claims["aud"], "/token");
    assert_eq!(claims["iss"], "C1");
    assert_eq!(claims["sub"], "C1");
}

#[tokio::test]
async fn rejected_assertion_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#))
        .mount(&server)
        .await;

    let config = gateway(&server);
    let client = TokenClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Token, &identity(), Utc::now())
        .unwrap();

    let err = client
        .request_access_token(&identity(), assertion)
        .await
        .unwrap_err();
    match &err {
        Error::Auth { status, message } => {
            assert_eq!(status.map(|s| s.as_u16()), Some(401));
            assert!(message.contains("invalid_client"));
        }
        other => panic!("expected auth error, got {:?}", other),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn missing_access_token_field_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&server)
        .await;

    let config = gateway(&server);
    let client = TokenClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Token, &identity(), Utc::now())
        .unwrap();

    let err = client
        .request_access_token(&identity(), assertion)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth { .. }), "got {:?}", err);
}

#[tokio::test]
async fn wrong_audience_never_leaves_the_process() {
    let server = MockServer::start().await;
    let config = gateway(&server);
    let builder = AssertionBuilder::new(key_store());

    let tokens = TokenClient::new(http(&config), &config);
    let session_assertion = builder
        .build(Audience::Session, &identity(), Utc::now())
        .unwrap();
    let err = tokens
        .request_access_token(&identity(), session_assertion)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AudienceMismatch { .. }));

    let sessions = SessionClient::new(http(&config), &config);
    let token_assertion = builder
        .build(Audience::Token, &identity(), Utc::now())
        .unwrap();
    let err = sessions
        .request_bearer_token(&AccessToken::new("AT"), token_assertion)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AudienceMismatch { .. }));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn bearer_token_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SSO_PATH))
        .and(header("authorization", "Bearer tok123"))
        .and(header("content-type", "application/jwt"))
        .and(body_string_contains("."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "bear456",
            "active": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = gateway(&server);
    let client = SessionClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Session, &identity(), Utc::now())
        .unwrap();
    let expected_body = assertion.compact();

    let bearer = client
        .request_bearer_token(&AccessToken::new("tok123"), assertion)
        .await
        .unwrap();
    assert_eq!(bearer.unwrap().as_str(), "bear456");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert_eq!(body, expected_body);

    let claims = claims_of(&body);
    assert_eq!(claims["ip"], "1.2.3.4");
    assert_eq!(claims["credential"], "CRED");
    assert_eq!(claims["iss"], "C1");
    assert_eq!(
        claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
        86_400
    );
}

#[tokio::test]
async fn bearer_token_refusal_is_absent_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SSO_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let config = gateway(&server);
    let client = SessionClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Session, &identity(), Utc::now())
        .unwrap();

    let bearer = client
        .request_bearer_token(&AccessToken::new("tok123"), assertion)
        .await
        .unwrap();
    assert!(bearer.is_none());
}

#[tokio::test]
async fn malformed_bearer_response_is_session_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SSO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let config = gateway(&server);
    let client = SessionClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Session, &identity(), Utc::now())
        .unwrap();

    let err = client
        .request_bearer_token(&AccessToken::new("tok123"), assertion)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Session { .. }), "got {:?}", err);
}

#[tokio::test]
async fn unreachable_endpoint_is_retryable_http_error() {
    // Grab a free port and release it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let config = GatewayConfig::new(format!("http://127.0.0.1:{}", port).parse().unwrap());

    let client = TokenClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Token, &identity(), Utc::now())
        .unwrap();

    let err = client
        .request_access_token(&identity(), assertion)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_endpoint_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = gateway(&server).with_request_timeout(Duration::from_millis(200));
    let client = TokenClient::new(http(&config), &config);
    let assertion = AssertionBuilder::new(key_store())
        .build(Audience::Token, &identity(), Utc::now())
        .unwrap();

    match client.request_access_token(&identity(), assertion).await {
        Err(Error::Http(e)) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }
}
