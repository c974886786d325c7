#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cpapi_oauth::{ClientIdentity, GatewayConfig, KeyStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const TEST_KEY: &str = include_str!("../fixtures/test_key.pem");

pub fn key_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_key.pem")
}

pub fn key_store() -> Arc<KeyStore> {
    Arc::new(KeyStore::from_pem(TEST_KEY).unwrap())
}

pub fn identity() -> ClientIdentity {
    ClientIdentity::new("C1", "CRED", "1.2.3.4".parse().unwrap())
        .with_client_key_id("main")
        .with_scope("sso-sessions.write")
}

pub fn gateway(server: &MockServer) -> GatewayConfig {
    GatewayConfig::new(server.uri().parse().unwrap())
        .with_user_agent("cpapi-tests/1.0")
        .with_request_timeout(Duration::from_secs(5))
}

pub fn http(gateway: &GatewayConfig) -> reqwest::Client {
    cpapi_oauth::build_client(gateway).unwrap()
}

/// Decode the claims segment of a compact assertion
pub fn claims_of(compact: &str) -> serde_json::Value {
    let parts: Vec<&str> = compact.split('.').collect();
    assert_eq!(parts.len(), 3, "not a compact JWS: {}", compact);
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap()
}
