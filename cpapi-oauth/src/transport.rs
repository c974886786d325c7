use crate::config::GatewayConfig;
use crate::diagnostics::Exchange;
use crate::error::Result;
use http::StatusCode;
use serde::de::DeserializeOwned;

/// Build the HTTP client shared by every stage of the handshake.
///
/// Requests are bounded by `request_timeout` and carry the configured `User-Agent`.
pub fn build_client(config: &GatewayConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Status and body of a completed exchange
#[derive(Debug)]
pub(crate) struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    /// Raw payload, `Null` for an empty body
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        self.json()
    }
}

/// Execute `request`, read the whole body and log the exchange at debug level.
pub(crate) async fn send(client: &reqwest::Client, request: reqwest::Request) -> Result<Reply> {
    let method = request.method().clone();
    let url = request.url().clone();
    let request_headers = request.headers().clone();
    let request_body_len = request
        .body()
        .and_then(|b| b.as_bytes())
        .map(|b| b.len())
        .unwrap_or(0);

    let response = client.execute(request).await?;
    let status = response.status();
    let response_headers = response.headers().clone();
    let body = response.text().await?;

    tracing::debug!(
        "{}",
        Exchange {
            method: &method,
            url: &url,
            request_headers: &request_headers,
            request_body_len,
            status,
            response_headers: &response_headers,
            response_body: &body,
        }
    );

    Ok(Reply { status, body })
}
