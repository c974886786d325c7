//! Brokerage session operations over an established bearer token.

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::token::BearerToken;
use crate::transport::{self, Reply};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Where a caller is in the handshake, implied by which calls have succeeded.
///
/// Nothing in this crate stores or enforces it; it exists for callers that want to
/// report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    HasAccessToken,
    HasBearerToken,
    /// `ssodh/init` succeeded
    SessionActive,
    /// Logged out
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::HasAccessToken => "has_access_token",
            SessionState::HasBearerToken => "has_bearer_token",
            SessionState::SessionActive => "session_active",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Serialize)]
struct InitRequest {
    publish: bool,
    compete: bool,
}

#[derive(Deserialize)]
struct TickleResponse {
    session: String,
}

/// Drives `ssodh/init`, `sso/validate`, `tickle` and `logout`.
///
/// Every request carries `Authorization: Bearer` and `User-Agent`. Failures are
/// returned as-is; nothing is retried.
#[derive(Debug, Clone)]
pub struct SessionManager {
    http: reqwest::Client,
    user_agent: String,
    init_url: String,
    validate_url: String,
    tickle_url: String,
    logout_url: String,
}

impl SessionManager {
    pub fn new(http: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            http,
            user_agent: config.user_agent.clone(),
            init_url: config.ssodh_init_url(),
            validate_url: config.validate_url(),
            tickle_url: config.tickle_url(),
            logout_url: config.logout_url(),
        }
    }

    /// Claim the brokerage session, publishing presence and competing with other
    /// sessions of the same user. Safe to repeat.
    pub async fn ssodh_init(&self, token: &BearerToken) -> Result<serde_json::Value> {
        let request = self
            .authorized(self.http.post(&self.init_url), token)
            .json(&InitRequest {
                publish: true,
                compete: true,
            })
            .build()?;
        let reply = self.send("ssodh init", request).await?;
        let payload = payload("ssodh init", &reply)?;

        tracing::info!("brokerage session initialized");
        Ok(payload)
    }

    /// Raw validation payload, untouched. A body that is not JSON comes back as a
    /// `Value::String`.
    pub async fn validate_sso(&self, token: &BearerToken) -> Result<serde_json::Value> {
        let request = self.authorized(self.http.get(&self.validate_url), token).build()?;
        let reply = self.send("sso validate", request).await?;
        Ok(reply
            .payload()
            .unwrap_or_else(|_| serde_json::Value::String(reply.body.clone())))
    }

    /// Heartbeat. Returns the `session` id from the response.
    pub async fn tickle(&self, token: &BearerToken) -> Result<String> {
        let request = self.authorized(self.http.get(&self.tickle_url), token).build()?;
        let reply = self.send("tickle", request).await?;

        let tickle: TickleResponse = reply
            .json()
            .map_err(|e| Error::session("tickle", format!("no session in response: {}", e)))?;
        tracing::debug!("tickled session");
        Ok(tickle.session)
    }

    pub async fn logout(&self, token: &BearerToken) -> Result<()> {
        let request = self.authorized(self.http.post(&self.logout_url), token).build()?;
        self.send("logout", request).await?;

        tracing::info!("logged out of brokerage session");
        Ok(())
    }

    /// Tickle every `interval` until `shutdown` resolves, returning the last session id
    /// seen. The first tickle is sent immediately. A failed tickle stops the loop.
    ///
    /// A zero `interval` is rejected with [`Error::Config`] before anything is sent.
    pub async fn keep_alive<F>(
        &self,
        token: &BearerToken,
        interval: Duration,
        shutdown: F,
    ) -> Result<Option<String>>
    where
        F: Future<Output = ()>,
    {
        if interval.is_zero() {
            return Err(Error::config("tickle_interval", "must be greater than zero"));
        }

        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_session = None;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("keep-alive stopped");
                    return Ok(last_session);
                }
                _ = ticker.tick() => {
                    last_session = Some(self.tickle(token).await?);
                }
            }
        }
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        token: &BearerToken,
    ) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(token.as_str())
            .header(http::header::USER_AGENT, &self.user_agent)
    }

    async fn send(&self, operation: &'static str, request: reqwest::Request) -> Result<Reply> {
        let reply = transport::send(&self.http, request).await?;
        if !reply.status.is_success() {
            tracing::error!(operation, status = %reply.status, "session request failed");
            return Err(Error::Session {
                operation,
                status: Some(reply.status),
                message: reply.body,
            });
        }
        Ok(reply)
    }
}

fn payload(operation: &'static str, reply: &Reply) -> Result<serde_json::Value> {
    reply
        .payload()
        .map_err(|e| Error::session(operation, format!("malformed response: {}", e)))
}
