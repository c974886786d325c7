use crate::assertion::{Audience, SignedAssertion};
use crate::config::GatewayConfig;
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::token::{AccessToken, BearerToken, TokenResponse};
use crate::transport;
use http::StatusCode;
use http::header::CONTENT_TYPE;

/// Characters of a refusal body kept in the warning event
const MAX_LOGGED_BODY: usize = 512;

/// Exchanges an access token plus a session-audience assertion for a bearer token
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    sso_sessions_url: String,
}

impl SessionClient {
    pub fn new(http: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            http,
            sso_sessions_url: config.sso_sessions_url(),
        }
    }

    /// `POST /gw/api/v1/sso-sessions` with the compact assertion as an `application/jwt`
    /// body.
    ///
    /// A non-200 reply is not an error: it yields `Ok(None)` and the status is only
    /// logged. Callers must check for absence before touching the session endpoints.
    /// Transport failures and a 200 without a usable `access_token` are still errors.
    pub async fn request_bearer_token(
        &self,
        access_token: &AccessToken,
        assertion: SignedAssertion,
    ) -> Result<Option<BearerToken>> {
        assertion.expect_audience(Audience::Session)?;

        let request = self
            .http
            .post(&self.sso_sessions_url)
            .bearer_auth(access_token.as_str())
            .header(CONTENT_TYPE, "application/jwt")
            .body(assertion.compact())
            .build()?;
        let reply = transport::send(&self.http, request).await?;

        if reply.status != StatusCode::OK {
            tracing::warn!(
                status = %reply.status,
                body = %diagnostics::summarize(&reply.body, MAX_LOGGED_BODY),
                "gateway did not issue a bearer token"
            );
            return Ok(None);
        }

        let token = reply
            .json::<TokenResponse>()
            .ok()
            .and_then(TokenResponse::into_token)
            .ok_or_else(|| Error::Session {
                operation: "bearer token request",
                status: Some(reply.status),
                message: "response is missing a valid access_token".to_string(),
            })?;

        tracing::info!("obtained SSO bearer token");
        Ok(Some(BearerToken::new(token)))
    }
}
