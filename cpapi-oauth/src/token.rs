use crate::assertion::{Audience, SignedAssertion};
use crate::config::{ClientIdentity, GatewayConfig};
use crate::error::{Error, Result};
use crate::transport;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// OAuth access token from the token endpoint. Only good for requesting a bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

/// Gateway-issued SSO bearer token authorizing the session endpoints
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Serialize)]
struct TokenForm<'a> {
    client_assertion_type: &'a str,
    client_assertion: &'a str,
    grant_type: &'a str,
    scope: &'a str,
}

/// Body returned by both the token and the SSO session endpoint
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

impl TokenResponse {
    pub fn into_token(self) -> Option<String> {
        Some(self.access_token).filter(|t| !t.is_empty())
    }
}

/// Exchanges a token-audience assertion for an OAuth access token
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_url: String,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            http,
            token_url: config.token_url(),
        }
    }

    /// `POST /oauth2/api/v1/token` with the JWT-bearer client credentials grant.
    ///
    /// Anything other than a 200 carrying a non-empty `access_token` is an
    /// [`Error::Auth`]. The assertion is consumed either way.
    pub async fn request_access_token(
        &self,
        identity: &ClientIdentity,
        assertion: SignedAssertion,
    ) -> Result<AccessToken> {
        assertion.expect_audience(Audience::Token)?;

        let compact = assertion.compact();
        let form = TokenForm {
            client_assertion_type: JWT_BEARER_ASSERTION_TYPE,
            client_assertion: &compact,
            grant_type: "client_credentials",
            scope: &identity.scope,
        };

        let request = self.http.post(&self.token_url).form(&form).build()?;
        let reply = transport::send(&self.http, request).await?;

        if reply.status != StatusCode::OK {
            tracing::error!(status = %reply.status, "token endpoint rejected client assertion");
            return Err(Error::Auth {
                status: Some(reply.status),
                message: reply.body,
            });
        }

        let token = reply
            .json::<TokenResponse>()
            .ok()
            .and_then(TokenResponse::into_token)
            .ok_or_else(|| Error::Auth {
                status: Some(reply.status),
                message: "response is missing a valid access_token".to_string(),
            })?;

        tracing::info!(client_id = %identity.client_id, "obtained OAuth access token");
        Ok(AccessToken::new(token))
    }
}
