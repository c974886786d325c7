use crate::assertion::{AssertionBuilder, Audience};
use crate::config::{ClientIdentity, Config, GatewayConfig};
use crate::error::{Error, Result};
use crate::keys::KeyStore;
use crate::sso::SessionClient;
use crate::token::{AccessToken, BearerToken, TokenClient};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Chains the two token exchanges: client assertion → access token → bearer token.
///
/// Every call builds fresh assertions, so a failed handshake can simply be run again.
#[derive(Debug, Clone)]
pub struct Authenticator {
    identity: ClientIdentity,
    assertions: AssertionBuilder,
    tokens: TokenClient,
    sessions: SessionClient,
}

impl Authenticator {
    pub fn new(
        identity: ClientIdentity,
        key_store: Arc<KeyStore>,
        http: reqwest::Client,
        gateway: &GatewayConfig,
    ) -> Self {
        Self {
            identity,
            assertions: AssertionBuilder::new(key_store),
            tokens: TokenClient::new(http.clone(), gateway),
            sessions: SessionClient::new(http, gateway),
        }
    }

    /// Load the private key named by `config` and wire up the clients.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self> {
        let key_store = Arc::new(KeyStore::load(&config.private_key_path)?);
        Ok(Self::new(
            config.identity.clone(),
            key_store,
            http,
            &config.gateway,
        ))
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub async fn access_token(&self, now: DateTime<Utc>) -> Result<AccessToken> {
        let assertion = self.assertions.build(Audience::Token, &self.identity, now)?;
        self.tokens
            .request_access_token(&self.identity, assertion)
            .await
    }

    /// `None` when the gateway refuses; see [`SessionClient::request_bearer_token`].
    pub async fn bearer_token(
        &self,
        access_token: &AccessToken,
        now: DateTime<Utc>,
    ) -> Result<Option<BearerToken>> {
        let assertion = self.assertions.build(Audience::Session, &self.identity, now)?;
        self.sessions
            .request_bearer_token(access_token, assertion)
            .await
    }

    /// Run both exchanges back to back. An absent bearer token becomes
    /// [`Error::Session`].
    pub async fn authenticate(&self) -> Result<BearerToken> {
        let access_token = self.access_token(Utc::now()).await?;
        self.bearer_token(&access_token, Utc::now())
            .await?
            .ok_or_else(|| {
                Error::session(
                    "bearer token request",
                    "gateway refused the session assertion",
                )
            })
    }
}
