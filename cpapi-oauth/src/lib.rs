//! # cpapi-oauth
//!
//! Client-side OAuth 2.0 JWT-bearer authentication for the Client Portal gateway API.
//!
//! The handshake is a linear chain, each step feeding the next:
//!
//! 1. [`KeyStore`] loads the client's RSA key once.
//! 2. [`AssertionBuilder`] signs an RS256 client assertion for the token endpoint.
//! 3. [`TokenClient`] trades it for an OAuth [`AccessToken`].
//! 4. [`SessionClient`] trades the access token and a second, session-audience
//!    assertion for a [`BearerToken`].
//! 5. [`SessionManager`] uses the bearer token to init, validate, tickle and log out.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cpapi_oauth::{Authenticator, Config, SessionManager, build_client};
//!
//! # async fn example() -> cpapi_oauth::Result<()> {
//! let config = Config::from_env()?;
//! let http = build_client(&config.gateway)?;
//! let auth = Authenticator::from_config(&config, http.clone())?;
//! let sessions = SessionManager::new(http, &config.gateway);
//!
//! let bearer = auth.authenticate().await?;
//! sessions.ssodh_init(&bearer).await?;
//! let session_id = sessions.tickle(&bearer).await?;
//! sessions.logout(&bearer).await?;
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handshake;
pub mod keys;
pub mod session;
pub mod sso;
pub mod token;
mod transport;

pub use assertion::{AssertionBuilder, Audience, SignedAssertion};
pub use config::{ClientIdentity, Config, GatewayConfig};
pub use error::{Error, Result};
pub use handshake::Authenticator;
pub use keys::KeyStore;
pub use session::{SessionManager, SessionState};
pub use sso::SessionClient;
pub use token::{AccessToken, BearerToken, TokenClient};
pub use transport::build_client;
