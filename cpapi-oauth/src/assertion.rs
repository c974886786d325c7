//! Signed client assertions (compact RS256 JWS) for the token and session endpoints.
//!
//! The claim set depends on the audience:
//!
//! - [`Audience::Token`]: `iss`, `sub`, `aud = "/token"`, a 30 second window starting
//!   10 seconds before `now` to tolerate clock drift.
//! - [`Audience::Session`]: `ip`, `credential`, `iss`, a 24 hour window starting at `now`.
//!
//! Header and claims are serialized as compact JSON in field declaration order. The
//! signature covers those exact bytes, so the order must not change between signing and
//! sending.

use crate::config::ClientIdentity;
use crate::error::{Error, Result};
use crate::keys::KeyStore;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rsa::signature::SignatureEncoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// `aud` claim expected by the token endpoint
pub const TOKEN_AUDIENCE: &str = "/token";

/// Seconds the token assertion stays valid after `now`
pub const TOKEN_ASSERTION_TTL: i64 = 20;

/// Seconds the token assertion is backdated
pub const TOKEN_ASSERTION_BACKDATE: i64 = 10;

/// Seconds the session assertion stays valid after `now`
pub const SESSION_ASSERTION_TTL: i64 = 86_400;

/// The endpoint an assertion is minted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// `POST /oauth2/api/v1/token`
    Token,
    /// `POST /gw/api/v1/sso-sessions`
    Session,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Token => "token",
            Audience::Session => "session",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

impl AssertionHeader {
    fn rs256(kid: &str) -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
            kid: kid.to_string(),
        }
    }
}

/// Claims presented to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims presented to the SSO session endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub ip: String,
    pub credential: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

/// A compact `header.claims.signature` token bound to one audience.
///
/// Not `Clone`: the request functions take it by value so it is sent at most once.
pub struct SignedAssertion {
    audience: Audience,
    header: String,
    claims: String,
    signature: String,
}

impl SignedAssertion {
    pub fn audience(&self) -> Audience {
        self.audience
    }

    pub fn encoded_header(&self) -> &str {
        &self.header
    }

    pub fn encoded_claims(&self) -> &str {
        &self.claims
    }

    pub fn encoded_signature(&self) -> &str {
        &self.signature
    }

    /// The bytes the signature covers
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.claims)
    }

    pub fn compact(&self) -> String {
        format!("{}.{}.{}", self.header, self.claims, self.signature)
    }

    pub(crate) fn expect_audience(&self, expected: Audience) -> Result<()> {
        if self.audience != expected {
            return Err(Error::AudienceMismatch {
                expected: expected.as_str(),
                actual: self.audience.as_str(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

/// Builds and signs assertions with the loaded client key
#[derive(Debug, Clone)]
pub struct AssertionBuilder {
    key_store: Arc<KeyStore>,
}

impl AssertionBuilder {
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self { key_store }
    }

    pub fn build(
        &self,
        audience: Audience,
        identity: &ClientIdentity,
        now: DateTime<Utc>,
    ) -> Result<SignedAssertion> {
        let now = now.timestamp();
        let header = AssertionHeader::rs256(&identity.client_key_id);

        let claims_json = match audience {
            Audience::Token => to_compact_json(&TokenClaims {
                iss: identity.client_id.clone(),
                sub: identity.client_id.clone(),
                aud: TOKEN_AUDIENCE.to_string(),
                exp: now + TOKEN_ASSERTION_TTL,
                iat: now - TOKEN_ASSERTION_BACKDATE,
            })?,
            Audience::Session => to_compact_json(&SessionClaims {
                ip: identity.source_ip.to_string(),
                credential: identity.credential.clone(),
                iss: identity.client_id.clone(),
                exp: now + SESSION_ASSERTION_TTL,
                iat: now,
            })?,
        };
        let header_json = to_compact_json(&header)?;

        let header_b64 = base64url(header_json.as_bytes());
        let claims_b64 = base64url(claims_json.as_bytes());
        let signature_input = format!("{}.{}", header_b64, claims_b64);

        let signature = self.key_store.sign(signature_input.as_bytes())?;
        let signature_b64 = base64url(&signature.to_bytes());

        tracing::debug!(%audience, kid = %header.kid, "built client assertion");

        Ok(SignedAssertion {
            audience,
            header: header_b64,
            claims: claims_b64,
            signature: signature_b64,
        })
    }
}

/// RFC 4648 base64url without padding
pub fn base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn to_compact_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Signing(format!("failed to serialize assertion: {}", e)))
}
