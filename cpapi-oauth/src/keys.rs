//! Process-lifetime holder for the client's RSA signing key.

use crate::error::{Error, Result};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{Keypair, Signer};
use sha2::Sha256;
use std::fmt;
use std::path::Path;

/// Holds the RS256 signing key. Read-only after load, so a single instance can be
/// shared behind an `Arc` by every signing call.
pub struct KeyStore {
    signing_key: SigningKey<Sha256>,
}

impl KeyStore {
    /// Read and parse the PEM file at `path`. The file is closed before this returns.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| Error::KeyLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let store = Self::from_pem(&pem).map_err(|e| match e {
            Error::KeyLoad { reason, .. } => Error::KeyLoad {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        tracing::info!("loaded RSA signing key from {}", path.display());
        Ok(store)
    }

    /// Parse a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| Error::KeyLoad {
                path: "<memory>".into(),
                reason: format!("not a valid RSA private key: {}", e),
            })?;

        Ok(Self::from_key(key))
    }

    pub fn from_key(key: RsaPrivateKey) -> Self {
        Self {
            signing_key: SigningKey::<Sha256>::new(key),
        }
    }

    /// RSASSA-PKCS1-v1_5 over SHA-256 of `message`
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        self.signing_key
            .try_sign(message)
            .map_err(|e| Error::Signing(e.to_string()))
    }

    pub fn verifying_key(&self) -> VerifyingKey<Sha256> {
        self.signing_key.verifying_key()
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore").finish_non_exhaustive()
    }
}
