use http::StatusCode;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Startup errors
    #[error("configuration error: {var}: {reason}")]
    Config { var: &'static str, reason: String },

    #[error("failed to load private key from {}: {reason}", path.display())]
    KeyLoad { path: PathBuf, reason: String },

    // Assertion errors
    #[error("signing error: {0}")]
    Signing(String),

    #[error("assertion built for {actual} audience presented to {expected} endpoint")]
    AudienceMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    // Network errors
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    // Gateway errors
    #[error("{}", describe("access token request", *status, message))]
    Auth {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("{}", describe(operation, *status, message))]
    Session {
        operation: &'static str,
        status: Option<StatusCode>,
        message: String,
    },
}

impl Error {
    pub(crate) fn config(var: &'static str, reason: impl Into<String>) -> Self {
        Error::Config {
            var,
            reason: reason.into(),
        }
    }

    pub(crate) fn session(operation: &'static str, message: impl Into<String>) -> Self {
        Error::Session {
            operation,
            status: None,
            message: message.into(),
        }
    }

    /// Whether restarting the handshake with freshly built assertions may succeed.
    ///
    /// Only transport failures qualify. Rejections from the gateway usually mean bad
    /// credentials or clock skew and will fail again on replay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_))
    }
}

fn describe(what: &str, status: Option<StatusCode>, message: &str) -> String {
    match status {
        Some(status) => format!("{} failed with {}: {}", what, status, message),
        None => format!("{} failed: {}", what, message),
    }
}
