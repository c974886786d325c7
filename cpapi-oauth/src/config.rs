use crate::error::{Error, Result};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_HOST: &str = "https://api.ibkr.com";
pub const DEFAULT_CLIENT_KEY_ID: &str = "main";
pub const DEFAULT_SCOPE: &str = "sso-sessions.write";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TICKLE_INTERVAL: Duration = Duration::from_secs(60);

/// Who we are to the gateway. Supplied once at startup and read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    /// Key id advertised in the `kid` header of every assertion
    pub client_key_id: String,
    pub credential: String,
    pub source_ip: IpAddr,
    /// OAuth scope requested with the access token
    pub scope: String,
}

impl ClientIdentity {
    pub fn new(
        client_id: impl Into<String>,
        credential: impl Into<String>,
        source_ip: IpAddr,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_key_id: DEFAULT_CLIENT_KEY_ID.to_string(),
            credential: credential.into(),
            source_ip,
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    pub fn with_client_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.client_key_id = key_id.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_key_id", &self.client_key_id)
            .field("credential", &"<redacted>")
            .field("source_ip", &self.source_ip)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Where the gateway lives and how we talk to it
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host serving `/oauth2/api/v1/token`
    pub oauth_host: Url,

    /// Host serving `/gw/api/v1/sso-sessions`
    pub gateway_host: Url,

    /// Host serving the `/v1/api/...` session endpoints
    pub portal_host: Url,

    pub user_agent: String,

    /// Upper bound on every outbound request
    pub request_timeout: Duration,

    /// How often the keep-alive loop tickles the session
    pub tickle_interval: Duration,
}

impl GatewayConfig {
    /// Point every endpoint at a single base URL
    pub fn new(host: Url) -> Self {
        Self {
            oauth_host: host.clone(),
            gateway_host: host.clone(),
            portal_host: host,
            user_agent: default_user_agent(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tickle_interval: DEFAULT_TICKLE_INTERVAL,
        }
    }

    pub fn with_oauth_host(mut self, host: Url) -> Self {
        self.oauth_host = host;
        self
    }

    pub fn with_gateway_host(mut self, host: Url) -> Self {
        self.gateway_host = host;
        self
    }

    pub fn with_portal_host(mut self, host: Url) -> Self {
        self.portal_host = host;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tickle_interval(mut self, interval: Duration) -> Self {
        self.tickle_interval = interval;
        self
    }

    pub fn token_url(&self) -> String {
        join(&self.oauth_host, "/oauth2/api/v1/token")
    }

    pub fn sso_sessions_url(&self) -> String {
        join(&self.gateway_host, "/gw/api/v1/sso-sessions")
    }

    pub fn ssodh_init_url(&self) -> String {
        join(&self.portal_host, "/v1/api/iserver/auth/ssodh/init")
    }

    pub fn validate_url(&self) -> String {
        join(&self.portal_host, "/v1/api/sso/validate")
    }

    pub fn tickle_url(&self) -> String {
        join(&self.portal_host, "/v1/api/tickle")
    }

    pub fn logout_url(&self) -> String {
        join(&self.portal_host, "/v1/api/logout")
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        // DEFAULT_HOST is a constant, valid URL
        Self::new(Url::parse(DEFAULT_HOST).expect("valid url"))
    }
}

fn join(host: &Url, path: &str) -> String {
    format!("{}{}", host.as_str().trim_end_matches('/'), path)
}

fn default_user_agent() -> String {
    format!("cpapi-oauth/{}", env!("CARGO_PKG_VERSION"))
}

/// Everything needed to run the handshake, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub identity: ClientIdentity,
    pub private_key_path: PathBuf,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as missing. The first missing or malformed variable
    /// aborts loading.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require =
            |name: &'static str| get(name).ok_or_else(|| Error::config(name, "missing"));

        let source_ip = require("IBKR_SOURCE_IP")?;
        let source_ip: IpAddr = source_ip
            .trim()
            .parse()
            .map_err(|e| Error::config("IBKR_SOURCE_IP", format!("{}", e)))?;

        let identity = ClientIdentity {
            client_id: require("IBKR_CLIENT_ID")?,
            client_key_id: get("IBKR_CLIENT_KEY_ID")
                .unwrap_or_else(|| DEFAULT_CLIENT_KEY_ID.to_string()),
            credential: require("IBKR_CREDENTIAL")?,
            source_ip,
            scope: get("IBKR_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        };

        let private_key_path = PathBuf::from(require("IBKR_PRIVATE_KEY_PATH")?);

        let mut gateway = GatewayConfig::default();
        if let Some(host) = get("IBKR_OAUTH_HOST") {
            gateway.oauth_host = parse_url("IBKR_OAUTH_HOST", &host)?;
        }
        if let Some(host) = get("IBKR_GATEWAY_HOST") {
            gateway.gateway_host = parse_url("IBKR_GATEWAY_HOST", &host)?;
        }
        if let Some(host) = get("IBKR_PORTAL_HOST") {
            gateway.portal_host = parse_url("IBKR_PORTAL_HOST", &host)?;
        }
        if let Some(user_agent) = get("IBKR_USER_AGENT") {
            gateway.user_agent = user_agent;
        }
        if let Some(secs) = get("IBKR_REQUEST_TIMEOUT_SECS") {
            gateway.request_timeout = parse_secs("IBKR_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = get("IBKR_TICKLE_INTERVAL_SECS") {
            gateway.tickle_interval = parse_secs("IBKR_TICKLE_INTERVAL_SECS", &secs)?;
        }

        Ok(Self {
            identity,
            private_key_path,
            gateway,
        })
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url> {
    Url::parse(value.trim()).map_err(|e| Error::config(var, e.to_string()))
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|e| Error::config(var, format!("expected whole seconds: {}", e)))?;
    if secs == 0 {
        return Err(Error::config(var, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
