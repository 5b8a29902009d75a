// src/config.rs

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/auth/cb";
pub const DEFAULT_DISCOVERY_URL: &str =
    "https://dev-api.va.gov/oauth2/.well-known/openid-configuration";
pub const DEFAULT_VETERAN_STATUS_URL: &str =
    "https://dev-api.va.gov/services/veteran_verification/v0/status";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SCOPES: &str = "openid profile veteran_status.read";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(2500);
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_SESSIONS: u64 = 10_000;

/// Shortest accepted session secret, in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// The credentials the application was registered with at the issuer.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// The application configuration.
///
/// Loaded once at startup and never mutated; handlers see it through the
/// shared application state. Construct it with [`ConfigBuilder`].
#[derive(Clone)]
pub struct Config {
    pub credentials: ClientCredentials,
    /// Optional `idp` hint forwarded to the authorization endpoint.
    pub identity_provider: Option<String>,
    /// Secret the session cookie signing key is derived from.
    pub session_secret: String,
    /// The single redirect URI registered for this client.
    pub redirect_uri: Url,
    /// Well-known discovery URL used when metadata is fetched remotely.
    pub discovery_url: Url,
    /// Downstream endpoint queried by `/status`.
    pub veteran_status_url: Url,
    pub listen_addr: SocketAddr,
    /// Space-separated scopes requested at the authorization endpoint.
    pub scopes: String,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
    pub session_idle_timeout: Duration,
    /// Upper bound on sessions held in memory; the least useful are evicted
    /// beyond it.
    pub max_sessions: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("credentials", &self.credentials)
            .field("identity_provider", &self.identity_provider)
            .field("session_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("discovery_url", &self.discovery_url.as_str())
            .field("veteran_status_url", &self.veteran_status_url.as_str())
            .field("listen_addr", &self.listen_addr)
            .field("scopes", &self.scopes)
            .field("http_timeout", &self.http_timeout)
            .field("session_idle_timeout", &self.session_idle_timeout)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

/// On-disk shape of `config.json`. Only the credentials are required.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    client_id: Option<String>,
    client_secret: Option<String>,
    identity_provider: Option<String>,
    session_secret: Option<String>,
    redirect_uri: Option<String>,
    discovery_url: Option<String>,
    veteran_status_url: Option<String>,
    listen_addr: Option<String>,
    scopes: Option<String>,
    http_timeout_ms: Option<u64>,
    session_idle_timeout_secs: Option<u64>,
    max_sessions: Option<u64>,
}

/// A builder for creating a `Config` instance.
///
/// String values are kept raw until [`ConfigBuilder::build`], which parses
/// and validates everything in one place so file-loaded and programmatic
/// configurations fail the same way.
#[derive(Default)]
pub struct ConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    identity_provider: Option<String>,
    session_secret: Option<String>,
    redirect_uri: Option<String>,
    discovery_url: Option<String>,
    veteran_status_url: Option<String>,
    listen_addr: Option<String>,
    scopes: Option<String>,
    http_timeout: Option<Duration>,
    session_idle_timeout: Option<Duration>,
    max_sessions: Option<u64>,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder pre-populated from a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON of
    /// the expected shape.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Creates a builder pre-populated from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(raw)?;
        Ok(Self {
            client_id: file.client_id,
            client_secret: file.client_secret,
            identity_provider: file.identity_provider,
            session_secret: file.session_secret,
            redirect_uri: file.redirect_uri,
            discovery_url: file.discovery_url,
            veteran_status_url: file.veteran_status_url,
            listen_addr: file.listen_addr,
            scopes: file.scopes,
            http_timeout: file.http_timeout_ms.map(Duration::from_millis),
            session_idle_timeout: file.session_idle_timeout_secs.map(Duration::from_secs),
            max_sessions: file.max_sessions,
        })
    }

    /// Sets the client ID. This is a required field.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret. This is a required field.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the identity provider hint sent as `idp`.
    pub fn identity_provider(mut self, identity_provider: impl Into<String>) -> Self {
        self.identity_provider = Some(identity_provider.into());
        self
    }

    /// Sets the session secret. This is a required field.
    pub fn session_secret(mut self, session_secret: impl Into<String>) -> Self {
        self.session_secret = Some(session_secret.into());
        self
    }

    pub fn redirect_uri(mut self, url: impl Into<String>) -> Self {
        self.redirect_uri = Some(url.into());
        self
    }

    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = Some(url.into());
        self
    }

    pub fn veteran_status_url(mut self, url: impl Into<String>) -> Self {
        self.veteran_status_url = Some(url.into());
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    pub fn scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    /// Sets the timeout for outbound requests. Defaults to 2500ms.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = Some(timeout);
        self
    }

    /// Caps the number of in-memory sessions. Defaults to 10 000.
    pub fn max_sessions(mut self, max_sessions: u64) -> Self {
        self.max_sessions = Some(max_sessions);
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields (`client_id`, `client_secret`,
    /// `session_secret`) are missing, if the session secret is too short,
    /// or if any URL or address fails to parse.
    pub fn build(self) -> Result<Config, ConfigError> {
        let client_id = required("client_id", self.client_id)?;
        let client_secret = required("client_secret", self.client_secret)?;
        let session_secret = required("session_secret", self.session_secret)?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::InvalidConfiguration(format!(
                "session_secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
            )));
        }

        let listen_addr = self
            .listen_addr
            .as_deref()
            .unwrap_or(DEFAULT_LISTEN_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidConfiguration(format!("listen_addr: {e}")))?;

        let max_sessions = self.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS);
        if max_sessions == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "max_sessions must be greater than zero".to_string(),
            ));
        }

        let http_timeout = self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT);
        if http_timeout.is_zero() {
            return Err(ConfigError::InvalidConfiguration(
                "http_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            credentials: ClientCredentials {
                client_id,
                client_secret,
            },
            identity_provider: self.identity_provider.filter(|idp| !idp.is_empty()),
            session_secret,
            redirect_uri: parse_url("redirect_uri", self.redirect_uri, DEFAULT_REDIRECT_URI)?,
            discovery_url: parse_url("discovery_url", self.discovery_url, DEFAULT_DISCOVERY_URL)?,
            veteran_status_url: parse_url(
                "veteran_status_url",
                self.veteran_status_url,
                DEFAULT_VETERAN_STATUS_URL,
            )?,
            listen_addr,
            scopes: self.scopes.unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            http_timeout,
            session_idle_timeout: self
                .session_idle_timeout
                .unwrap_or(DEFAULT_SESSION_IDLE_TIMEOUT),
            max_sessions,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingConfiguration(field.to_string()))
}

fn parse_url(field: &str, value: Option<String>, default: &str) -> Result<Url, ConfigError> {
    let raw = value.as_deref().unwrap_or(default);
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn defaults_fill_in_everything_but_credentials() {
        let config = ConfigBuilder::from_json(r#"{"client_id":"abc","client_secret":"shh"}"#)
            .unwrap()
            .session_secret(SECRET)
            .build()
            .unwrap();

        assert_eq!(config.credentials.client_id, "abc");
        assert_eq!(config.redirect_uri.as_str(), DEFAULT_REDIRECT_URI);
        assert_eq!(config.veteran_status_url.as_str(), DEFAULT_VETERAN_STATUS_URL);
        assert_eq!(config.http_timeout, Duration::from_millis(2500));
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.scopes, "openid profile veteran_status.read");
        assert!(config.identity_provider.is_none());
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
    }

    #[test]
    fn session_cap_is_read_from_file_and_must_be_positive() {
        let builder = ConfigBuilder::from_json(
            r#"{"client_id":"abc","client_secret":"shh","max_sessions":250}"#,
        )
        .unwrap()
        .session_secret(SECRET);
        assert_eq!(builder.build().unwrap().max_sessions, 250);

        let err = ConfigBuilder::new()
            .client_id("abc")
            .client_secret("shh")
            .session_secret(SECRET)
            .max_sessions(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = ConfigBuilder::new()
            .client_id("abc")
            .client_secret("shh")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfiguration(f) if f == "session_secret"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = ConfigBuilder::new()
            .client_id("abc")
            .client_secret("shh")
            .session_secret("My Super Secret Secret")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
    }

    #[test]
    fn unknown_fields_are_malformed() {
        assert!(ConfigBuilder::from_json(r#"{"client_id":"abc","clientSecret":"x"}"#).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = ConfigBuilder::new()
            .client_id("abc")
            .client_secret("very-secret-value")
            .session_secret(SECRET)
            .build()
            .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret-value"));
        assert!(!rendered.contains(SECRET));
    }
}
