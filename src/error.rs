// src/error.rs

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oauth2::basic::BasicErrorResponse;
use oauth2::{HttpClientError, RequestTokenError};
use thiserror::Error;
use tracing::warn;

/// Errors raised while loading or validating the application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or has the wrong shape.
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    /// A configuration value is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors raised while resolving the issuer's discovery document.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read local metadata file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed discovery document: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    #[error("Discovery request timed out")]
    Timeout,

    #[error("Discovery request failed: {0}")]
    HttpError(#[source] reqwest::Error),

    #[error("Discovery endpoint returned HTTP {0}")]
    UnexpectedStatus(StatusCode),
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DiscoveryError::Timeout
        } else {
            DiscoveryError::HttpError(err)
        }
    }
}

/// Errors raised while constructing the OIDC client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("At least one redirect URI must be registered")]
    NoRedirectUri,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A failed authorization-code exchange, as reported by the OAuth client.
pub type TokenExchangeError =
    RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>;

/// Per-request failures of the authorization-code callback.
///
/// None of these are shown to the user; the callback route logs them and
/// redirects to the landing page.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider redirected back with an `error` parameter.
    #[error("Identity provider returned error '{error}': {}", .description.as_deref().unwrap_or("no description"))]
    Provider {
        error: String,
        description: Option<String>,
    },

    #[error("Callback is missing the authorization code")]
    MissingCode,

    #[error("No authorization is pending for this session")]
    MissingPendingAuthorization,

    #[error("The state parameter does not match the pending authorization")]
    StateMismatch,

    /// The token endpoint rejected the exchange or could not be reached.
    #[error("Token exchange failed: {0}")]
    TokenExchange(#[from] TokenExchangeError),

    #[error("Token response could not be stored: {0}")]
    MalformedTokenResponse(#[from] serde_json::Error),

    #[error("The issuer does not advertise a userinfo endpoint")]
    MissingUserInfoEndpoint,

    #[error("Userinfo endpoint returned HTTP {0}")]
    UserInfo(StatusCode),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Failures of the downstream veteran status lookup.
///
/// Each variant maps to an explicit HTTP status so a failed lookup never
/// leaves the request pending.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The downstream API refused the bearer token.
    #[error("Veteran status endpoint rejected the access token (HTTP {0})")]
    Unauthorized(StatusCode),

    #[error("Veteran status endpoint returned HTTP {0}")]
    UnexpectedStatus(StatusCode),

    #[error("Veteran status request timed out")]
    Timeout,

    #[error("Veteran status request failed: {0}")]
    HttpError(#[source] reqwest::Error),

    #[error("Veteran status response is not valid JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("Veteran status response has no data.attributes.veteran_status field")]
    MissingField,

    #[error("Session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl From<reqwest::Error> for StatusError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StatusError::Timeout
        } else {
            StatusError::HttpError(err)
        }
    }
}

impl StatusError {
    /// The status code returned to the browser for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StatusError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StatusError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            StatusError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StatusError::UnexpectedStatus(_)
            | StatusError::HttpError(_)
            | StatusError::MalformedBody(_)
            | StatusError::MissingField => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!(status = %status, error = %self, "Veteran status lookup failed");
        (status, self.to_string()).into_response()
    }
}

/// Fatal errors in the startup chain. Any of these ends the process with a
/// non-zero exit code before a listener is bound.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Issuer metadata error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("OIDC client error: {0}")]
    Client(#[from] ClientError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
