// src/model.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Represents the data structure of an OIDC provider's discovery document.
/// Found at the `.well-known/openid-configuration` endpoint.
///
/// Fields the client does not use are kept in `other` so the document can be
/// logged or re-served unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IssuerMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<Url>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl IssuerMetadata {
    /// Whether the issuer advertises the PKCE `S256` challenge method.
    pub fn supports_pkce_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|method| method == "S256")
    }
}

/// The bundle of tokens returned by a successful authorization-code exchange.
///
/// `expires_at` is not sent by the token endpoint; it is stamped from
/// `expires_in` when the exchange completes. Any field the token endpoint
/// sends beyond the standard ones lands in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Unix timestamp (seconds) after which the access token is expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenSet {
    /// Records the absolute expiry relative to `now` (Unix seconds).
    pub fn stamp_expiry(&mut self, now: i64) {
        if let Some(expires_in) = self.expires_in {
            let expires_in = i64::try_from(expires_in).unwrap_or(i64::MAX);
            self.expires_at = Some(now.saturating_add(expires_in));
        }
    }

    /// Whether the access token is expired at `now` (Unix seconds).
    /// A token set without an expiry never expires.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Whether the access token is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// The authenticated identity stored in a session.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Principal {
    pub userinfo: Value,
    pub tokenset: TokenSet,
}

/// Parameters the identity provider appends to the redirect URI.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// An authorization the user has been redirected to but not yet returned from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PendingAuthorization {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}
