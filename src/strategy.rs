// src/strategy.rs

use crate::client::OidcClient;
use crate::error::AuthError;
use crate::model::{CallbackParams, PendingAuthorization, Principal};
use async_trait::async_trait;
use oauth2::PkceCodeChallenge;
use tracing::{debug, info, instrument};
use url::Url;

/// The redirect produced when a login starts, together with the state the
/// callback will have to match.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub pending: PendingAuthorization,
}

/// A pluggable authentication handler.
///
/// `begin` drives the `unauthenticated -> redirecting` transition and
/// `complete` the `callback_pending -> authenticated | failed` one. The
/// router owns the session; strategies only see the pending authorization
/// it hands them.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// The name the strategy is registered under.
    fn name(&self) -> &'static str;

    /// Starts a login attempt.
    fn begin(&self) -> AuthorizationRequest;

    /// Finishes a login attempt from the issuer's redirect back to us.
    async fn complete(
        &self,
        pending: Option<PendingAuthorization>,
        params: CallbackParams,
    ) -> Result<Principal, AuthError>;
}

/// Authorization-code strategy against an OIDC issuer.
#[derive(Clone)]
pub struct OidcStrategy {
    client: OidcClient,
    scope: String,
    identity_provider: Option<String>,
    use_pkce: bool,
}

impl OidcStrategy {
    pub const NAME: &'static str = "oidc";

    /// Creates a strategy requesting `scope`. PKCE is used whenever the
    /// issuer advertises `S256`.
    pub fn new(
        client: OidcClient,
        scope: impl Into<String>,
        identity_provider: Option<String>,
    ) -> Self {
        let use_pkce = client.metadata().supports_pkce_s256();
        Self {
            client,
            scope: scope.into(),
            identity_provider,
            use_pkce,
        }
    }

    pub fn client(&self) -> &OidcClient {
        &self.client
    }
}

#[async_trait]
impl AuthStrategy for OidcStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn begin(&self) -> AuthorizationRequest {
        let (challenge, verifier) = self
            .use_pkce
            .then(PkceCodeChallenge::new_random_sha256)
            .unzip();

        let (url, state) = self.client.authorization_url(
            &self.scope,
            self.identity_provider.as_deref(),
            challenge,
        );
        debug!(pkce = self.use_pkce, "Redirecting to authorization endpoint");

        AuthorizationRequest {
            url,
            pending: PendingAuthorization {
                state: state.secret().clone(),
                code_verifier: verifier.map(|v| v.secret().clone()),
            },
        }
    }

    #[instrument(skip_all, fields(strategy = "oidc"), err)]
    async fn complete(
        &self,
        pending: Option<PendingAuthorization>,
        params: CallbackParams,
    ) -> Result<Principal, AuthError> {
        if let Some(error) = params.error {
            return Err(AuthError::Provider {
                error,
                description: params.error_description,
            });
        }

        let pending = pending.ok_or(AuthError::MissingPendingAuthorization)?;
        if params.state.as_deref() != Some(pending.state.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        let code = params.code.ok_or(AuthError::MissingCode)?;

        let tokenset = self
            .client
            .exchange_code(&code, pending.code_verifier.as_deref())
            .await?;
        let userinfo = self.client.userinfo(&tokenset.access_token).await?;

        info!(
            sub = userinfo.get("sub").and_then(|s| s.as_str()).unwrap_or("<unknown>"),
            "User authenticated"
        );
        Ok(Principal { userinfo, tokenset })
    }
}
