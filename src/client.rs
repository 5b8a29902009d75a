// src/client.rs

use crate::config::ClientCredentials;
use crate::error::{AuthError, ClientError};
use crate::model::{IssuerMetadata, TokenSet};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Builds the HTTP client shared by every outbound call.
///
/// Discovery, token exchange, userinfo and the downstream status lookup all
/// go through this client, so they share one timeout. Redirects are not
/// followed.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Token endpoint fields beyond the OAuth 2.0 standard ones, such as
/// `id_token` or issuer-specific extensions. Kept so the stored token set
/// is what the issuer returned.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IssuerTokenFields {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ExtraTokenFields for IssuerTokenFields {}

pub type IssuerTokenResponse = StandardTokenResponse<IssuerTokenFields, BasicTokenType>;

/// The OAuth 2.0 client with its authorization and token endpoints set.
type IssuerClient = oauth2::Client<
    BasicErrorResponse,
    IssuerTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// An OIDC relying-party client bound to one issuer.
///
/// Built once at startup from the resolved issuer metadata and shared by
/// every request; cloning is cheap.
#[derive(Clone)]
pub struct OidcClient {
    // The client is internally ref-counted to allow for cheap cloning.
    inner: Arc<Inner>,
}

struct Inner {
    oauth: IssuerClient,
    metadata: IssuerMetadata,
    redirect_uri: Url,
    http_client: reqwest::Client,
}

impl OidcClient {
    /// Creates a new `OidcClient`.
    ///
    /// Only the first redirect URI is used; the list mirrors what was
    /// registered at the issuer. The client authenticates at the token
    /// endpoint with HTTP Basic (`client_secret_basic`).
    pub fn new(
        metadata: IssuerMetadata,
        credentials: ClientCredentials,
        redirect_uris: Vec<Url>,
        http_client: reqwest::Client,
    ) -> Result<Self, ClientError> {
        let redirect_uri = redirect_uris
            .into_iter()
            .next()
            .ok_or(ClientError::NoRedirectUri)?;

        debug!(
            issuer = %metadata.issuer,
            client_id = %credentials.client_id,
            redirect_uri = %redirect_uri,
            "Constructed OIDC client"
        );

        let oauth: IssuerClient = oauth2::Client::new(ClientId::new(credentials.client_id))
            .set_client_secret(ClientSecret::new(credentials.client_secret))
            .set_auth_uri(AuthUrl::from_url(metadata.authorization_endpoint.clone()))
            .set_token_uri(TokenUrl::from_url(metadata.token_endpoint.clone()))
            .set_redirect_uri(RedirectUrl::from_url(redirect_uri.clone()));

        Ok(Self {
            inner: Arc::new(Inner {
                oauth,
                metadata,
                redirect_uri,
                http_client,
            }),
        })
    }

    pub fn metadata(&self) -> &IssuerMetadata {
        &self.inner.metadata
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.inner.redirect_uri
    }

    /// Computes the URL the browser is sent to in order to authenticate,
    /// together with the fresh `state` value it carries.
    pub fn authorization_url(
        &self,
        scopes: &str,
        identity_provider: Option<&str>,
        pkce_challenge: Option<PkceCodeChallenge>,
    ) -> (Url, CsrfToken) {
        let mut request = self
            .inner
            .oauth
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.split_whitespace().map(|s| Scope::new(s.to_string())));
        if let Some(challenge) = pkce_challenge {
            request = request.set_pkce_challenge(challenge);
        }
        if let Some(idp) = identity_provider {
            request = request.add_extra_param("idp", idp.to_string());
        }
        request.url()
    }

    /// Exchanges an authorization code for a token set at the token endpoint.
    ///
    /// The returned token set carries an absolute `expires_at` when the
    /// issuer sent `expires_in`.
    #[instrument(skip(self, code, code_verifier), err)]
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, AuthError> {
        let mut request = self
            .inner
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = code_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_string()));
        }
        let response = request.request_async(&self.inner.http_client).await?;

        let mut tokenset: TokenSet = serde_json::from_value(serde_json::to_value(&response)?)?;
        tokenset.stamp_expiry(chrono::Utc::now().timestamp());
        debug!(
            token_type = %tokenset.token_type,
            expires_at = ?tokenset.expires_at,
            "Token exchange succeeded"
        );
        Ok(tokenset)
    }

    /// Fetches the user's claims from the issuer's userinfo endpoint.
    #[instrument(skip(self, access_token), err)]
    pub async fn userinfo(&self, access_token: &str) -> Result<Value, AuthError> {
        let endpoint = self
            .inner
            .metadata
            .userinfo_endpoint
            .clone()
            .ok_or(AuthError::MissingUserInfoEndpoint)?;

        let response = self
            .inner
            .http_client
            .get(endpoint)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::UserInfo(status));
        }
        Ok(response.json().await?)
    }
}
