// src/server.rs

use crate::client::{self, OidcClient};
use crate::config::Config;
use crate::error::{StartupError, StatusError};
use crate::issuer::{self, MetadataSource};
use crate::model::CallbackParams;
use crate::session::{self, MokaSessionStore, SESSION_COOKIE};
use crate::strategy::{AuthStrategy, OidcStrategy};
use crate::veteran::VeteranStatusClient;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::time;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tracing::{error, info, warn};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub strategy: Arc<dyn AuthStrategy>,
    pub veteran_status: VeteranStatusClient,
    pub sessions: MokaSessionStore,
}

impl AppState {
    /// Runs the startup chain: metadata → client → strategy.
    ///
    /// Nothing is served until this returns, and any error here is fatal.
    pub async fn initialize(
        config: Config,
        source: MetadataSource,
    ) -> Result<Self, StartupError> {
        let http_client = client::http_client(config.http_timeout)?;
        let metadata = issuer::resolve(&source, &http_client).await?;

        let oidc_client = OidcClient::new(
            metadata,
            config.credentials.clone(),
            vec![config.redirect_uri.clone()],
            http_client.clone(),
        )?;
        let strategy = OidcStrategy::new(
            oidc_client,
            config.scopes.clone(),
            config.identity_provider.clone(),
        );
        info!(strategy = OidcStrategy::NAME, "Authentication strategy registered");

        Ok(Self::new(config, Arc::new(strategy), http_client))
    }

    /// Assembles the state from an already-built strategy.
    pub fn new(
        config: Config,
        strategy: Arc<dyn AuthStrategy>,
        http_client: reqwest::Client,
    ) -> Self {
        let veteran_status =
            VeteranStatusClient::new(http_client, config.veteran_status_url.clone());
        let sessions = MokaSessionStore::new(config.session_idle_timeout, config.max_sessions);
        Self {
            config: Arc::new(config),
            strategy,
            veteran_status,
            sessions,
        }
    }
}

/// Builds the application router with its session and tracing layers.
pub fn router(state: AppState) -> Router {
    let idle = i64::try_from(state.config.session_idle_timeout.as_secs()).unwrap_or(i64::MAX);
    let session_layer = SessionManagerLayer::new(state.sessions.clone())
        .with_name(SESSION_COOKIE)
        .with_secure(state.config.redirect_uri.scheme() == "https")
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(idle)))
        .with_signed(session::cookie_key(&state.config.session_secret));

    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/auth", get(login))
        .route("/auth/cb", get(callback))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Example app listening on {}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// A `302 Found` redirect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn index() -> &'static str {
    "Hello World!"
}

async fn login(State(state): State<AppState>, session: Session) -> Response {
    let request = state.strategy.begin();
    match session::store_pending(&session, &request.pending).await {
        Ok(()) => found(request.url.as_str()),
        Err(e) => {
            error!(error = %e, "Failed to store pending authorization");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Response {
    let pending = match session::take_pending(&session).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "Failed to read pending authorization");
            None
        }
    };

    match state.strategy.complete(pending, params).await {
        Ok(principal) => {
            if let Err(e) = session::establish(&session, &principal).await {
                warn!(error = %e, "Failed to store principal in session");
            }
        }
        Err(e) => {
            warn!(strategy = state.strategy.name(), error = %e, "Authentication failed");
        }
    }
    found("/")
}

async fn status(State(state): State<AppState>, session: Session) -> Result<Response, StatusError> {
    let Some(principal) = session::load_principal(&session).await? else {
        return Ok(found("/auth"));
    };

    if principal.tokenset.is_expired() {
        info!("Access token expired, re-authenticating");
        session::clear_principal(&session).await?;
        return Ok(found("/auth"));
    }

    let veteran_status = state
        .veteran_status
        .fetch(&principal.tokenset.access_token)
        .await?;
    Ok(veteran_status.into_response())
}
