// src/main.rs

use clap::Parser;
use lighthouse_oidc_sample::cli::Cli;
use lighthouse_oidc_sample::config::ConfigBuilder;
use lighthouse_oidc_sample::error::StartupError;
use lighthouse_oidc_sample::server::{self, AppState};
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Config → metadata → client → listen, strictly in that order.
async fn run(cli: Cli) -> Result<(), StartupError> {
    let mut builder = ConfigBuilder::from_file(&cli.config)?;
    if let Some(secret) = cli.session_secret.clone() {
        builder = builder.session_secret(secret);
    }
    let config = builder.build()?;

    let source = cli.metadata_source(&config);
    let addr = config.listen_addr;
    let state = AppState::initialize(config, source).await?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    server::serve(listener, state)
        .await
        .map_err(StartupError::Serve)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lighthouse_oidc_sample=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
