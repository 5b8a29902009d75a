// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod issuer;
pub mod model;
pub mod server;
pub mod session;
pub mod strategy;
pub mod veteran;

/// The public prelude for the `lighthouse-oidc-sample` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::client::OidcClient;
    pub use crate::config::{Config, ConfigBuilder};
    pub use crate::error::{AuthError, StartupError, StatusError};
    pub use crate::issuer::MetadataSource;
    pub use crate::model::{IssuerMetadata, Principal, TokenSet};
    pub use crate::server::{router, AppState};
    pub use crate::strategy::{AuthStrategy, OidcStrategy};
}
