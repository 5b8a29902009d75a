// src/cli.rs

use crate::config::Config;
use crate::issuer::MetadataSource;
use clap::Parser;
use std::path::PathBuf;

/// A sample application for testing the Lighthouse OAuth flow
#[derive(Parser, Debug, Clone)]
#[command(name = "lighthouse-oidc-sample")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Use the OpenID configuration of the localhost OAuth proxy instead of
    /// the dev environment proxy
    #[arg(long, default_value_t = false)]
    pub local: bool,

    /// Path to the client configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Path to the discovery document read when --local is set
    #[arg(long, default_value = "local-metadata.json")]
    pub metadata: PathBuf,

    /// Secret used to sign the session cookie; overrides the config file
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,
}

impl Cli {
    /// The metadata source selected by `--local`.
    pub fn metadata_source(&self, config: &Config) -> MetadataSource {
        MetadataSource::select(self.local, self.metadata.clone(), config.discovery_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_remote_metadata() {
        let cli = Cli::try_parse_from(["lighthouse-oidc-sample"]).unwrap();
        assert!(!cli.local);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.metadata, PathBuf::from("local-metadata.json"));
    }

    #[test]
    fn local_flag_is_boolean() {
        let cli = Cli::try_parse_from(["lighthouse-oidc-sample", "--local"]).unwrap();
        assert!(cli.local);
    }
}
