// src/issuer.rs

use crate::error::DiscoveryError;
use crate::model::IssuerMetadata;
use std::path::PathBuf;
use tracing::{debug, info, instrument};
use url::Url;

/// Where the issuer's discovery document comes from.
///
/// Chosen once at startup by the `--local` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSource {
    /// A discovery document on disk, e.g. for a localhost OAuth proxy.
    Local(PathBuf),
    /// A remote `.well-known/openid-configuration` URL.
    Remote(Url),
}

impl MetadataSource {
    pub fn select(use_local: bool, local_path: PathBuf, discovery_url: Url) -> Self {
        if use_local {
            MetadataSource::Local(local_path)
        } else {
            MetadataSource::Remote(discovery_url)
        }
    }
}

/// Resolves the issuer metadata from the given source.
///
/// A local source is read synchronously and never touches the network. A
/// remote source is fetched with exactly one GET through `http_client`,
/// whose timeout bounds the call. Any failure is returned to the caller,
/// which treats it as fatal.
#[instrument(skip(http_client), err)]
pub async fn resolve(
    source: &MetadataSource,
    http_client: &reqwest::Client,
) -> Result<IssuerMetadata, DiscoveryError> {
    let metadata = match source {
        MetadataSource::Local(path) => {
            info!("Loading local metadata from {}", path.display());
            let raw = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str::<IssuerMetadata>(&raw)?
        }
        MetadataSource::Remote(url) => {
            info!("Loading remote metadata from {}", url);
            let response = http_client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DiscoveryError::UnexpectedStatus(status));
            }
            let body = response.bytes().await?;
            serde_json::from_slice::<IssuerMetadata>(&body)?
        }
    };

    debug!(
        issuer = %metadata.issuer,
        authorization_endpoint = %metadata.authorization_endpoint,
        token_endpoint = %metadata.token_endpoint,
        "Resolved issuer metadata"
    );
    Ok(metadata)
}
