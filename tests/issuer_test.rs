use lighthouse_oidc_sample::client::http_client;
use lighthouse_oidc_sample::config::{Config, ConfigBuilder, DEFAULT_HTTP_TIMEOUT};
use lighthouse_oidc_sample::error::{DiscoveryError, StartupError};
use lighthouse_oidc_sample::issuer::{resolve, MetadataSource};
use lighthouse_oidc_sample::server::AppState;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WELL_KNOWN: &str = "/oauth2/.well-known/openid-configuration";
const SESSION_SECRET: &str = "issuer-test-session-secret-0123456789abcdef";

fn discovery_document(base: &str) -> serde_json::Value {
    json!({
        "issuer": format!("{base}/oauth2"),
        "authorization_endpoint": format!("{base}/oauth2/authorization"),
        "token_endpoint": format!("{base}/oauth2/token"),
        "userinfo_endpoint": format!("{base}/oauth2/userinfo"),
        "jwks_uri": format!("{base}/oauth2/keys"),
        "response_types_supported": ["code"],
        "subject_types_supported": ["public"]
    })
}

#[test]
fn flag_selects_source() {
    let local = PathBuf::from("local-metadata.json");
    let remote =
        Url::parse("https://dev-api.va.gov/oauth2/.well-known/openid-configuration").unwrap();

    assert_eq!(
        MetadataSource::select(true, local.clone(), remote.clone()),
        MetadataSource::Local(local.clone())
    );
    assert_eq!(
        MetadataSource::select(false, local, remote.clone()),
        MetadataSource::Remote(remote)
    );
}

#[tokio::test]
async fn local_metadata_never_touches_the_network() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("local-metadata.json");
    std::fs::write(
        &metadata_path,
        discovery_document("http://localhost:7100").to_string(),
    )
    .unwrap();

    let client = http_client(Duration::from_millis(2500)).unwrap();
    let metadata = resolve(&MetadataSource::Local(metadata_path), &client)
        .await
        .expect("local metadata should load");

    assert_eq!(metadata.issuer, "http://localhost:7100/oauth2");
    assert_eq!(
        metadata.token_endpoint.as_str(),
        "http://localhost:7100/oauth2/token"
    );
    assert_eq!(metadata.other["subject_types_supported"], json!(["public"]));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn remote_metadata_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}{}", server.uri(), WELL_KNOWN)).unwrap();
    let client = http_client(Duration::from_millis(2500)).unwrap();
    let metadata = resolve(&MetadataSource::Remote(url), &client)
        .await
        .expect("remote metadata should load");

    assert_eq!(
        metadata.authorization_endpoint.as_str(),
        format!("{}/oauth2/authorization", server.uri())
    );
}

#[tokio::test]
async fn slow_discovery_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(discovery_document(&server.uri()))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}{}", server.uri(), WELL_KNOWN)).unwrap();
    let client = http_client(Duration::from_millis(200)).unwrap();
    let err = resolve(&MetadataSource::Remote(url), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn discovery_error_status_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}{}", server.uri(), WELL_KNOWN)).unwrap();
    let client = http_client(Duration::from_millis(2500)).unwrap();
    let err = resolve(&MetadataSource::Remote(url), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::UnexpectedStatus(status) if status.as_u16() == 503));
}

#[tokio::test]
async fn document_without_token_endpoint_is_malformed() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("local-metadata.json");
    std::fs::write(
        &metadata_path,
        json!({
            "issuer": "http://localhost:7100/oauth2",
            "authorization_endpoint": "http://localhost:7100/oauth2/authorization"
        })
        .to_string(),
    )
    .unwrap();

    let client = http_client(Duration::from_millis(2500)).unwrap();
    let err = resolve(&MetadataSource::Local(metadata_path), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::MalformedDocument(_)));
}

#[tokio::test]
async fn missing_local_file_is_fatal() {
    let dir = tempdir().unwrap();
    let client = http_client(Duration::from_millis(2500)).unwrap();
    let err = resolve(
        &MetadataSource::Local(dir.path().join("does-not-exist.json")),
        &client,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DiscoveryError::Read { .. }));
}

/// A configuration with nothing but the required fields and the discovery
/// URL, so the startup path runs with the default timeout.
fn startup_config(server: &MockServer) -> Config {
    ConfigBuilder::new()
        .client_id("test-client")
        .client_secret("test-secret")
        .session_secret(SESSION_SECRET)
        .discovery_url(format!("{}{}", server.uri(), WELL_KNOWN))
        .build()
        .unwrap()
}

#[tokio::test]
async fn remote_startup_fetches_discovery_document_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    let config = startup_config(&server);
    assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
    let source = MetadataSource::select(
        false,
        PathBuf::from("local-metadata.json"),
        config.discovery_url.clone(),
    );

    let state = AppState::initialize(config, source)
        .await
        .expect("startup should succeed");
    assert_eq!(state.config.http_timeout, Duration::from_millis(2500));
    server.verify().await;
}

#[tokio::test]
async fn local_startup_makes_no_discovery_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(&server.uri())))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("local-metadata.json");
    std::fs::write(
        &metadata_path,
        discovery_document("http://localhost:7100").to_string(),
    )
    .unwrap();

    let config = startup_config(&server);
    let source = MetadataSource::select(true, metadata_path, config.discovery_url.clone());

    AppState::initialize(config, source)
        .await
        .expect("startup should succeed");
    server.verify().await;
}

#[tokio::test]
async fn slow_discovery_aborts_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(discovery_document(&server.uri()))
                .set_delay(Duration::from_secs(4)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = startup_config(&server);
    let source = MetadataSource::Remote(config.discovery_url.clone());

    let err = AppState::initialize(config, source)
        .await
        .err()
        .expect("startup should fail");
    assert!(
        matches!(err, StartupError::Discovery(DiscoveryError::Timeout)),
        "got {err:?}"
    );
}
