// src/veteran.rs

use crate::error::StatusError;
use axum::http::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// JSON pointer to the value returned to the browser.
const VETERAN_STATUS_POINTER: &str = "/data/attributes/veteran_status";

/// Client for the downstream veteran verification status endpoint.
#[derive(Clone)]
pub struct VeteranStatusClient {
    http_client: reqwest::Client,
    endpoint: Url,
}

impl VeteranStatusClient {
    pub fn new(http_client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Looks up the veteran status with the user's access token.
    ///
    /// Issues exactly one GET; the shared HTTP client's timeout bounds it.
    #[instrument(skip(self, access_token), fields(endpoint = %self.endpoint), err)]
    pub async fn fetch(&self, access_token: &str) -> Result<String, StatusError> {
        let response = self
            .http_client
            .get(self.endpoint.clone())
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(StatusError::Unauthorized(status))
            }
            _ => return Err(StatusError::UnexpectedStatus(status)),
        }

        let body = response.bytes().await?;
        let veteran_status = extract_veteran_status(&body)?;
        debug!(veteran_status = %veteran_status, "Veteran status retrieved");
        Ok(veteran_status)
    }
}

/// Pulls `data.attributes.veteran_status` out of a response body.
///
/// Strings are returned as their raw text; any other non-null JSON value as
/// its JSON rendering.
pub fn extract_veteran_status(body: &[u8]) -> Result<String, StatusError> {
    let parsed: Value = serde_json::from_slice(body)?;
    match parsed.pointer(VETERAN_STATUS_POINTER) {
        Some(Value::String(status)) => Ok(status.clone()),
        Some(Value::Null) | None => Err(StatusError::MissingField),
        Some(other) => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_string() {
        let body = br#"{"data":{"id":"1","attributes":{"veteran_status":"confirmed"}}}"#;
        assert_eq!(extract_veteran_status(body).unwrap(), "confirmed");
    }

    #[test]
    fn missing_field_is_an_error() {
        let body = br#"{"data":{"attributes":{}}}"#;
        assert!(matches!(
            extract_veteran_status(body),
            Err(StatusError::MissingField)
        ));
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(matches!(
            extract_veteran_status(b"<html>oops</html>"),
            Err(StatusError::MalformedBody(_))
        ));
    }
}
