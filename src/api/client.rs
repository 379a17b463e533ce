//! Authenticated HTTP client for the Relay REST API
//!
//! Wraps reqwest::Client with the `user-id` header the service expects on
//! every request. Request failures map to [`TransportError`].

use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::error::TransportError;

/// Per-request timeout; matches the service's own client default.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client bound to a server base URL and the local user identity.
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl RelayClient {
    /// Load config (generating a user id on first run) and build the client.
    pub fn new() -> Result<Self> {
        let mut config = Config::load()?;
        let user_id = config.ensure_user_id()?;
        let base_url = config.server_url();

        Ok(Self::with_identity(base_url, user_id))
    }

    /// Build a client for an explicit server URL and user id.
    pub fn with_identity(base_url: String, user_id: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
        }
    }

    /// The opaque local user identifier sent with every request.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Server base URL (no trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET request against the Relay API.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Relay GET {}", url);

        let resp = self
            .http
            .get(&url)
            .header("user-id", &self.user_id)
            .send()
            .await?;

        check_response(resp, &url).await
    }

    /// POST request against the Relay API.
    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Relay POST {}", url);

        let resp = self
            .http
            .post(&url)
            .header("user-id", &self.user_id)
            .json(body)
            .send()
            .await?;

        check_response(resp, &url).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(
    resp: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
