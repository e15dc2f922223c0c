//! Client for the remote licensing authority.
//!
//! Wraps the authority's four form-POST operations (`activate_license`,
//! `deactivate_license`, `check_license`, `get_version`) behind a single
//! [`AuthorityClient`] with a fixed request timeout and mandatory TLS
//! verification.
//!
//! Transport failure (timeout, DNS, TLS) is a distinct outcome
//! ([`RemoteError::Transport`]) from an authoritative negative response,
//! which arrives as a parsed [`AuthorityResponse`] with `success == false`.
//! Callers branch on that distinction: a transport failure must never be
//! treated as either a valid or an invalid license.

mod response;

pub use response::{AuthorityCode, AuthorityResponse};

use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default outbound request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Failures talking to the remote authority.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced an authoritative answer (timeout, DNS,
    /// TLS, connection refused). Retryable; never mutates local state.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The authority answered but the payload could not be parsed.
    #[error("malformed authority response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Static configuration for the authority endpoint.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Base URL of the licensing endpoint.
    pub endpoint: String,
    /// Product item id at the authority.
    pub item_id: u32,
    /// Product item name at the authority.
    pub item_name: String,
}

/// HTTP client for the licensing authority. Stateless; safe to share and
/// call from any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct AuthorityClient {
    http: reqwest::Client,
    config: AuthorityConfig,
}

impl AuthorityClient {
    /// Builds a client with the default 15s timeout.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Transport`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: AuthorityConfig) -> RemoteResult<Self> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    /// Builds a client with a custom timeout (for tests).
    pub fn with_timeout(config: AuthorityConfig, timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Requests activation of `license` for `site_url`.
    pub async fn activate(
        &self,
        license: &str,
        site_url: &str,
        environment: &str,
    ) -> RemoteResult<AuthorityResponse> {
        self.license_action("activate_license", license, site_url, environment)
            .await
    }

    /// Releases the remote activation slot held by `site_url`.
    pub async fn deactivate(
        &self,
        license: &str,
        site_url: &str,
        environment: &str,
    ) -> RemoteResult<AuthorityResponse> {
        self.license_action("deactivate_license", license, site_url, environment)
            .await
    }

    /// Asks the authority for the current status of `license`.
    pub async fn check_status(
        &self,
        license: &str,
        site_url: &str,
        environment: &str,
    ) -> RemoteResult<AuthorityResponse> {
        self.license_action("check_license", license, site_url, environment)
            .await
    }

    /// Fetches update metadata for the product. Returns the raw payload;
    /// callers decide whether it announces a new version.
    pub async fn get_version(
        &self,
        license: &str,
        site_url: &str,
        installed_version: &str,
    ) -> RemoteResult<serde_json::Value> {
        let item_id = self.config.item_id.to_string();
        let form = [
            ("edd_action", "get_version"),
            ("license", license),
            ("item_id", &item_id),
            ("version", installed_version),
            ("url", site_url),
            ("beta", "false"),
        ];
        let body = self
            .http
            .post(&self.config.endpoint)
            .form(&form)
            .send()
            .await?
            .text()
            .await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    async fn license_action(
        &self,
        action: &str,
        license: &str,
        site_url: &str,
        environment: &str,
    ) -> RemoteResult<AuthorityResponse> {
        let item_id = self.config.item_id.to_string();
        let form = [
            ("edd_action", action),
            ("license", license),
            ("item_id", &item_id),
            ("item_name", &self.config.item_name),
            ("url", site_url),
            ("environment", environment),
        ];
        debug!(action, site_url, "calling licensing authority");
        let body = self
            .http
            .post(&self.config.endpoint)
            .form(&form)
            .send()
            .await?
            .text()
            .await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}
