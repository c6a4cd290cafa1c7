//! OPNsense management API client
//!
//! Only the single operation the watchdog needs: ask the appliance to
//! reboot itself. Authentication is HTTP basic auth with the API key as user
//! and the API secret as password.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ApplianceConfig;

/// Reboot endpoint, relative to the API base address
pub const REBOOT_PATH: &str = "api/core/system/reboot";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RebootError {
    #[error("invalid appliance address {url}: {reason}")]
    InvalidAddress { url: String, reason: String },

    #[error("reboot request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("appliance answered {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("appliance reported reboot status {0:?}")]
    UnexpectedStatus(String),
}

/// Remote "reboot now" action, opaque and fallible
#[async_trait]
pub trait Rebooter: Send + Sync {
    async fn reboot(&self) -> Result<(), RebootError>;
}

#[derive(Debug, Deserialize)]
struct RebootResponse {
    status: Option<String>,
}

/// HTTP client for the appliance's management API
pub struct ApplianceClient {
    http: reqwest::Client,
    reboot_url: Url,
    api_key: String,
    api_secret: String,
}

impl ApplianceClient {
    pub fn new(config: &ApplianceConfig) -> Result<Self, RebootError> {
        let reboot_url = join_api_path(&config.api_url, REBOOT_PATH)?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.allow_insecure)
            .build()?;

        if config.allow_insecure {
            debug!("TLS certificate verification disabled for appliance API");
        }

        Ok(Self {
            http,
            reboot_url,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    pub fn reboot_url(&self) -> &Url {
        &self.reboot_url
    }
}

#[async_trait]
impl Rebooter for ApplianceClient {
    async fn reboot(&self) -> Result<(), RebootError> {
        info!(url = %self.reboot_url, "Sending reboot command to appliance");

        let response = self
            .http
            .post(self.reboot_url.clone())
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RebootError::Rejected {
                status,
                body: excerpt(&body),
            });
        }

        // An empty or non-JSON body still means the appliance accepted the request.
        match serde_json::from_str::<RebootResponse>(&body) {
            Ok(RebootResponse { status: Some(s) }) if !s.eq_ignore_ascii_case("ok") => {
                Err(RebootError::UnexpectedStatus(s))
            }
            _ => Ok(()),
        }
    }
}

/// Append `path` to the base URL, keeping any prefix already on it
fn join_api_path(base: &Url, path: &str) -> Result<Url, RebootError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    base.join(path).map_err(|e| RebootError::InvalidAddress {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> ApplianceConfig {
        ApplianceConfig {
            api_url: Url::parse(url).unwrap(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            allow_insecure: false,
        }
    }

    #[test]
    fn test_reboot_url_from_bare_host() {
        let client = ApplianceClient::new(&config("https://fw.lan")).unwrap();
        assert_eq!(
            client.reboot_url().as_str(),
            "https://fw.lan/api/core/system/reboot"
        );
    }

    #[test]
    fn test_reboot_url_keeps_path_prefix() {
        let client = ApplianceClient::new(&config("https://fw.lan:8443/opnsense")).unwrap();
        assert_eq!(
            client.reboot_url().as_str(),
            "https://fw.lan:8443/opnsense/api/core/system/reboot"
        );
    }

    #[test]
    fn test_insecure_client_builds() {
        let mut cfg = config("https://192.168.1.1/");
        cfg.allow_insecure = true;
        assert!(ApplianceClient::new(&cfg).is_ok());
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let body = "x".repeat(500);
        let short = excerpt(&body);
        assert!(short.ends_with('…'));
        assert_eq!(short.chars().count(), 201);
        assert_eq!(excerpt("  denied \n"), "denied");
    }

    #[tokio::test]
    async fn test_unreachable_appliance_is_transport_error() {
        let client = ApplianceClient::new(&config("http://127.0.0.1:1")).unwrap();
        let result = client.reboot().await;
        assert!(matches!(result, Err(RebootError::Transport(_))));
    }
}
