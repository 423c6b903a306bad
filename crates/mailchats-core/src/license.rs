//! Password / license key login

use anyhow::{anyhow, Result};
use mailchats_common::config::AuthConfig;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a license check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseResponse {
    pub success: bool,
    pub message: String,
}

impl LicenseResponse {
    fn accepted() -> Self {
        Self {
            success: true,
            message: "Authentication successful".into(),
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Checks passwords against the default password and the remote key list
pub struct LicenseVerifier {
    client: Client,
    default_password: String,
    license_url: String,
}

impl LicenseVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            default_password: config.default_password.trim().to_string(),
            license_url: config.license_url.clone(),
        }
    }

    async fn fetch_keys(&self) -> Result<Vec<String>> {
        let response = self.client.get(&self.license_url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "License list returned status {}",
                response.status()
            ));
        }

        let body = response.text().await?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Verify a password or license key
    pub async fn verify(&self, password: &str) -> LicenseResponse {
        let password = password.trim();
        if password.is_empty() {
            return LicenseResponse::rejected("Please enter a password");
        }

        if password == self.default_password {
            return LicenseResponse::accepted();
        }

        match self.fetch_keys().await {
            Ok(keys) if keys.iter().any(|k| k == password) => {
                debug!("License key accepted");
                LicenseResponse::accepted()
            }
            Ok(_) => LicenseResponse::rejected("Invalid license key"),
            Err(e) => {
                warn!("Could not verify against license list: {}", e);
                LicenseResponse::rejected("Invalid license key")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verifier(license_url: String) -> LicenseVerifier {
        LicenseVerifier::new(&AuthConfig {
            license_url,
            ..Default::default()
        })
    }

    async fn license_server(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/license.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_empty_password() {
        let v = verifier("http://127.0.0.1:9/license.txt".into());
        assert_eq!(
            v.verify("   ").await,
            LicenseResponse::rejected("Please enter a password")
        );
    }

    #[tokio::test]
    async fn test_default_password_without_network() {
        let v = verifier("http://127.0.0.1:9/license.txt".into());
        assert_eq!(
            v.verify("  code to my email ").await,
            LicenseResponse::accepted()
        );
        assert_eq!(
            v.verify("something else").await,
            LicenseResponse::rejected("Invalid license key")
        );
    }

    #[tokio::test]
    async fn test_license_list() {
        let server = license_server("KEY-ONE\n\n  KEY-TWO  \n").await;
        let v = verifier(format!("{}/license.txt", server.uri()));

        assert_eq!(v.verify("KEY-TWO").await, LicenseResponse::accepted());
        assert_eq!(
            v.verify("KEY-THREE").await,
            LicenseResponse::rejected("Invalid license key")
        );
    }
}
