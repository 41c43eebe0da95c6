//! reqwest-based client for the fleet-management API.

use std::path::Path;

use log::{debug, error};
use reqwest::StatusCode;
use reqwest::multipart;
use secrecy::{ExposeSecret, SecretString};

use super::types::{DeviceListing, TokenResponse};
use crate::error::RestError;

/// Connection settings for the management API.
#[derive(Debug, Clone)]
pub struct FleetApiConfig {
    /// Base URL of the API (e.g. `https://fog-director.example:8443/api/v1/appmgr/`).
    pub base_url: String,

    /// Username for the credential exchange.
    pub username: String,

    /// Password for the credential exchange.
    pub password: SecretString,

    /// Whether to verify the server's TLS certificate. Lab deployments of
    /// the management appliance routinely run self-signed certificates.
    pub verify_tls: bool,
}

impl FleetApiConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            verify_tls: true,
        }
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }
}

/// Client for the device-inventory surface of the management API.
///
/// Each operation performs its own credential exchange and discards the
/// token afterwards; tokens are short-lived and never stored.
pub struct FleetApiClient {
    http: reqwest::Client,
    config: FleetApiConfig,
}

impl FleetApiClient {
    pub fn new(config: FleetApiConfig) -> Result<Self, RestError> {
        let mut builder = reqwest::Client::builder();
        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Exchange credentials for a short-lived token. The token service
    /// answers `202 Accepted` with a JSON token on success.
    async fn get_token(&self) -> Result<String, RestError> {
        let response = self
            .http
            .post(self.endpoint("tokenservice"))
            .basic_auth(
                &self.config.username,
                Some(self.config.password.expose_secret()),
            )
            .send()
            .await?;

        if response.status() != StatusCode::ACCEPTED {
            error!("token service answered {}", response.status());
            return Err(RestError::Status {
                operation: "get_token",
                status: response.status(),
            });
        }

        let body: TokenResponse = response.json().await?;
        if body.token.is_empty() {
            return Err(RestError::MissingToken);
        }
        Ok(body.token)
    }

    /// List a page of the device inventory.
    pub async fn get_devices(&self, limit: u32, offset: u32) -> Result<DeviceListing, RestError> {
        let token = self.get_token().await?;
        let response = self
            .http
            .get(self.endpoint(&format!("devices?limit={limit}&offset={offset}")))
            .header("x-token-id", token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestError::Status {
                operation: "get_devices",
                status: response.status(),
            });
        }
        Ok(response.json().await?)
    }

    /// Remove a device from the inventory.
    pub async fn delete_device(&self, device_id: &str) -> Result<(), RestError> {
        let token = self.get_token().await?;
        let response = self
            .http
            .delete(self.endpoint(&format!("devices/{device_id}")))
            .header("x-token-id", token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestError::Status {
                operation: "delete_device",
                status: response.status(),
            });
        }
        debug!("deleted device {device_id}");
        Ok(())
    }

    /// Bulk-import devices from a CSV file.
    pub async fn import_devices(&self, path: &Path) -> Result<(), RestError> {
        let token = self.get_token().await?;

        let bytes = tokio::fs::read(path).await.map_err(|source| RestError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "devices.csv".to_string());
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes).file_name(file_name),
        );

        let response = self
            .http
            .post(self.endpoint("devices/import"))
            .header("x-token-id", token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestError::Status {
                operation: "import_devices",
                status: response.status(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let client = FleetApiClient::new(FleetApiConfig::new(
            "https://director.example/api/v1/appmgr/",
            "admin",
            "admin",
        ))
        .unwrap();
        assert_eq!(
            client.endpoint("tokenservice"),
            "https://director.example/api/v1/appmgr/tokenservice"
        );
        assert_eq!(
            client.endpoint("devices?limit=10&offset=0"),
            "https://director.example/api/v1/appmgr/devices?limit=10&offset=0"
        );
    }

    #[test]
    fn test_password_not_debug_printed() {
        let config = FleetApiConfig::new("https://director.example/", "admin", "s3cret");
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
