//! Secret resolution for outbound integrations.
//!
//! Development reads secrets from environment variables; production reads them
//! from Azure Key Vault, authenticating with the host's managed identity.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::observability::TracedRequestExt;
use std::time::Duration;
use thiserror::Error;

const KEY_VAULT_API_VERSION: &str = "7.4";
const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";
const APP_SERVICE_IDENTITY_API_VERSION: &str = "2019-08-01";
const INSTANCE_METADATA_API_VERSION: &str = "2018-02-01";
const INSTANCE_METADATA_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret {0} is not set")]
    NotFound(String),

    #[error("Secret store request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<Secret<String>, SecretError>;
}

/// Reads `AZURE-AI-KEY` from `AZURE_AI_KEY`: dashes become underscores since
/// most shells reject them in variable names.
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn env_var_name(secret_name: &str) -> String {
        secret_name.replace('-', "_").to_uppercase()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> Result<Secret<String>, SecretError> {
        let var = Self::env_var_name(name);
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(Secret::new(value)),
            _ => Err(SecretError::NotFound(var)),
        }
    }
}

/// Where the host's managed identity hands out tokens.
pub enum ManagedIdentity {
    /// App Service and Functions: `IDENTITY_ENDPOINT` guarded by the
    /// per-instance `IDENTITY_HEADER`.
    AppService {
        endpoint: String,
        header: Secret<String>,
    },
    /// Azure instance metadata service on VMs.
    InstanceMetadata,
}

impl ManagedIdentity {
    /// App Service protocol when the platform provided both endpoint and
    /// header, instance metadata otherwise.
    pub fn from_parts(endpoint: Option<&str>, header: Option<&Secret<String>>) -> Self {
        match (endpoint, header) {
            (Some(endpoint), Some(header)) if !endpoint.is_empty() => {
                ManagedIdentity::AppService {
                    endpoint: endpoint.to_string(),
                    header: header.clone(),
                }
            }
            _ => ManagedIdentity::InstanceMetadata,
        }
    }
}

pub struct KeyVaultSecretStore {
    client: Client,
    vault_url: String,
    identity: ManagedIdentity,
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

impl KeyVaultSecretStore {
    pub fn new(vault_url: &str, identity: ManagedIdentity) -> Result<Self, SecretError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SecretError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            vault_url: vault_url.trim_end_matches('/').to_string(),
            identity,
        })
    }

    fn token_request(&self) -> Result<reqwest::Request, SecretError> {
        let builder = match &self.identity {
            ManagedIdentity::AppService { endpoint, header } => self
                .client
                .get(endpoint)
                .query(&[
                    ("api-version", APP_SERVICE_IDENTITY_API_VERSION),
                    ("resource", KEY_VAULT_RESOURCE),
                ])
                .header("X-IDENTITY-HEADER", header.expose_secret()),
            ManagedIdentity::InstanceMetadata => self
                .client
                .get(INSTANCE_METADATA_ENDPOINT)
                .query(&[
                    ("api-version", INSTANCE_METADATA_API_VERSION),
                    ("resource", KEY_VAULT_RESOURCE),
                ])
                .header("Metadata", "true"),
        };

        builder
            .build()
            .map_err(|e| SecretError::Request(format!("Invalid token request: {}", e)))
    }

    async fn access_token(&self) -> Result<String, SecretError> {
        let response = self
            .client
            .execute(self.token_request()?)
            .await
            .map_err(|e| SecretError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| SecretError::Request(e.to_string()))?;

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| SecretError::Request(format!("Invalid token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get_secret(&self, name: &str) -> Result<Secret<String>, SecretError> {
        let token = self.access_token().await?;
        let url = format!("{}/secrets/{}", self.vault_url, name);

        tracing::debug!(secret = %name, "Fetching secret from Key Vault");

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .bearer_auth(token)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| SecretError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(name.to_string()));
        }

        let bundle: SecretBundle = response
            .error_for_status()
            .map_err(|e| SecretError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| SecretError::Request(format!("Invalid secret response: {}", e)))?;

        Ok(Secret::new(bundle.value))
    }
}
