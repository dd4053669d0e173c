use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct DesignConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb: Option<MongoConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// Development reads the API key from the environment; anything else
    /// reads it from Key Vault.
    pub development: bool,
    pub secret_name: String,
    pub key_vault_url: Option<String>,
    /// Set by App Service and Functions hosts; absent on VMs.
    pub identity_endpoint: Option<String>,
    pub identity_header: Option<Secret<String>>,
    /// Azure OpenAI resource endpoint. The mock provider is used when unset.
    pub endpoint: Option<String>,
    pub deployment: String,
    pub api_version: String,
    pub default_max_tokens: u32,
}

impl DesignConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: StoreBackend = get_env("STORE_BACKEND", Some("mongo"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        if is_prod && backend == StoreBackend::Memory {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORE_BACKEND=memory is not allowed in production"
            )));
        }

        let mongodb = match backend {
            StoreBackend::Mongo => Some(MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("design_db"), is_prod)?,
            }),
            StoreBackend::Memory => None,
        };

        let development = env::var("AZURE_FUNCTIONS_ENVIRONMENT")
            .map(|v| v == "Development")
            .unwrap_or(!is_prod);

        Ok(DesignConfig {
            common: common_config,
            store: StoreConfig { backend, mongodb },
            completion: CompletionConfig {
                development,
                secret_name: get_env("COMPLETION_SECRET_NAME", Some("AZURE-AI-KEY"), false)?,
                key_vault_url: env::var("KEY_VAULT_URL").ok(),
                identity_endpoint: env::var("IDENTITY_ENDPOINT").ok(),
                identity_header: env::var("IDENTITY_HEADER").ok().map(Secret::new),
                endpoint: env::var("AZURE_OPENAI_ENDPOINT").ok(),
                deployment: get_env("AZURE_OPENAI_DEPLOYMENT", Some("text-davinci-003"), false)?,
                api_version: get_env("AZURE_OPENAI_API_VERSION", Some("2024-02-01"), false)?,
                default_max_tokens: get_env("COMPLETION_MAX_TOKENS", Some("100"), false)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!(
                            "Invalid COMPLETION_MAX_TOKENS: {}",
                            e
                        ))
                    })?,
            },
        })
    }

    /// Settings for in-process use: memory store, mock completions, random port.
    pub fn for_tests() -> Self {
        DesignConfig {
            common: core_config::Config {
                port: 0,
                log_level: "error".to_string(),
                otlp_endpoint: None,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                mongodb: None,
            },
            completion: CompletionConfig {
                development: true,
                secret_name: "AZURE-AI-KEY".to_string(),
                key_vault_url: None,
                identity_endpoint: None,
                identity_header: None,
                endpoint: None,
                deployment: "text-davinci-003".to_string(),
                api_version: "2024-02-01".to_string(),
                default_max_tokens: 100,
            },
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("mongo".parse::<StoreBackend>(), Ok(StoreBackend::Mongo));
        assert_eq!("MongoDB".parse::<StoreBackend>(), Ok(StoreBackend::Mongo));
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("cosmos".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_for_tests_uses_memory_store() {
        let config = DesignConfig::for_tests();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.completion.endpoint.is_none());
    }
}
