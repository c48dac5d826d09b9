use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub engine: EngineConfig,
    pub hub: HubConfig,
    pub biometric: BiometricConfig,
    /// Base URL advertised in issuance action URIs.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Remote commitment/proof service. Disabled deployments fall back to the
/// in-process deterministic engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub endpoint: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    pub endpoint: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BiometricConfig {
    pub endpoint: String,
    pub enabled: bool,
}

impl IdentityConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(IdentityConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("identity_db"), is_prod)?,
            },
            engine: EngineConfig {
                endpoint: get_env("COMMITMENT_ENGINE_ENDPOINT", Some(""), is_prod)?,
                enabled: env::var("COMMITMENT_ENGINE_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            hub: HubConfig {
                endpoint: get_env("HUB_ENDPOINT", Some(""), is_prod)?,
                enabled: env::var("HUB_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            biometric: BiometricConfig {
                endpoint: get_env("BIOMETRIC_ENDPOINT", Some(""), is_prod)?,
                enabled: env::var("BIOMETRIC_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            public_base_url: get_env("PUBLIC_BASE_URL", Some("http://localhost:8080"), is_prod)?,
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
