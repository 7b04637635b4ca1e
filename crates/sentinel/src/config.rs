//! Service configuration

use anyhow::Result;
use sentinel_lib::ArtifactPaths;
use serde::Deserialize;

/// Service configuration, read from `SENTINEL_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listen port for prediction/health/metrics
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Directory holding the trained model artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
}

fn default_listen_port() -> u16 {
    8000
}

fn default_model_dir() -> String {
    std::env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string())
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SENTINEL"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| ServiceConfig {
            listen_port: default_listen_port(),
            model_dir: default_model_dir(),
        }))
    }

    /// Resolve the standard artifact locations under the model directory
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.model_dir)
    }
}
