//! Configuration loader (C12): merges defaults, `orchestrator.json`, and
//! environment variables into a validated [`OrchestratorConfig`].

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;

use crate::domain::error::ConfigError;
use crate::domain::models::OrchestratorConfig;

/// Env var prefix for overrides, e.g. `ORCHESTRATOR_MAX_PARALLEL=8`.
const ENV_PREFIX: &str = "ORCHESTRATOR_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `<workspace>/orchestrator.json`, if present, merged over defaults
    /// and under environment-variable overrides, then validates it.
    pub fn load(workspace_root: &std::path::Path) -> Result<OrchestratorConfig, ConfigError> {
        let config_path = workspace_root.join("orchestrator.json");
        let config: OrchestratorConfig = Figment::new()
            .merge(Serialized::defaults(OrchestratorConfig::default()))
            .merge(Json::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::ExtractFailed(e.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<OrchestratorConfig, ConfigError> {
        let config: OrchestratorConfig = Figment::new()
            .merge(Serialized::defaults(OrchestratorConfig::default()))
            .merge(Json::file(path.as_ref()))
            .extract()
            .map_err(|e| ConfigError::ExtractFailed(e.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Fails before any side effect on an invalid configuration.
    pub fn validate(config: &OrchestratorConfig) -> Result<(), ConfigError> {
        if config.api_key_env_var.trim().is_empty() {
            return Err(ConfigError::EmptyApiKeyEnvVar);
        }
        if config.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout(config.timeout_seconds));
        }
        if config.max_parallel == 0 {
            return Err(ConfigError::InvalidMaxParallel(config.max_parallel));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        let config = OrchestratorConfig::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn empty_api_key_env_var_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.api_key_env_var = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyApiKeyEnvVar)));
    }

    #[test]
    fn zero_max_parallel_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.max_parallel = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxParallel(0))));
    }

    #[test]
    fn load_from_file_merges_json_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"apiKeyEnvVar": "MY_KEY", "maxParallel": 2}}"#).unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.api_key_env_var, "MY_KEY");
        assert_eq!(config.max_parallel, 2);
        assert_eq!(config.timeout_seconds, 300, "unset fields keep their default");
    }
}
