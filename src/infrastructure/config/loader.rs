//! Layered configuration loading (§4.0 [NEW]).
//!
//! Directly adapted from the `ConfigLoader::load`
//! (`infrastructure/config/loader.rs`): same figment precedence chain
//! (defaults → project YAML → local YAML overrides → prefixed env vars),
//! generalized from `.abathur/` to `.delegate/` and from a swarm-limits
//! `Config` to the delegation engine's `Config` (§4.0).

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid session timeout: must be greater than 0 minutes")]
    InvalidSessionTimeout,

    #[error("validation.max_retries must be at least 1")]
    InvalidMaxRetries,

    #[error("mcp server '{0}' is configured with an empty name")]
    EmptyServerName(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults.
    /// 2. `.delegate/config.yaml` (project config).
    /// 3. `.delegate/local.yaml` (optional local overrides).
    /// 4. `DELEGATE_`-prefixed environment variables.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".delegate/config.yaml"))
            .merge(Yaml::file(".delegate/local.yaml"))
            .merge(Env::prefixed("DELEGATE_").split("__"))
            .extract()
            .context("failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Write `config` to `path`, merging with whatever the file already
    /// contains so unknown top-level keys survive the round-trip (P7,
    /// scenario 6). The component-managed fields in `config` win; anything
    /// else in the existing file is preserved verbatim.
    pub fn save(config: &Config, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let existing: serde_yaml::Value = if path.exists() {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str(&text).unwrap_or(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()))
        } else {
            serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
        };

        let managed = serde_yaml::to_value(config).context("serializing config")?;
        let merged = merge_yaml(existing, managed);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, serde_yaml::to_string(&merged)?).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.session_timeout_minutes == 0 {
            return Err(ConfigError::InvalidSessionTimeout);
        }
        if config.validation.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries);
        }
        for server in &config.mcp_servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::EmptyServerName(server.name.clone()));
            }
        }
        Ok(())
    }
}

/// Recursively merges `update` into `base`, with `update`'s values winning
/// on key collision but `base`'s unmatched keys preserved (P7).
fn merge_yaml(base: serde_yaml::Value, update: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;
    match (base, update) {
        (Value::Mapping(mut base_map), Value::Mapping(update_map)) => {
            for (key, value) in update_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, update) => update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("default config should validate");
    }

    #[test]
    fn zero_session_timeout_is_rejected() {
        let mut config = Config::default();
        config.session_timeout_minutes = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidSessionTimeout)));
    }

    #[test]
    fn save_preserves_unknown_keys_and_updates_known_ones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "mcpServers: []\ncustomUserKey: keep-me\ndelegation:\n  trace_enabled: true\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.session_timeout_minutes = 45;
        ConfigLoader::save(&config, &path).unwrap();

        let saved: serde_yaml::Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.get("customUserKey").and_then(|v| v.as_str()), Some("keep-me"));
        assert_eq!(
            saved.get("delegation").and_then(|d| d.get("trace_enabled")).and_then(|v| v.as_bool()),
            Some(true)
        );
        assert_eq!(saved.get("sessionTimeout").and_then(|v| v.as_u64()), Some(45));
    }
}
