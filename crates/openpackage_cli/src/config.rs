use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::workspace;

/// The CLI's own configuration file, `~/.openpackage/config.toml`.
///
/// All fields are optional: every one of them can also be supplied on the
/// command line or via environment variable, with the precedence CLI flag >
/// env var > config file > built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub profile: Option<String>,
    pub registry_url: Option<String>,
    pub api_timeout_ms: Option<u64>,
}

impl Config {
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(workspace::config_dir()?.join("config.toml"))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = fs_err::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
        toml::from_str(&raw).with_context(|| format!("invalid config file {path:?}"))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize config")?;
        openpackage_core::write_atomic_str(path, &raw)?;
        Ok(())
    }

    pub fn api_timeout(&self) -> std::time::Duration {
        let ms = std::env::var("OPENPACKAGEAPI_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(self.api_timeout_ms)
            .unwrap_or(30_000);
        std::time::Duration::from_millis(ms)
    }

    pub fn resolved_profile(&self, cli_flag: Option<&str>) -> String {
        cli_flag
            .map(str::to_string)
            .or_else(|| std::env::var("OPENPACKAGEPROFILE").ok())
            .or_else(|| self.profile.clone())
            .unwrap_or_else(|| "default".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            profile: Some("work".to_string()),
            registry_url: Some("https://registry.example.com".to_string()),
            api_timeout_ms: Some(5_000),
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn resolved_profile_prefers_cli_flag_over_config_file() {
        let config = Config { profile: Some("from-file".to_string()), ..Config::default() };
        assert_eq!(config.resolved_profile(Some("from-cli")), "from-cli");
    }
}
