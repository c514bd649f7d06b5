//! Configuration management for onelm.
//!
//! Configuration is loaded from `~/.config/onelm/config.toml`. Every key is
//! optional; a missing file means defaults, but an API key must still be
//! resolvable (from the file or the provider's environment variable) before
//! any stage runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::commands::SafetyMode;

/// Errors raised while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown provider '{0}' (run `onelm providers` to list supported providers)")]
    UnknownProvider(String),
    #[error("api_key not set for provider '{provider}'. Set {env_var} or add api_key to {path}")]
    MissingApiKey {
        provider: String,
        env_var: String,
        path: String,
    },
}

/// An LLM provider known to onelm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provider {
    /// The provider name as written in config (e.g. "anthropic").
    pub name: &'static str,
    /// Model used when config does not name one.
    pub default_model: &'static str,
    /// Environment variable consulted when config has no key.
    pub api_key_env: &'static str,
    /// Whether an API key is required.
    pub requires_api_key: bool,
}

const PROVIDERS: &[Provider] = &[
    Provider {
        name: "anthropic",
        default_model: "claude-sonnet-4-5-20250929",
        api_key_env: "ANTHROPIC_API_KEY",
        requires_api_key: true,
    },
    Provider {
        name: "openai",
        default_model: "gpt-4o-mini",
        api_key_env: "OPENAI_API_KEY",
        requires_api_key: true,
    },
];

/// All supported providers, default first.
pub fn supported_providers() -> &'static [Provider] {
    PROVIDERS
}

/// Look up a provider by name.
pub fn get_provider(name: &str) -> Option<Provider> {
    PROVIDERS.iter().copied().find(|p| p.name == name)
}

/// Model and key kept for one provider under `[providers.<name>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Main configuration structure, as stored on disk.
///
/// The top-level `model` and `api_key` belong to the top-level `provider`
/// only. Settings for other providers live in the `providers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The LLM provider (see [`supported_providers`]).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier; empty means the provider's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// API key (prefer the provider's environment variable).
    #[serde(
        default,
        alias = "anthropic_api_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<String>,
    /// Default output mode when `--output` is not given.
    #[serde(default = "default_output")]
    pub output: String,
    /// Where the safety pass runs.
    #[serde(default)]
    pub safety: SafetyMode,
    /// Per-provider settings, keyed by provider name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            output: default_output(),
            safety: SafetyMode::default(),
            providers: BTreeMap::new(),
        }
    }
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_output() -> String {
    "clipboard".to_string()
}

/// Settings after provider lookup and key resolution; everything the
/// pipeline needs to build a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("onelm"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the standard location, using defaults if not found.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, using defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to the standard location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(write_err)
    }

    /// Switch to provider `name`.
    ///
    /// The top-level model and key stay with the previous provider: they are
    /// moved into its `providers` entry (unless that entry already has its
    /// own) and cleared, so they are never sent to `name`.
    pub fn select_provider(&mut self, name: &str) {
        if self.provider == name {
            return;
        }
        let model = self.model.take();
        let api_key = self.api_key.take();
        if model.is_some() || api_key.is_some() {
            let previous = self.providers.entry(self.provider.clone()).or_default();
            if previous.model.is_none() {
                previous.model = model;
            }
            if previous.api_key.is_none() {
                previous.api_key = api_key;
            }
        }
        self.provider = name.to_string();
    }

    /// Resolve provider, model and API key, reading the provider's
    /// environment variable when the file carries no key.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Like [`Config::resolve`] with an injectable environment lookup.
    pub fn resolve_with<F>(&self, env: F) -> Result<ResolvedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = get_provider(&self.provider)
            .ok_or_else(|| ConfigError::UnknownProvider(self.provider.clone()))?;

        let stored = self.providers.get(provider.name);
        let non_empty = |value: Option<&String>| {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let model = non_empty(self.model.as_ref())
            .or_else(|| non_empty(stored.and_then(|s| s.model.as_ref())))
            .unwrap_or_else(|| provider.default_model.to_string());

        let api_key = non_empty(self.api_key.as_ref())
            .or_else(|| non_empty(stored.and_then(|s| s.api_key.as_ref())))
            .or_else(|| non_empty(env(provider.api_key_env).as_ref()));

        let api_key = match api_key {
            Some(key) => key,
            None if !provider.requires_api_key => String::new(),
            None => {
                let path = Self::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "~/.config/onelm/config.toml".to_string());
                return Err(ConfigError::MissingApiKey {
                    provider: provider.name.to_string(),
                    env_var: provider.api_key_env.to_string(),
                    path,
                });
            }
        };

        Ok(ResolvedConfig {
            provider,
            model,
            api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider, "anthropic");
        assert!(config.model.is_none());
        assert!(config.api_key.is_none());
        assert_eq!(config.output, "clipboard");
        assert_eq!(config.safety, SafetyMode::Background);
    }

    #[test]
    fn test_get_provider() {
        assert_eq!(get_provider("anthropic").map(|p| p.name), Some("anthropic"));
        assert_eq!(get_provider("openai").map(|p| p.name), Some("openai"));
        assert!(get_provider("unknown").is_none());
        assert!(get_provider("").is_none());
    }

    #[test]
    fn test_supported_providers_require_keys() {
        let providers = supported_providers();
        assert_eq!(providers[0].name, "anthropic");
        for p in providers {
            assert!(!p.default_model.is_empty());
            assert!(p.requires_api_key);
        }
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
provider = "openai"
model = "gpt-4o"
api_key = "sk-test"
output = "stdout"
safety = "inline"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.output, "stdout");
        assert_eq!(config.safety, SafetyMode::Inline);
    }

    #[test]
    fn test_legacy_key_alias() {
        let config: Config = toml::from_str(r#"anthropic_api_key = "sk-ant""#).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(config.provider, "anthropic");
    }

    #[test]
    fn test_resolve_uses_provider_default_model() {
        let config = Config {
            api_key: Some("sk-test".into()),
            ..Config::default()
        };
        let resolved = config.resolve_with(no_env).unwrap();
        assert_eq!(resolved.model, "claude-sonnet-4-5-20250929");
        assert_eq!(resolved.api_key, "sk-test");
    }

    #[test]
    fn test_resolve_falls_back_to_env() {
        let config = Config {
            provider: "openai".into(),
            model: Some("  ".into()),
            ..Config::default()
        };
        let resolved = config
            .resolve_with(|var| (var == "OPENAI_API_KEY").then(|| "sk-env".to_string()))
            .unwrap();
        assert_eq!(resolved.provider.name, "openai");
        assert_eq!(resolved.model, "gpt-4o-mini");
        assert_eq!(resolved.api_key, "sk-env");
    }

    #[test]
    fn test_switching_provider_leaves_stored_key_and_model_behind() {
        let mut config: Config = toml::from_str(
            r#"
anthropic_api_key = "sk-ant"
model = "claude-haiku-4-5"
"#,
        )
        .unwrap();
        config.select_provider("openai");

        let resolved = config
            .resolve_with(|var| (var == "OPENAI_API_KEY").then(|| "sk-openai".to_string()))
            .unwrap();
        assert_eq!(resolved.provider.name, "openai");
        assert_eq!(resolved.model, "gpt-4o-mini");
        assert_eq!(resolved.api_key, "sk-openai");

        let anthropic = &config.providers["anthropic"];
        assert_eq!(anthropic.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(anthropic.model.as_deref(), Some("claude-haiku-4-5"));
    }

    #[test]
    fn test_switching_provider_without_any_key_is_error() {
        let mut config = Config {
            api_key: Some("sk-ant".into()),
            ..Config::default()
        };
        config.select_provider("openai");
        assert!(matches!(
            config.resolve_with(no_env),
            Err(ConfigError::MissingApiKey { provider, .. }) if provider == "openai"
        ));
    }

    #[test]
    fn test_provider_table_supplies_model_and_key() {
        let mut config: Config = toml::from_str(
            r#"
api_key = "sk-ant"

[providers.openai]
model = "gpt-4o"
api_key = "sk-table"
"#,
        )
        .unwrap();
        config.select_provider("openai");

        let resolved = config.resolve_with(no_env).unwrap();
        assert_eq!(resolved.model, "gpt-4o");
        assert_eq!(resolved.api_key, "sk-table");
    }

    #[test]
    fn test_selecting_current_provider_keeps_settings() {
        let mut config = Config {
            model: Some("claude-haiku-4-5".into()),
            api_key: Some("sk-ant".into()),
            ..Config::default()
        };
        config.select_provider("anthropic");

        let resolved = config.resolve_with(no_env).unwrap();
        assert_eq!(resolved.model, "claude-haiku-4-5");
        assert_eq!(resolved.api_key, "sk-ant");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_resolve_missing_key_is_error() {
        let config = Config {
            api_key: Some("".into()),
            ..Config::default()
        };
        let err = config.resolve_with(no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let config = Config {
            provider: "bard".into(),
            api_key: Some("k".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.resolve_with(no_env),
            Err(ConfigError::UnknownProvider(p)) if p == "bard"
        ));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.provider, "anthropic");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            model: Some("claude-haiku-4-5".into()),
            safety: SafetyMode::Off,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.model.as_deref(), Some("claude-haiku-4-5"));
        assert_eq!(loaded.safety, SafetyMode::Off);
    }

    #[test]
    fn test_load_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
