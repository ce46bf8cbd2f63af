//! Config file parsing for `~/.config/tripleport/config.toml`.
//!
//! Use `limits_from_config` to build store limits from the loaded config so
//! the security settings apply to every load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::notation::Notation;
use crate::store::StoreLimits;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_notation")]
    pub notation: Notation,
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
}

fn default_notation() -> Notation {
    Notation::NTriples
}
fn default_base_uri() -> String {
    "http://example.org/".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            notation: default_notation(),
            base_uri: default_base_uri(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_show_labels")]
    pub show_labels: bool,
    pub bar_template: Option<String>,
}

fn default_show_labels() -> bool {
    true
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            show_labels: true,
            bar_template: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_input_size_mb: Option<u64>,
    pub max_compression_ratio: Option<u64>,
}

/// Load config from the default path. A missing or invalid file yields defaults.
pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };
    match load_config_from(&path) {
        Ok(cfg) => cfg,
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            AppConfig::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

pub fn save_config_to(cfg: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("tripleport");
        p.push("config.toml");
        p
    })
}

/// Build store limits from config. Uses defaults for any unset values.
pub fn limits_from_config(c: &SecurityConfig) -> StoreLimits {
    let mut limits = StoreLimits::default();
    if let Some(mb) = c.max_input_size_mb {
        limits.max_input_size_bytes = mb.saturating_mul(1024).saturating_mul(1024);
    }
    if let Some(r) = c.max_compression_ratio {
        limits.max_compression_ratio = r;
    }
    limits
}

/// Set a dot-separated key such as `defaults.notation`.
pub fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["defaults", sub] => match *sub {
            "notation" => cfg.defaults.notation = Notation::parse(value).ok_or_else(invalid)?,
            "base_uri" => cfg.defaults.base_uri = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        },
        ["progress", sub] => match *sub {
            "show_labels" => cfg.progress.show_labels = value.parse().map_err(|_| invalid())?,
            "bar_template" => cfg.progress.bar_template = Some(value.to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        },
        ["security", sub] => match *sub {
            "max_input_size_mb" => {
                cfg.security.max_input_size_mb = Some(value.parse().map_err(|_| invalid())?)
            }
            "max_compression_ratio" => {
                cfg.security.max_compression_ratio = Some(value.parse().map_err(|_| invalid())?)
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        },
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}
