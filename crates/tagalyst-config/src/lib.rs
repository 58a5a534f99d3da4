use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tagalyst_engine::{EngineSettings, HighlightStyle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON file holding all annotations
    pub store_path: PathBuf,
    /// Highest anchor form tried on restore, 1 (structural) to 4 (content)
    pub max_match_level: u8,
    pub highlight_class: String,
    pub flash_class: String,
    pub color: String,
    /// Characters of context stored on each side of a quote
    pub quote_context: usize,
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            store_path: PathBuf::from(
                shellexpand::tilde("~/.local/share/tagalyst/annotations.json").as_ref(),
            ),
            max_match_level: settings.max_match_level,
            highlight_class: settings.style.name,
            flash_class: settings.flash_class,
            color: settings.style.color,
            quote_context: settings.quote_context,
            debounce_ms: u64::try_from(settings.debounce.as_millis()).unwrap_or(250),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the store path
        config.store_path = Self::expand_path(&config.store_path).unwrap_or(config.store_path);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/tagalyst");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Engine settings for this configuration. Out-of-range match levels are
    /// clamped to 1..=4.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_match_level: self.max_match_level.clamp(1, 4),
            style: HighlightStyle {
                name: self.highlight_class.clone(),
                color: self.color.clone(),
            },
            flash_class: self.flash_class.clone(),
            quote_context: self.quote_context,
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
