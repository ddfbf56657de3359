//! Engine configuration loading
//!
//! TOML on disk, [`EngineConfig`] in memory. A missing or broken file never
//! stops the engine: [`load_config_or_default`] reports the problem and
//! carries on with the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use regionflags_types::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Serialize error for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Load a config from a TOML file
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load a config, falling back to defaults when the file is absent or invalid
pub fn load_config_or_default(path: &Path) -> EngineConfig {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Loaded engine config");
            config
        }
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No engine config, using defaults");
            EngineConfig::default()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Engine config unusable, using defaults");
            EngineConfig::default()
        }
    }
}

/// Save a config to a TOML file, creating parent directories
pub fn save_config(path: &Path, config: &EngineConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Per-user config location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("regionflags").join("config.toml"))
}
