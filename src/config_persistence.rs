//! Loading and persisting `segue.toml`.

use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::config::{sanitize_config, Config};

const CONFIG_FILE_NAME: &str = "segue.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// `<platform config dir>/segue.toml`, or the working directory when the
/// platform has none.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Reads the config at `path`, writing a default one first when the file is
/// missing. A file that fails to parse is reported and replaced in memory by
/// the defaults; it is left untouched on disk.
pub fn load_or_create_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        persist_config_file(&Config::default(), path)?;
    }

    let config_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = match toml::from_str::<Config>(&config_content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            Config::default()
        }
    };
    Ok(sanitize_config(config))
}

pub fn persist_config_file(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let config_text = toml::to_string(config)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, config_text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
