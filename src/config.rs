//! Process-wide settings. Defaults are compiled in; [load_default] overlays
//! `$XDG_CONFIG_HOME/relex/config.toml` when it exists.

use std::fs;
use std::io;
use std::path;

use lazy_static::lazy_static;
use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Edits a token collection remembers before re-anchoring its tokens.
    pub rebase_threshold: usize,

    /// Compare every incremental update against a full lex.
    pub verify_incremental: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
    Xdg(xdg::BaseDirectoriesError),
}

impl Default for Config {
    fn default() -> Config {
        Config {
            rebase_threshold: 32,
            verify_incremental: false,
        }
    }
}

lazy_static! {
    static ref INSTANCE: parking_lot::RwLock<Config> = parking_lot::RwLock::new(Config::default());
}

pub fn get() -> parking_lot::RwLockReadGuard<'static, Config> {
    INSTANCE.read()
}

pub fn set() -> parking_lot::RwLockWriteGuard<'static, Config> {
    INSTANCE.write()
}

impl Config {
    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &path::Path) -> Result<Config, ConfigError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Where [load_default] looks, whether or not the file exists.
    pub fn default_path() -> Result<path::PathBuf, ConfigError> {
        Ok(xdg::BaseDirectories::with_prefix("relex")?.get_config_home().join("config.toml"))
    }
}

/// Loads the file at `path` and installs it process-wide.
pub fn load(path: &path::Path) -> Result<(), ConfigError> {
    *set() = Config::load(path)?;
    Ok(())
}

/// Installs the user's config file if there is one. A missing file leaves the defaults in place.
pub fn load_default() -> Result<(), ConfigError> {
    let path = Config::default_path()?;

    match Config::load(&path) {
        Ok(config) => {
            *set() = config;
            Ok(())
        },
        Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> ConfigError {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> ConfigError {
        ConfigError::Parse(e)
    }
}

impl From<xdg::BaseDirectoriesError> for ConfigError {
    fn from(e: xdg::BaseDirectoriesError) -> ConfigError {
        ConfigError::Xdg(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Xdg(e) => write!(f, "failed to locate config directory: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Xdg(e) => Some(e),
        }
    }
}
