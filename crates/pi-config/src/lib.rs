//! Plugin installer configuration loading and validation.
//!
//! This crate provides:
//! - Typed settings for the install pipeline and its HTTP client
//! - An optional TOML config file
//! - Config resolution (CLI → env → config file → defaults)

pub mod file;
pub mod resolve;
pub mod settings;

pub use file::{ConfigFile, HttpFile};
pub use resolve::{default_config_path, resolve_config, resolve_config_with, CliOverrides};
pub use settings::{default_prefix, ConfigSource, HttpSettings, InstallConfig};

use std::path::PathBuf;

/// Errors from configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("plugin prefix must not be empty")]
    EmptyPrefix,
}

impl From<ConfigError> for pi_common::Error {
    fn from(err: ConfigError) -> Self {
        pi_common::Error::Config(err.to_string())
    }
}
