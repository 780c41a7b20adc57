//! On-disk TOML config file.
//!
//! ```toml
//! prefix = "/opt/mackerel-agent/plugins"
//! overwrite = false
//! keep_work = false
//!
//! [http]
//! connect_timeout_secs = 10
//! timeout_secs = 300
//! user_agent = "provisioner/1.0"
//! ```
//!
//! Every key is optional. Unknown keys are rejected so typos surface.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub prefix: Option<PathBuf>,
    pub overwrite: Option<bool>,
    pub keep_work: Option<bool>,
    #[serde(default)]
    pub http: HttpFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpFile {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl ConfigFile {
    /// Parse TOML text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
