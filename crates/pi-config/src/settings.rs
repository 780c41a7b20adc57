//! Resolved install settings.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Plugin root used on Unix-like hosts when nothing else is configured.
pub const DEFAULT_UNIX_PREFIX: &str = "/opt/mackerel-agent/plugins";

/// Where the config file layer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    /// Named by `--config` or `PI_CONFIG`.
    Explicit(PathBuf),
    /// Found at the default location.
    Default(PathBuf),
    /// No file; defaults, env and CLI only.
    None,
}

/// HTTP client settings for artifact downloads.
///
/// Unset timeouts leave the client's own behavior in place; the installer
/// adds no deadline of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpSettings {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl HttpSettings {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: None,
            timeout_secs: None,
            user_agent: format!("pi-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fully resolved configuration for one install run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallConfig {
    /// Plugin root; `bin` and `work` live beneath it.
    pub prefix: PathBuf,
    pub overwrite: bool,
    /// Leave the per-install scratch directory behind for inspection.
    pub keep_work: bool,
    pub http: HttpSettings,
    pub source: ConfigSource,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            overwrite: false,
            keep_work: false,
            http: HttpSettings::default(),
            source: ConfigSource::None,
        }
    }
}

/// Default plugin root for this platform.
///
/// On Windows the agent keeps plugins next to its executable, so the root is
/// `<exe dir>/plugins`.
pub fn default_prefix() -> PathBuf {
    #[cfg(windows)]
    {
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            return dir.join("plugins");
        }
    }
    PathBuf::from(DEFAULT_UNIX_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InstallConfig::default();
        assert!(!config.overwrite);
        assert!(!config.keep_work);
        assert_eq!(config.source, ConfigSource::None);
        assert!(config.http.timeout().is_none());
        assert!(config.http.user_agent.starts_with("pi-core/"));
        #[cfg(unix)]
        assert_eq!(config.prefix, PathBuf::from(DEFAULT_UNIX_PREFIX));
    }

    #[test]
    fn test_timeouts_convert_to_durations() {
        let http = HttpSettings {
            connect_timeout_secs: Some(5),
            timeout_secs: Some(120),
            ..HttpSettings::default()
        };
        assert_eq!(http.connect_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(http.timeout(), Some(Duration::from_secs(120)));
    }
}
