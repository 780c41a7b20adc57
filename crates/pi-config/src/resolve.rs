//! Config resolution: CLI → env → config file → defaults.

use std::path::PathBuf;

use tracing::debug;

use crate::file::ConfigFile;
use crate::settings::{ConfigSource, HttpSettings, InstallConfig};
use crate::ConfigError;

pub const ENV_CONFIG: &str = "PI_CONFIG";
pub const ENV_PLUGIN_PREFIX: &str = "PI_PLUGIN_PREFIX";
pub const ENV_OVERWRITE: &str = "PI_OVERWRITE";
pub const ENV_KEEP_WORK: &str = "PI_KEEP_WORK";
pub const ENV_HTTP_CONNECT_TIMEOUT: &str = "PI_HTTP_CONNECT_TIMEOUT_SECS";
pub const ENV_HTTP_TIMEOUT: &str = "PI_HTTP_TIMEOUT_SECS";
pub const ENV_HTTP_USER_AGENT: &str = "PI_HTTP_USER_AGENT";

const CONFIG_DIR_NAME: &str = "plugin_installer";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Values supplied on the command line.
///
/// The boolean flags can only switch behavior on; `false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub prefix: Option<PathBuf>,
    pub overwrite: bool,
    pub keep_work: bool,
}

/// Default config file location (`<config dir>/plugin_installer/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolve configuration from the process environment.
pub fn resolve_config(cli: &CliOverrides) -> Result<InstallConfig, ConfigError> {
    resolve_config_with(cli, |var| std::env::var(var).ok(), default_config_path())
}

/// Resolve configuration with an injected environment lookup and default
/// config path.
pub fn resolve_config_with<E>(
    cli: &CliOverrides,
    env: E,
    default_file: Option<PathBuf>,
) -> Result<InstallConfig, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let source = match (cli.config.clone(), env(ENV_CONFIG)) {
        (Some(path), _) => ConfigSource::Explicit(path),
        (None, Some(path)) if !path.is_empty() => ConfigSource::Explicit(PathBuf::from(path)),
        _ => match default_file {
            Some(path) if path.is_file() => ConfigSource::Default(path),
            _ => ConfigSource::None,
        },
    };

    let file = match &source {
        ConfigSource::Explicit(path) | ConfigSource::Default(path) => ConfigFile::load(path)?,
        ConfigSource::None => ConfigFile::default(),
    };
    debug!(?source, "resolved config file");

    let mut config = InstallConfig {
        source,
        ..InstallConfig::default()
    };
    apply_file(&mut config, file);
    apply_env(&mut config, &env)?;

    if let Some(prefix) = &cli.prefix {
        config.prefix = prefix.clone();
    }
    config.overwrite |= cli.overwrite;
    config.keep_work |= cli.keep_work;

    if config.prefix.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPrefix);
    }
    Ok(config)
}

fn apply_file(config: &mut InstallConfig, file: ConfigFile) {
    if let Some(prefix) = file.prefix {
        config.prefix = prefix;
    }
    if let Some(overwrite) = file.overwrite {
        config.overwrite = overwrite;
    }
    if let Some(keep_work) = file.keep_work {
        config.keep_work = keep_work;
    }
    let http: &mut HttpSettings = &mut config.http;
    if file.http.connect_timeout_secs.is_some() {
        http.connect_timeout_secs = file.http.connect_timeout_secs;
    }
    if file.http.timeout_secs.is_some() {
        http.timeout_secs = file.http.timeout_secs;
    }
    if let Some(user_agent) = file.http.user_agent {
        http.user_agent = user_agent;
    }
}

fn apply_env<E>(config: &mut InstallConfig, env: &E) -> Result<(), ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(prefix) = env(ENV_PLUGIN_PREFIX).filter(|v| !v.is_empty()) {
        config.prefix = PathBuf::from(prefix);
    }
    if let Some(value) = env(ENV_OVERWRITE) {
        config.overwrite = parse_bool(ENV_OVERWRITE, &value)?;
    }
    if let Some(value) = env(ENV_KEEP_WORK) {
        config.keep_work = parse_bool(ENV_KEEP_WORK, &value)?;
    }
    if let Some(value) = env(ENV_HTTP_CONNECT_TIMEOUT) {
        config.http.connect_timeout_secs = Some(parse_secs(ENV_HTTP_CONNECT_TIMEOUT, &value)?);
    }
    if let Some(value) = env(ENV_HTTP_TIMEOUT) {
        config.http.timeout_secs = Some(parse_secs(ENV_HTTP_TIMEOUT, &value)?);
    }
    if let Some(value) = env(ENV_HTTP_USER_AGENT).filter(|v| !v.is_empty()) {
        config.http.user_agent = value;
    }
    Ok(())
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_secs(var: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
