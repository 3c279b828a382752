//! Local settings for cpolar-connect.
//!
//! Settings live in `~/.cpolar-connect/config.toml`; diagnostic dumps and
//! the log file live in `~/.cpolar-connect/logs/`. The schema is flat and
//! every field has a default, so a partial file is always loadable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default dashboard base URL.
pub const DEFAULT_BASE_URL: &str = "https://dashboard.cpolar.com";

/// Default local ports forwarded through the SSH session.
pub const DEFAULT_PORTS: &[u16] = &[8888, 6666];

/// Default private key location (tilde expanded at use).
pub const DEFAULT_SSH_KEY_PATH: &str = "~/.ssh/id_rsa_cpolar";

/// Default SSH config alias for the tunnel endpoint.
pub const DEFAULT_HOST_ALIAS: &str = "cpolar";

/// Default RSA key size in bits.
pub const DEFAULT_KEY_SIZE: u32 = 2048;

/// Default log level when neither env nor config specify one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Typed settings consumed by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Dashboard account name (email).
    pub username: String,
    /// Remote server login user.
    pub server_user: String,
    /// Local ports forwarded through the session.
    pub ports: Vec<u16>,
    /// Launch the interactive session automatically after reconciliation.
    pub auto_connect: bool,
    /// Dashboard base URL.
    pub base_url: String,
    /// Private key path; `~` is expanded at use.
    pub ssh_key_path: String,
    /// SSH config block alias (`ssh <alias>`).
    pub ssh_host_alias: String,
    /// RSA key size in bits.
    pub ssh_key_size: u32,
    /// Log level for the file log (`error`..`trace`).
    pub log_level: String,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            server_user: String::new(),
            ports: DEFAULT_PORTS.to_vec(),
            auto_connect: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            ssh_key_path: DEFAULT_SSH_KEY_PATH.to_string(),
            ssh_host_alias: DEFAULT_HOST_ALIAS.to_string(),
            ssh_key_size: DEFAULT_KEY_SIZE,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ConnectConfig {
    /// Validate settings before use or save.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::invalid("username must not be empty").into());
        }
        if self.server_user.trim().is_empty() {
            return Err(ConfigError::invalid("server_user must not be empty").into());
        }
        if self.ports.contains(&0) {
            return Err(ConfigError::invalid("forward ports must be in 1-65535").into());
        }
        if self.ssh_host_alias.trim().is_empty() || self.ssh_host_alias.contains(char::is_whitespace)
        {
            return Err(ConfigError::invalid("ssh_host_alias must be a single word").into());
        }
        Ok(())
    }

    /// The private key path with `~` expanded.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        expand_tilde(&self.ssh_key_path)
    }
}

/// The application data directory (`~/.cpolar-connect`).
#[must_use]
pub fn app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cpolar-connect"))
}

/// The log/diagnostic directory (`~/.cpolar-connect/logs`).
#[must_use]
pub fn logs_dir() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join("logs"))
}

/// Expand a leading `~/` to the user's home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Loads, saves, and edits the settings file.
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager over the default settings location.
    pub fn new() -> Result<Self> {
        let dir = app_dir()
            .ok_or_else(|| ConfigError::invalid("cannot determine the home directory"))?;
        Ok(Self {
            config_path: dir.join("config.toml"),
        })
    }

    /// Manager over an explicit settings file (used by tests).
    #[must_use]
    pub fn with_config_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// The settings file path.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Whether a settings file exists yet.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.config_path.is_file()
    }

    /// Load and validate the settings file.
    pub fn load(&self) -> Result<ConnectConfig> {
        if !self.exists() {
            return Err(ConfigError::NotFound {
                path: self.config_path.clone(),
            }
            .into());
        }
        let text = fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Read {
            path: self.config_path.clone(),
            source,
        })?;
        let config: ConnectConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and persist settings, creating the parent directory if
    /// needed.
    pub fn save(&self, config: &ConnectConfig) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: self.config_path.clone(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(config)
            .map_err(|err| ConfigError::invalid(format!("cannot serialize settings: {err}")))?;
        fs::write(&self.config_path, text).map_err(|source| ConfigError::Write {
            path: self.config_path.clone(),
            source,
        })?;
        tracing::info!(path = %self.config_path.display(), "settings saved");
        Ok(())
    }

    /// Read one settings field by name, rendered as a string.
    pub fn get(&self, key: &str) -> Result<String> {
        let config = self.load()?;
        let value = match key {
            "username" => config.username,
            "server_user" => config.server_user,
            "ports" => join_ports(&config.ports),
            "auto_connect" => config.auto_connect.to_string(),
            "base_url" => config.base_url,
            "ssh_key_path" => config.ssh_key_path,
            "ssh_host_alias" => config.ssh_host_alias,
            "ssh_key_size" => config.ssh_key_size.to_string(),
            "log_level" => config.log_level,
            _ => return Err(ConfigError::UnknownKey { key: key.into() }.into()),
        };
        Ok(value)
    }

    /// Parse and write one settings field by name.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut config = self.load()?;
        match key {
            "username" => config.username = value.to_string(),
            "server_user" => config.server_user = value.to_string(),
            "ports" => config.ports = parse_ports(value)?,
            "auto_connect" => {
                config.auto_connect = value.parse().map_err(|_| {
                    ConfigError::invalid(format!("auto_connect must be true or false, got '{value}'"))
                })?;
            }
            "base_url" => config.base_url = value.trim_end_matches('/').to_string(),
            "ssh_key_path" => config.ssh_key_path = value.to_string(),
            "ssh_host_alias" => config.ssh_host_alias = value.to_string(),
            "ssh_key_size" => {
                config.ssh_key_size = value.parse().map_err(|_| {
                    ConfigError::invalid(format!("ssh_key_size must be a number, got '{value}'"))
                })?;
            }
            "log_level" => config.log_level = value.to_string(),
            _ => return Err(ConfigError::UnknownKey { key: key.into() }.into()),
        }
        self.save(&config)
    }
}

/// Parse a comma-separated port list (`"8888,6666"`).
pub fn parse_ports(value: &str) -> Result<Vec<u16>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| ConfigError::invalid(format!("invalid port '{part}'")).into())
        })
        .collect()
}

fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
