//! Error types for cpolar-connect.
//!
//! The taxonomy separates transport failures (retryable at a higher layer)
//! from authentication, tunnel-resolution, SSH, and configuration failures,
//! so callers can tell "wrong password" from "service unreachable" from
//! "dashboard markup changed".

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for cpolar-connect operations.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Transport-level HTTP failure (connect, timeout, TLS). Potentially
    /// transient; safe to retry at a higher layer.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Dashboard authentication failure. Not retryable without new input.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Tunnel resolution failure (markup absent/changed, no eligible tunnel).
    #[error("tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// SSH key, connection, upload, or config-file failure.
    #[error("SSH error: {0}")]
    Ssh(#[from] SshError),

    /// Malformed or missing local settings.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to the dashboard login handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login page no longer exposes a CSRF token; the page contract is
    /// violated and credentials cannot be submitted.
    #[error("no CSRF token on the login page (dashboard markup may have changed)")]
    CsrfTokenMissing,

    /// The dashboard rejected the submitted credentials.
    #[error("login rejected for '{username}': check username and password")]
    LoginRejected {
        /// The username that failed to authenticate.
        username: String,
    },

    /// An authenticated request was silently redirected back to the login
    /// page; the cookie session is no longer valid.
    #[error("dashboard session expired; log in again")]
    SessionExpired,
}

/// Errors related to tunnel resolution from the status page.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// No eligible tunnel row was found on the status page.
    #[error("no TCP tunnel found on the status page{}", dump_hint(dump_path.as_deref()))]
    NotFound {
        /// Where the raw page was dumped for diagnosis, if the dump succeeded.
        dump_path: Option<PathBuf>,
    },

    /// A scraped tunnel URL did not match `tcp://<host>:<port>`.
    #[error("invalid tunnel URL '{url}': expected tcp://<host>:<port>")]
    InvalidUrl {
        /// The string that failed to parse.
        url: String,
    },
}

fn dump_hint(dump_path: Option<&std::path::Path>) -> String {
    dump_path.map_or_else(String::new, |p| format!(" (raw page saved to {})", p.display()))
}

/// Errors related to SSH key management, provisioning, and config files.
#[derive(Debug, Error)]
pub enum SshError {
    /// Key pair generation or public-key derivation failed.
    #[error("SSH key generation failed: {reason}")]
    KeyGeneration {
        /// The reason for the failure.
        reason: String,
    },

    /// TCP connect or SSH handshake to the endpoint failed.
    #[error("failed to connect to {host}:{port}: {reason}")]
    Connection {
        /// The host that could not be reached.
        host: String,
        /// The port that was used.
        port: u16,
        /// The reason for the failure.
        reason: String,
    },

    /// Password authentication was rejected during provisioning.
    #[error("SSH authentication failed for {user}@{host}: check the server password")]
    Authentication {
        /// The remote user.
        user: String,
        /// The remote host.
        host: String,
    },

    /// The public key could not be installed on the remote host.
    #[error("failed to upload public key: {reason}")]
    Upload {
        /// The reason for the failure.
        reason: String,
    },

    /// Reading or writing the local SSH client config file failed.
    #[error("failed to update SSH config {path}: {source}")]
    ConfigFile {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An external SSH tool (`ssh`, `ssh-keygen`) could not be started.
    #[error("failed to run '{command}': {source}")]
    Spawn {
        /// The command that could not be started.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to local settings and the secret store.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file does not exist yet.
    #[error("no configuration found at {path} (run `cpolar-connect init`)")]
    NotFound {
        /// The expected settings path.
        path: PathBuf,
    },

    /// The settings file could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The settings path.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The settings file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The settings path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The settings path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A settings value failed validation.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the invalid value.
        message: String,
    },

    /// An unknown key was passed to `config get`/`config set`.
    #[error("unknown configuration key '{key}'")]
    UnknownKey {
        /// The key that was not recognized.
        key: String,
    },

    /// The system keychain could not be accessed.
    #[error("secret store error: {reason}")]
    Secret {
        /// The reason for the failure.
        reason: String,
    },
}

/// Result type alias for cpolar-connect operations.
pub type Result<T> = std::result::Result<T, ConnectError>;

impl ConnectError {
    /// Check if this failure is potentially transient and worth retrying
    /// at a higher layer.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Check if this is an expired-session condition (distinct from a
    /// rejected login: the credentials may still be fine).
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::Auth(AuthError::SessionExpired))
    }
}

impl AuthError {
    /// Create a login-rejected error.
    pub fn login_rejected(username: impl Into<String>) -> Self {
        Self::LoginRejected {
            username: username.into(),
        }
    }
}

impl TunnelError {
    /// Create a not-found error, recording the diagnostic dump location.
    #[must_use]
    pub const fn not_found(dump_path: Option<PathBuf>) -> Self {
        Self::NotFound { dump_path }
    }

    /// Create an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

impl SshError {
    /// Create a key generation error.
    pub fn key_generation(reason: impl Into<String>) -> Self {
        Self::KeyGeneration {
            reason: reason.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(host: impl Into<String>, port: u16, reason: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            port,
            reason: reason.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self::Authentication {
            user: user.into(),
            host: host.into(),
        }
    }

    /// Create an upload error.
    pub fn upload(reason: impl Into<String>) -> Self {
        Self::Upload {
            reason: reason.into(),
        }
    }

    /// Create a config-file I/O error.
    pub fn config_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigFile {
            path: path.into(),
            source,
        }
    }

    /// Create a spawn error for an external SSH tool.
    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            command: command.into(),
            source,
        }
    }
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a secret store error.
    pub fn secret(reason: impl Into<String>) -> Self {
        Self::Secret {
            reason: reason.into(),
        }
    }
}

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        Self::secret(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_display() {
        let err = ConnectError::from(AuthError::login_rejected("alice@example.com"));
        let msg = err.to_string();
        assert!(msg.contains("authentication"));
        assert!(msg.contains("alice@example.com"));
    }

    #[test]
    fn tunnel_not_found_mentions_dump() {
        let err = TunnelError::not_found(Some(PathBuf::from("/tmp/dump.html")));
        let msg = err.to_string();
        assert!(msg.contains("no TCP tunnel"));
        assert!(msg.contains("/tmp/dump.html"));
    }

    #[test]
    fn tunnel_not_found_without_dump() {
        let err = TunnelError::not_found(None);
        assert!(!err.to_string().contains("saved to"));
    }

    #[test]
    fn ssh_connection_error_has_endpoint_context() {
        let err = SshError::connection("7.tcp.vip.cpolar.cn", 12766, "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("7.tcp.vip.cpolar.cn:12766"));
        assert!(msg.contains("refused"));
    }

    #[test]
    fn session_expired_is_distinguishable() {
        let expired = ConnectError::from(AuthError::SessionExpired);
        assert!(expired.is_session_expired());
        assert!(!expired.is_retryable());

        let rejected = ConnectError::from(AuthError::login_rejected("bob"));
        assert!(!rejected.is_session_expired());
    }

    #[test]
    fn auth_and_tunnel_failures_read_differently() {
        let auth = ConnectError::from(AuthError::login_rejected("bob")).to_string();
        let tunnel = ConnectError::from(TunnelError::not_found(None)).to_string();
        assert!(auth.starts_with("authentication"));
        assert!(tunnel.starts_with("tunnel"));
    }

    #[test]
    fn unknown_config_key_display() {
        let err = ConfigError::UnknownKey {
            key: "serverr_user".into(),
        };
        assert!(err.to_string().contains("serverr_user"));
    }
}
