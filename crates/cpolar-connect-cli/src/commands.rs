//! CLI subcommands.

pub mod config;
pub mod connect;
pub mod init;
pub mod status;

use thiserror::Error;

/// Errors surfaced by the CLI layer.
///
/// Library failures pass through untouched so their classified messages
/// (auth vs tunnel vs network) reach the user verbatim; the CLI only adds
/// prompt failures and the interrupt marker.
#[derive(Debug, Error)]
pub enum CliError {
    /// A pipeline failure from the core library.
    #[error(transparent)]
    Core(#[from] cpolar_connect::ConnectError),

    /// An interactive prompt failed.
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// The user interrupted a prompt (Ctrl-C).
    #[error("interrupted")]
    Interrupted,
}

impl From<cpolar_connect::ConfigError> for CliError {
    fn from(err: cpolar_connect::ConfigError) -> Self {
        Self::Core(err.into())
    }
}

impl From<cpolar_connect::SshError> for CliError {
    fn from(err: cpolar_connect::SshError) -> Self {
        Self::Core(err.into())
    }
}

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
