//! Core library for cpolar-connect.
//!
//! cpolar assigns a fresh public `tcp://<host>:<port>` endpoint to an SSH
//! tunnel every time the agent restarts. This crate automates chasing that
//! moving target: it logs in to the cpolar web dashboard, scrapes the
//! current tunnel endpoint from the status page, makes sure key-based SSH
//! authentication works (generating and uploading a key on first use),
//! rewrites the managed block in `~/.ssh/config`, and finally hands the
//! terminal to the system `ssh`.
//!
//! # Architecture
//!
//! The pipeline is a chain of independently usable pieces:
//!
//! - [`auth`]: form-based dashboard login over a cookie session
//! - [`tunnel`]: status-page scraping into a [`tunnel::TunnelEndpoint`]
//! - [`ssh`]: key lifecycle, key-auth probing, public-key provisioning,
//!   config reconciliation, and session launch
//! - [`config`]: local settings in `~/.cpolar-connect/config.toml`
//! - [`secret`]: dashboard password storage behind the [`secret::SecretStore`]
//!   seam
//! - [`extract`]: pure HTML/URL extraction helpers shared by the above
//!
//! Everything is synchronous and blocking; the tool runs one short
//! pipeline and then either exits or waits on an interactive child.
//!
//! # Example
//!
//! ```no_run
//! use cpolar_connect::auth::AuthSession;
//! use cpolar_connect::tunnel::TunnelResolver;
//!
//! # fn main() -> cpolar_connect::Result<()> {
//! let session = AuthSession::login(
//!     "https://dashboard.cpolar.com",
//!     "alice@example.com",
//!     "secret",
//! )?;
//! let endpoint = TunnelResolver::new(&session).get_tunnel_info()?;
//! println!("tunnel at {}:{}", endpoint.hostname(), endpoint.port());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod secret;
pub mod ssh;
pub mod tunnel;

pub use auth::AuthSession;
pub use config::{ConfigManager, ConnectConfig};
pub use error::{AuthError, ConfigError, ConnectError, Result, SshError, TunnelError};
pub use secret::{KeyringSecretStore, SecretStore};
pub use ssh::{KeyPairStatus, SshTarget, UploadOutcome};
pub use tunnel::{TunnelEndpoint, TunnelResolver};
