//! First-run setup.

use cpolar_connect::auth::AuthSession;
use cpolar_connect::config::{self, ConfigManager, ConnectConfig};
use cpolar_connect::error::ConfigError;
use cpolar_connect::secret::{KeyringSecretStore, SecretStore};

use super::Result;
use crate::prompts;

/// Options for `init`.
#[derive(Debug)]
pub struct InitOptions {
    /// Overwrite an existing configuration.
    pub force: bool,
    /// Dashboard account name; prompted when absent.
    pub username: Option<String>,
    /// Remote server login user; prompted when absent.
    pub server_user: Option<String>,
    /// Comma-separated forward ports; prompted when absent.
    pub ports: Option<String>,
}

/// Collect settings, verify credentials, and write the configuration.
pub fn run(opts: &InitOptions) -> Result<()> {
    let manager = ConfigManager::new()?;
    if manager.exists() && !opts.force {
        return Err(ConfigError::invalid(format!(
            "configuration already exists at {}; re-run with --force to overwrite",
            manager.config_path().display()
        ))
        .into());
    }

    let username = match &opts.username {
        Some(username) => username.clone(),
        None => prompts::input("cpolar account (email)", None)?,
    };
    let password = prompts::password("cpolar password")?;
    let server_user = match &opts.server_user {
        Some(user) => user.clone(),
        None => prompts::input("server login user", None)?,
    };
    let ports = match &opts.ports {
        Some(ports) => ports.clone(),
        None => prompts::input("local forward ports", Some("8888,6666"))?,
    };
    let settings = ConnectConfig {
        username,
        server_user,
        ports: config::parse_ports(&ports)?,
        ..ConnectConfig::default()
    };

    // A real login round-trip catches typos now instead of on first
    // connect; an unreachable dashboard is not a reason to abort setup.
    println!("Verifying credentials...");
    match AuthSession::login(&settings.base_url, &settings.username, &password) {
        Ok(mut session) => {
            session.logout();
            println!("Credentials verified.");
        }
        Err(err) if err.is_retryable() => {
            tracing::warn!(%err, "could not verify credentials");
            println!("warning: could not reach the dashboard ({err}); credentials were not verified");
        }
        Err(err) => return Err(err.into()),
    }

    manager.save(&settings)?;
    if let Err(err) = KeyringSecretStore::new().set_password(&settings.username, &password) {
        tracing::warn!(%err, "could not store the password");
        println!("warning: could not store the password in the system keychain ({err})");
    }
    println!(
        "Configuration written to {}",
        manager.config_path().display()
    );
    println!("Run `cpolar-connect` to connect.");
    Ok(())
}
