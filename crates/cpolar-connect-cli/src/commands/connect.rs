//! The default connect pipeline.
//!
//! Sequences the library end to end: settings → password → dashboard
//! login → tunnel resolution → key-auth provisioning (first run only) →
//! SSH config reconciliation → interactive session. When a direct session
//! fails for a reason other than Ctrl-C, the tunnel endpoint may have
//! moved while the session was up, so resolution is re-run exactly once.

use std::path::{Path, PathBuf};

use cpolar_connect::auth::AuthSession;
use cpolar_connect::config::{ConfigManager, ConnectConfig};
use cpolar_connect::error::{ConfigError, SshError};
use cpolar_connect::secret::{KeyringSecretStore, SecretStore};
use cpolar_connect::ssh::{self, INTERRUPT_EXIT_CODE, SshTarget};
use cpolar_connect::tunnel::{TunnelEndpoint, TunnelResolver};

use super::Result;
use crate::prompts;

/// Options for the connect pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Skip confirmation prompts.
    pub assume_yes: bool,
    /// Suppress informational output.
    pub quiet: bool,
}

/// Run the pipeline; the returned code becomes the process exit code.
pub fn run(opts: &ConnectOptions) -> Result<i32> {
    let manager = ConfigManager::new()?;
    let config = manager.load()?;
    let store = KeyringSecretStore::new();
    let password = obtain_password(&store, &config.username, opts.assume_yes)?;

    let mut session = AuthSession::login(&config.base_url, &config.username, &password)?;
    let result = run_pipeline(&session, &config, opts);
    session.logout();
    result
}

fn run_pipeline(session: &AuthSession, config: &ConnectConfig, opts: &ConnectOptions) -> Result<i32> {
    let resolver = TunnelResolver::new(session);
    let endpoint = resolver.get_tunnel_info()?;
    if !opts.quiet {
        print_summary(&endpoint, config);
    }
    if !opts.assume_yes
        && !config.auto_connect
        && !prompts::confirm("Update the SSH config for this endpoint?", true)?
    {
        return Ok(0);
    }

    let key_path = config.key_path();
    ensure_key_access(&endpoint, config, &key_path)?;

    let ssh_config = ssh_config_path()?;
    ssh::reconcile_config(
        &ssh_config,
        &config.ssh_host_alias,
        &endpoint,
        &config.server_user,
        &key_path,
        &config.ports,
    )?;
    if !opts.quiet {
        println!(
            "SSH config updated; `ssh {}` now reaches the tunnel.",
            config.ssh_host_alias
        );
    }

    if !config.auto_connect {
        return Ok(0);
    }

    let code = ssh::connect(
        &SshTarget::Direct {
            endpoint: &endpoint,
            user: &config.server_user,
            key_path: &key_path,
        },
        &config.ports,
    )?;
    if code == 0 || code == INTERRUPT_EXIT_CODE {
        return Ok(code);
    }

    // The endpoint may have moved while the session was up.
    if !opts.quiet {
        println!("Session ended with exit code {code}; re-resolving the tunnel.");
    }
    let endpoint = resolver.get_tunnel_info()?;
    ssh::reconcile_config(
        &ssh_config,
        &config.ssh_host_alias,
        &endpoint,
        &config.server_user,
        &key_path,
        &config.ports,
    )?;
    Ok(ssh::connect(
        &SshTarget::Direct {
            endpoint: &endpoint,
            user: &config.server_user,
            key_path: &key_path,
        },
        &config.ports,
    )?)
}

/// Make sure key authentication works, provisioning the key on first use.
fn ensure_key_access(
    endpoint: &TunnelEndpoint,
    config: &ConnectConfig,
    key_path: &Path,
) -> Result<()> {
    if ssh::test_key_auth(
        endpoint.hostname(),
        endpoint.port(),
        &config.server_user,
        key_path,
    ) {
        tracing::debug!("key authentication already works");
        return Ok(());
    }

    println!(
        "Key authentication is not set up for {}@{} yet.",
        config.server_user,
        endpoint.hostname()
    );
    let server_password = prompts::password(&format!(
        "Password for {}@{}",
        config.server_user,
        endpoint.hostname()
    ))?;

    ssh::ensure_key_pair(key_path, config.ssh_key_size, false)?;
    let public_key = ssh::public_key_path(key_path);
    ssh::upload_public_key(
        endpoint.hostname(),
        endpoint.port(),
        &config.server_user,
        &server_password,
        &public_key,
    )?;

    if !ssh::test_key_auth(
        endpoint.hostname(),
        endpoint.port(),
        &config.server_user,
        key_path,
    ) {
        return Err(SshError::authentication(&config.server_user, endpoint.hostname()).into());
    }
    Ok(())
}

fn obtain_password(
    store: &KeyringSecretStore,
    username: &str,
    assume_yes: bool,
) -> Result<String> {
    if let Some(password) = store.get_password(username)? {
        return Ok(password);
    }
    let password = prompts::password(&format!("cpolar password for {username}"))?;
    if assume_yes || prompts::confirm("Store the password in the system keychain?", true)? {
        if let Err(err) = store.set_password(username, &password) {
            tracing::warn!(%err, "could not store the password; continuing without");
        }
    }
    Ok(password)
}

fn print_summary(endpoint: &TunnelEndpoint, config: &ConnectConfig) {
    println!(
        "Tunnel: {} -> {}@{}:{}",
        endpoint.url(),
        config.server_user,
        endpoint.hostname(),
        endpoint.port()
    );
    if !config.ports.is_empty() {
        let forwards = config
            .ports
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("Forwarding local ports: {forwards}");
    }
}

fn ssh_config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".ssh").join("config"))
        .ok_or_else(|| ConfigError::invalid("cannot determine the home directory").into())
}
