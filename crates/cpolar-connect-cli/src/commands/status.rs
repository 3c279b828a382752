//! Tunnel status without connecting.
//!
//! Resolution failures degrade to an offline rendering instead of a
//! process error: `status` is a read-only view and should still print the
//! configured account and alias when the dashboard is unreachable or no
//! password is stored.

use cpolar_connect::auth::AuthSession;
use cpolar_connect::config::{ConfigManager, ConnectConfig};
use cpolar_connect::secret::{KeyringSecretStore, SecretStore};
use cpolar_connect::tunnel::{TunnelEndpoint, TunnelResolver};

use super::Result;

/// Print the resolved tunnel (or why it could not be resolved).
pub fn run(json: bool) -> Result<()> {
    let manager = ConfigManager::new()?;
    let config = manager.load()?;
    let resolved = resolve(&config);

    if json {
        print_json(&config, &resolved);
    } else {
        print_text(&config, &resolved);
    }
    Ok(())
}

/// Resolve the endpoint; `Err` carries the offline reason.
fn resolve(config: &ConnectConfig) -> std::result::Result<TunnelEndpoint, String> {
    let password = KeyringSecretStore::new()
        .get_password(&config.username)
        .ok()
        .flatten()
        .ok_or_else(|| "no stored password (run `cpolar-connect init`)".to_string())?;

    let mut session = AuthSession::login(&config.base_url, &config.username, &password)
        .map_err(|err| err.to_string())?;
    let endpoint = TunnelResolver::new(&session)
        .get_tunnel_info()
        .map_err(|err| err.to_string());
    session.logout();
    endpoint
}

fn print_text(config: &ConnectConfig, resolved: &std::result::Result<TunnelEndpoint, String>) {
    println!("Account: {}", config.username);
    println!("Alias:   {}", config.ssh_host_alias);
    match resolved {
        Ok(endpoint) => {
            println!("Tunnel:  {}:{}", endpoint.hostname(), endpoint.port());
            println!("Connect: ssh {}", config.ssh_host_alias);
        }
        Err(reason) => println!("Tunnel:  unavailable ({reason})"),
    }
}

fn print_json(config: &ConnectConfig, resolved: &std::result::Result<TunnelEndpoint, String>) {
    let tunnel = match resolved {
        Ok(endpoint) => serde_json::json!({
            "url": endpoint.url(),
            "hostname": endpoint.hostname(),
            "port": endpoint.port(),
        }),
        Err(_) => serde_json::Value::Null,
    };
    let value = serde_json::json!({
        "username": config.username,
        "server_user": config.server_user,
        "ssh_host_alias": config.ssh_host_alias,
        "ports": config.ports,
        "tunnel": tunnel,
        "error": resolved.as_ref().err(),
    });
    println!("{value:#}");
}
