//! Configuration inspection and editing.

use cpolar_connect::config::ConfigManager;
use cpolar_connect::secret::{KeyringSecretStore, SecretStore};

use super::Result;
use crate::ConfigCommand;
use crate::prompts;

/// Settings keys in display order, matching `ConnectConfig`'s fields.
const KEYS: &[&str] = &[
    "username",
    "server_user",
    "ports",
    "auto_connect",
    "base_url",
    "ssh_key_path",
    "ssh_host_alias",
    "ssh_key_size",
    "log_level",
];

/// Dispatch a `config` subcommand.
pub fn run(command: &ConfigCommand, assume_yes: bool) -> Result<()> {
    let manager = ConfigManager::new()?;
    match command {
        ConfigCommand::Show => {
            manager.load()?;
            for key in KEYS {
                println!("{key} = {}", manager.get(key)?);
            }
        }
        ConfigCommand::Get { key } => println!("{}", manager.get(key)?),
        ConfigCommand::Set { key, value } => {
            manager.set(key, value)?;
            println!("{key} = {}", manager.get(key)?);
        }
        ConfigCommand::Path => println!("{}", manager.config_path().display()),
        ConfigCommand::ClearPassword => {
            let config = manager.load()?;
            if !assume_yes
                && !prompts::confirm(
                    &format!("Remove the stored password for {}?", config.username),
                    false,
                )?
            {
                return Ok(());
            }
            if KeyringSecretStore::new().clear_password(&config.username)? {
                println!("Stored password removed.");
            } else {
                println!("No stored password.");
            }
        }
    }
    Ok(())
}
