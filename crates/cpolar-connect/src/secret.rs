//! Secret storage for the dashboard password.
//!
//! The core only consumes a [`SecretStore`]; the default implementation
//! keeps the password in the system keychain. The `CPOLAR_PASSWORD`
//! environment variable takes precedence over any stored secret, which is
//! how non-interactive use (cron, CI) supplies credentials.

use keyring::Entry;

use crate::error::{ConfigError, Result};

/// Environment variable that overrides the stored password.
pub const PASSWORD_ENV_VAR: &str = "CPOLAR_PASSWORD";

/// Keychain service name for stored entries.
const SERVICE_NAME: &str = "cpolar-connect";

/// Password storage seam consumed by the orchestrator.
pub trait SecretStore {
    /// Look up the password for a dashboard username. `None` means no
    /// secret is available and the caller should prompt.
    fn get_password(&self, username: &str) -> Result<Option<String>>;

    /// Store or replace the password for a username.
    fn set_password(&self, username: &str, password: &str) -> Result<()>;

    /// Remove the stored password. Returns whether an entry existed.
    fn clear_password(&self, username: &str) -> Result<bool>;
}

/// System-keychain backed secret store.
#[derive(Debug)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    /// Store under the default service name.
    #[must_use]
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Store under a custom service name (used by tests).
    #[must_use]
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, username: &str) -> std::result::Result<Entry, ConfigError> {
        Entry::new(&self.service, username).map_err(ConfigError::from)
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn get_password(&self, username: &str) -> Result<Option<String>> {
        if let Ok(password) = std::env::var(PASSWORD_ENV_VAR) {
            if !password.is_empty() {
                tracing::debug!("using password from {PASSWORD_ENV_VAR}");
                return Ok(Some(password));
            }
        }
        match self.entry(username)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(ConfigError::from(err).into()),
        }
    }

    fn set_password(&self, username: &str, password: &str) -> Result<()> {
        self.entry(username)?
            .set_password(password)
            .map_err(ConfigError::from)?;
        tracing::info!(%username, "password stored in system keychain");
        Ok(())
    }

    fn clear_password(&self, username: &str) -> Result<bool> {
        match self.entry(username)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(ConfigError::from(err).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_overrides_keychain() {
        // SAFETY: test-local env mutation; no other test reads this var.
        unsafe { std::env::set_var(PASSWORD_ENV_VAR, "from-env") };
        let store = KeyringSecretStore::with_service("cpolar-connect-test");
        let password = store.get_password("nobody@example.com").unwrap();
        unsafe { std::env::remove_var(PASSWORD_ENV_VAR) };
        assert_eq!(password.as_deref(), Some("from-env"));
    }

    // Interacts with the real system keychain; run manually:
    // cargo test keychain_round_trip -- --ignored
    #[test]
    #[ignore]
    fn keychain_round_trip() {
        let store = KeyringSecretStore::with_service("cpolar-connect-test");
        store.set_password("tester", "secret").unwrap();
        assert_eq!(
            store.get_password("tester").unwrap().as_deref(),
            Some("secret")
        );
        assert!(store.clear_password("tester").unwrap());
        assert!(store.get_password("tester").unwrap().is_none());
        assert!(!store.clear_password("tester").unwrap());
    }
}
