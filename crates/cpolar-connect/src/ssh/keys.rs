//! Key pair lifecycle.
//!
//! Generation shells out to `ssh-keygen`, the most portable path to an
//! OpenSSH-format key pair. An existing private key is never overwritten
//! unless `force` is set; a missing public half is derived from the private
//! key (`ssh-keygen -y`) rather than regenerating the pair.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, SshError};

/// Comment embedded in generated keys.
const KEY_COMMENT: &str = "cpolar-connect";

/// Outcome of [`ensure_key_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPairStatus {
    /// A fresh key pair was generated.
    Generated,
    /// The private key already existed and was left untouched.
    AlreadyExists,
}

/// The conventional public-key path next to a private key.
#[must_use]
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut name = private_key.as_os_str().to_os_string();
    name.push(".pub");
    PathBuf::from(name)
}

/// Ensure a usable key pair exists at `private_key`.
///
/// Creates the parent directory (0700) if needed. With an existing private
/// key and no `force`, only the public half is reconciled (derived when
/// missing, private bytes untouched). With `force`, the pair is
/// regenerated.
pub fn ensure_key_pair(private_key: &Path, key_size: u32, force: bool) -> Result<KeyPairStatus> {
    let public_key = public_key_path(private_key);

    if let Some(parent) = private_key.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| SshError::key_generation(format!("cannot create {}: {err}", parent.display())))?;
        set_mode(parent, 0o700);
    }

    if private_key.exists() && !force {
        tracing::info!(path = %private_key.display(), "SSH key already exists");
        if !public_key.exists() {
            derive_public_key(private_key, &public_key)?;
        }
        return Ok(KeyPairStatus::AlreadyExists);
    }

    // ssh-keygen prompts before overwriting; clear stale files first.
    if force {
        let _ = fs::remove_file(private_key);
        let _ = fs::remove_file(&public_key);
    }

    let output = Command::new("ssh-keygen")
        .arg("-t")
        .arg("rsa")
        .arg("-b")
        .arg(key_size.to_string())
        .arg("-f")
        .arg(private_key)
        .arg("-N")
        .arg("")
        .arg("-C")
        .arg(KEY_COMMENT)
        .output()
        .map_err(|err| SshError::spawn("ssh-keygen", err))?;
    if !output.status.success() {
        return Err(SshError::key_generation(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )
        .into());
    }

    set_mode(private_key, 0o600);
    set_mode(&public_key, 0o644);
    tracing::info!(path = %private_key.display(), bits = key_size, "generated new SSH key pair");
    Ok(KeyPairStatus::Generated)
}

/// Derive and write the public key from an existing private key, leaving
/// the private key's bytes untouched.
fn derive_public_key(private_key: &Path, public_key: &Path) -> Result<()> {
    let output = Command::new("ssh-keygen")
        .arg("-y")
        .arg("-f")
        .arg(private_key)
        .output()
        .map_err(|err| SshError::spawn("ssh-keygen", err))?;
    if !output.status.success() {
        return Err(SshError::key_generation(format!(
            "cannot derive public key from {}: {}",
            private_key.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))
        .into());
    }

    let mut line = String::from_utf8_lossy(&output.stdout).trim().to_string();
    line.push('\n');
    fs::write(public_key, line)
        .map_err(|err| SshError::key_generation(format!("cannot write {}: {err}", public_key.display())))?;
    set_mode(public_key, 0o644);
    tracing::info!(path = %public_key.display(), "regenerated public key");
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        tracing::warn!(path = %path.display(), %err, "failed to set permissions");
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}
