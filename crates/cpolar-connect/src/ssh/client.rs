//! Key-auth probing and public-key provisioning.
//!
//! Both operations speak SSH directly (no `ssh` subprocess) so that a
//! rejected key or password is observed as a protocol fact rather than
//! parsed out of CLI output. Provisioning appends the public key to the
//! remote `authorized_keys` in a single shell command, so a failure leaves
//! the file either untouched or fully updated.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::Session;

use crate::error::{Result, SshError};

/// Timeout for the key-auth probe (connect + handshake + auth).
pub const KEY_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for password-authenticated provisioning.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of [`upload_public_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The key was appended to the remote `authorized_keys`.
    Uploaded,
    /// The key was already authorized; nothing was written.
    AlreadyPresent,
}

/// Probe whether `user` can authenticate at `hostname:port` with the key
/// at `key_path`.
///
/// Any failure (unreachable host, handshake error, rejected key) reads as
/// `false`; the caller falls back to password-based provisioning.
#[must_use]
pub fn test_key_auth(hostname: &str, port: u16, user: &str, key_path: &Path) -> bool {
    let session = match open_session(hostname, port, KEY_AUTH_TIMEOUT) {
        Ok(session) => session,
        Err(err) => {
            tracing::debug!(%err, "key-auth probe could not reach the endpoint");
            return false;
        }
    };
    match session.userauth_pubkey_file(user, None, key_path, None) {
        Ok(()) => session.authenticated(),
        Err(err) => {
            tracing::debug!(%err, "key authentication rejected");
            false
        }
    }
}

/// Install the public key at `public_key_path` into the remote user's
/// `authorized_keys`, authenticating with `password`.
///
/// Idempotent: if the exact key line is already present, nothing is
/// written and [`UploadOutcome::AlreadyPresent`] is returned.
pub fn upload_public_key(
    hostname: &str,
    port: u16,
    user: &str,
    password: &str,
    public_key_path: &Path,
) -> Result<UploadOutcome> {
    let public_key = std::fs::read_to_string(public_key_path)
        .map_err(|err| {
            SshError::upload(format!(
                "cannot read public key {}: {err}",
                public_key_path.display()
            ))
        })?
        .trim()
        .to_string();

    let session = open_session(hostname, port, UPLOAD_TIMEOUT)?;
    session
        .userauth_password(user, password)
        .map_err(|err| {
            tracing::debug!(%err, "password authentication rejected");
            SshError::authentication(user, hostname)
        })?;

    exec(&session, "mkdir -p ~/.ssh && chmod 700 ~/.ssh")?;
    let existing = exec(&session, "cat ~/.ssh/authorized_keys 2>/dev/null || true")?;
    if key_already_authorized(&existing, &public_key) {
        tracing::info!("public key already authorized on the remote host");
        return Ok(UploadOutcome::AlreadyPresent);
    }

    let append = format!(
        "echo '{}' >> ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys",
        escape_single_quotes(&public_key)
    );
    exec(&session, &append)?;
    tracing::info!("public key uploaded to the remote host");
    Ok(UploadOutcome::Uploaded)
}

/// Whether `public_key` already appears as a line of an `authorized_keys`
/// body.
pub(crate) fn key_already_authorized(authorized_keys: &str, public_key: &str) -> bool {
    let key = public_key.trim();
    !key.is_empty() && authorized_keys.lines().any(|line| line.trim() == key)
}

/// Escape a string for inclusion inside single quotes in `sh`.
pub(crate) fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', r#"'"'"'"#)
}

fn open_session(hostname: &str, port: u16, timeout: Duration) -> Result<Session> {
    let addr = (hostname, port)
        .to_socket_addrs()
        .map_err(|err| SshError::connection(hostname, port, err.to_string()))?
        .next()
        .ok_or_else(|| SshError::connection(hostname, port, "hostname did not resolve"))?;
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|err| SshError::connection(hostname, port, err.to_string()))?;

    let mut session = Session::new()
        .map_err(|err| SshError::connection(hostname, port, err.to_string()))?;
    session.set_tcp_stream(stream);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session
        .handshake()
        .map_err(|err| SshError::connection(hostname, port, err.to_string()))?;
    Ok(session)
}

fn exec(session: &Session, command: &str) -> Result<String> {
    let mut channel = session
        .channel_session()
        .map_err(|err| SshError::upload(format!("cannot open channel: {err}")))?;
    channel
        .exec(command)
        .map_err(|err| SshError::upload(format!("cannot run remote command: {err}")))?;

    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|err| SshError::upload(format!("cannot read remote output: {err}")))?;
    channel
        .wait_close()
        .map_err(|err| SshError::upload(format!("remote command did not finish: {err}")))?;

    let status = channel
        .exit_status()
        .map_err(|err| SshError::upload(format!("cannot read remote exit status: {err}")))?;
    if status != 0 {
        return Err(SshError::upload(format!("remote command exited with status {status}")).into());
    }
    Ok(output)
}
