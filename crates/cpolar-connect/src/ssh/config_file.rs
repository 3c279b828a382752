//! SSH client config reconciliation.
//!
//! One managed `Host <alias>` block in `~/.ssh/config` is replaced
//! wholesale on every resolution; all other lines pass through untouched.
//! Reconciling twice against the same endpoint leaves the file
//! byte-identical, so a stale or killed run never corrupts the config.

use std::fs;
use std::path::Path;

use crate::error::{Result, SshError};
use crate::tunnel::TunnelEndpoint;

/// Header written when the config file is created from scratch.
const CONFIG_HEADER: &str = "# SSH config file";

/// Replace (or append) the managed `Host <alias>` block so that
/// `ssh <alias>` reaches `endpoint` as `user` with the key at `key_path`,
/// forwarding each port in `forward_ports` locally.
///
/// Creates the file (0600) and its parent directory (0700) when missing.
/// The whole file is rewritten; unmanaged blocks keep their exact lines.
pub fn reconcile_config(
    config_path: &Path,
    alias: &str,
    endpoint: &TunnelEndpoint,
    user: &str,
    key_path: &Path,
    forward_ports: &[u16],
) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|err| SshError::config_file(config_path, err))?;
        set_mode(parent, 0o700);
    }

    let created = !config_path.exists();
    let text = if created {
        format!("{CONFIG_HEADER}\n")
    } else {
        fs::read_to_string(config_path).map_err(|err| SshError::config_file(config_path, err))?
    };

    let mut lines: Vec<String> = text.lines().map(String::from).collect();
    let block = render_block(
        alias,
        endpoint.hostname(),
        endpoint.port(),
        user,
        key_path,
        forward_ports,
    );
    match find_block(&lines, alias) {
        Some((start, end)) => {
            lines.splice(start..end, block);
        }
        None => {
            if lines.last().is_some_and(|line| !line.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.extend(block);
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');
    fs::write(config_path, output).map_err(|err| SshError::config_file(config_path, err))?;
    if created {
        set_mode(config_path, 0o600);
    }
    tracing::info!(
        path = %config_path.display(),
        alias,
        endpoint = %format!("{}:{}", endpoint.hostname(), endpoint.port()),
        "SSH config updated"
    );
    Ok(())
}

/// Locate the managed block: `[start, end)` line indices, where `start` is
/// the `Host <alias>` marker and `end` is the first blank line or the next
/// `Host `/`Match ` marker (or end of file).
pub(crate) fn find_block(lines: &[String], alias: &str) -> Option<(usize, usize)> {
    let marker = format!("Host {alias}");
    let start = lines.iter().position(|line| line.trim() == marker)?;
    let mut end = lines.len();
    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("Host ") || trimmed.starts_with("Match ") {
            end = index;
            break;
        }
    }
    Some((start, end))
}

/// Render the managed block, tab-indented, in a fixed directive order.
pub(crate) fn render_block(
    alias: &str,
    hostname: &str,
    port: u16,
    user: &str,
    key_path: &Path,
    forward_ports: &[u16],
) -> Vec<String> {
    let mut block = vec![
        format!("Host {alias}"),
        format!("\tHostName {hostname}"),
        format!("\tPort {port}"),
        format!("\tUser {user}"),
        format!("\tIdentityFile {}", key_path.display()),
        "\tPreferredAuthentications publickey".to_string(),
        "\tStrictHostKeyChecking no".to_string(),
        "\tUserKnownHostsFile /dev/null".to_string(),
        "\tServerAliveInterval 30".to_string(),
        "\tServerAliveCountMax 3".to_string(),
    ];
    for port in forward_ports {
        block.push(format!("\tLocalForward {port} localhost:{port}"));
    }
    block
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
