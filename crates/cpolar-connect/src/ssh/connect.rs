//! Launching the interactive SSH session.
//!
//! The session is the system `ssh` binary run as a child process, so the
//! user's terminal, escape sequences, and agent all behave exactly as with
//! a hand-typed `ssh`. While the child runs, SIGINT is ignored in this
//! process; Ctrl-C reaches the remote shell and only ends the session when
//! `ssh` itself exits.

use std::path::Path;
use std::process::{Command, ExitStatus};

use crate::error::{Result, SshError};
use crate::tunnel::TunnelEndpoint;

/// Conventional exit code for a SIGINT-terminated session (128 + 2).
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// What to connect to: a freshly resolved endpoint, or the managed alias
/// left behind by config reconciliation.
#[derive(Debug, Clone, Copy)]
pub enum SshTarget<'a> {
    /// Connect directly with explicit endpoint, user, and key.
    Direct {
        /// The resolved tunnel endpoint.
        endpoint: &'a TunnelEndpoint,
        /// The remote login user.
        user: &'a str,
        /// The private key path.
        key_path: &'a Path,
    },
    /// Connect through the SSH config alias (`ssh <alias>`).
    Alias(&'a str),
}

/// The argument vector passed to `ssh` for a target.
///
/// Direct targets carry the same options the managed config block pins, so
/// both paths reach the endpoint identically.
#[must_use]
pub fn build_ssh_args(target: &SshTarget<'_>, forward_ports: &[u16]) -> Vec<String> {
    let mut args = match target {
        SshTarget::Direct {
            endpoint,
            user,
            key_path,
        } => vec![
            format!("{user}@{}", endpoint.hostname()),
            "-p".to_string(),
            endpoint.port().to_string(),
            "-i".to_string(),
            key_path.display().to_string(),
            "-o".to_string(),
            "PreferredAuthentications=publickey".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=30".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ],
        SshTarget::Alias(alias) => vec![(*alias).to_string()],
    };
    for port in forward_ports {
        args.push("-L".to_string());
        args.push(format!("{port}:localhost:{port}"));
    }
    args
}

/// Run the interactive session and report `ssh`'s exit code.
///
/// A signal-terminated child maps to `128 + signal`, so Ctrl-C surfaces as
/// [`INTERRUPT_EXIT_CODE`]. Only a failure to start or wait on `ssh` is an
/// error; a non-zero exit is a result.
pub fn connect(target: &SshTarget<'_>, forward_ports: &[u16]) -> Result<i32> {
    let args = build_ssh_args(target, forward_ports);
    tracing::info!(command = %format!("ssh {}", args.join(" ")), "starting SSH session");

    let mut child = Command::new("ssh")
        .args(&args)
        .spawn()
        .map_err(|err| SshError::spawn("ssh", err))?;

    // Ctrl-C must go to the child's terminal, not kill this process.
    let status = {
        let _guard = SigintGuard::ignore();
        child.wait().map_err(|err| SshError::spawn("ssh", err))?
    };

    let code = exit_code(status);
    if code == 0 {
        tracing::info!("SSH session ended");
    } else if code == INTERRUPT_EXIT_CODE {
        tracing::info!("SSH session interrupted");
    } else {
        tracing::warn!(code, "SSH session ended with non-zero status");
    }
    Ok(code)
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Ignores SIGINT for its lifetime, restoring the previous handler on drop.
#[cfg(unix)]
struct SigintGuard {
    previous: libc::sighandler_t,
}

#[cfg(unix)]
impl SigintGuard {
    fn ignore() -> Self {
        // SAFETY: SIG_IGN is a valid disposition and the previous handler
        // is restored before any other signal handling changes.
        let previous = unsafe { libc::signal(libc::SIGINT, libc::SIG_IGN) };
        Self { previous }
    }
}

#[cfg(unix)]
impl Drop for SigintGuard {
    fn drop(&mut self) {
        // SAFETY: restores the handler captured in `ignore`.
        unsafe {
            libc::signal(libc::SIGINT, self.previous);
        }
    }
}

#[cfg(not(unix))]
struct SigintGuard;

#[cfg(not(unix))]
impl SigintGuard {
    const fn ignore() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> TunnelEndpoint {
        TunnelEndpoint::from_url("tcp://7.tcp.vip.cpolar.cn:12766", "ssh").unwrap()
    }

    #[test]
    fn direct_args_pin_endpoint_and_key() {
        let ep = endpoint();
        let target = SshTarget::Direct {
            endpoint: &ep,
            user: "alice",
            key_path: Path::new("/home/alice/.ssh/id_rsa_cpolar"),
        };
        let args = build_ssh_args(&target, &[]);
        assert_eq!(args[0], "alice@7.tcp.vip.cpolar.cn");
        assert_eq!(args[1..3], ["-p".to_string(), "12766".to_string()]);
        assert!(args.contains(&"StrictHostKeyChecking=no".to_string()));
        assert!(!args.iter().any(|a| a == "-L"));
    }

    #[test]
    fn alias_args_are_just_the_alias() {
        let args = build_ssh_args(&SshTarget::Alias("cpolar"), &[]);
        assert_eq!(args, vec!["cpolar".to_string()]);
    }

    #[test]
    fn forward_ports_append_local_forwards() {
        let args = build_ssh_args(&SshTarget::Alias("cpolar"), &[8888, 6666]);
        assert_eq!(
            args,
            vec![
                "cpolar".to_string(),
                "-L".to_string(),
                "8888:localhost:8888".to_string(),
                "-L".to_string(),
                "6666:localhost:6666".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn signal_termination_maps_to_128_plus_signal() {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(libc::SIGINT);
        assert_eq!(exit_code(status), INTERRUPT_EXIT_CODE);
    }
}
