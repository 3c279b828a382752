//! Tunnel resolution from the dashboard status page.
//!
//! A resolver borrows an authenticated session, fetches `/status`, and
//! produces exactly one [`TunnelEndpoint`] per resolution. A redirect back
//! to `/login` means the session silently expired and is reported as such,
//! not as a parse failure. When the page cannot be parsed, the raw HTML is
//! dumped (best-effort) next to the logs so dashboard markup drift can be
//! diagnosed after the fact.

use std::fs;
use std::path::PathBuf;

use crate::auth::AuthSession;
use crate::config;
use crate::error::{AuthError, Result, TunnelError};
use crate::extract::{DEFAULT_SKIP_TUNNELS, extract_auth_token, extract_tunnel_url, split_host_port};

/// A resolved public TCP endpoint for the SSH-forwarding tunnel.
///
/// Immutable once constructed; `url` is always the canonical
/// `tcp://<hostname>:<port>` form of the other two fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelEndpoint {
    url: String,
    hostname: String,
    port: u16,
    name: String,
    active: bool,
}

impl TunnelEndpoint {
    /// Build an endpoint from a scraped tunnel URL, validating and
    /// canonicalizing it.
    pub fn from_url(url: &str, name: impl Into<String>) -> std::result::Result<Self, TunnelError> {
        let (hostname, port) = split_host_port(url)?;
        Ok(Self {
            url: format!("tcp://{hostname}:{port}"),
            hostname,
            port,
            name: name.into(),
            active: true,
        })
    }

    /// The canonical `tcp://<host>:<port>` string.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The public hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The public port (1–65535).
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The tunnel name as shown on the dashboard.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the tunnel was listed as active when resolved.
    #[must_use]
    pub const fn active(&self) -> bool {
        self.active
    }
}

impl std::fmt::Display for TunnelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.hostname, self.port, self.name)
    }
}

/// Resolves tunnel information using an authenticated session.
#[derive(Debug)]
pub struct TunnelResolver<'a> {
    session: &'a AuthSession,
}

impl<'a> TunnelResolver<'a> {
    /// Create a resolver borrowing an authenticated session.
    #[must_use]
    pub const fn new(session: &'a AuthSession) -> Self {
        Self { session }
    }

    fn status_url(&self) -> String {
        format!("{}/status", self.session.base_url())
    }

    /// Fetch the status page and select the SSH tunnel endpoint.
    pub fn get_tunnel_info(&self) -> Result<TunnelEndpoint> {
        tracing::debug!("fetching tunnel information");
        let response = self
            .session
            .client()
            .get(self.status_url())
            .send()?
            .error_for_status()?;
        let final_url = response.url().to_string();
        let html = response.text()?;

        // A silent redirect to the login page means the cookie session
        // expired, not that the markup changed.
        if final_url.contains("/login") {
            return Err(AuthError::SessionExpired.into());
        }

        let url = extract_tunnel_url(&html, DEFAULT_SKIP_TUNNELS).ok_or_else(|| {
            tracing::error!("could not find tunnel URL in status page");
            TunnelError::not_found(dump_debug_page(&html))
        })?;

        let endpoint = TunnelEndpoint::from_url(&url, "ssh")?;
        tracing::info!(url = %endpoint.url(), "found tunnel");
        Ok(endpoint)
    }

    /// Re-fetch the status page and check the endpoint is still listed.
    ///
    /// Liveness probe only; not part of the main resolution path. Any
    /// failure is reported as "not active".
    #[must_use]
    pub fn verify_tunnel_active(&self, endpoint: &TunnelEndpoint) -> bool {
        let fetched = self
            .session
            .client()
            .get(self.status_url())
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text);
        match fetched {
            Ok(html) => html.contains(endpoint.url()),
            Err(err) => {
                tracing::warn!(%err, "tunnel liveness check failed");
                false
            }
        }
    }

    /// Opportunistically fetch the account auth token from `/auth`.
    ///
    /// `None` on any failure; nothing depends on this value.
    #[must_use]
    pub fn get_auth_token(&self) -> Option<String> {
        let auth_url = format!("{}/auth", self.session.base_url());
        let html = self
            .session
            .client()
            .get(&auth_url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text);
        match html {
            Ok(html) => {
                let token = extract_auth_token(&html);
                if token.is_none() {
                    tracing::warn!("auth token not found on auth page");
                }
                token
            }
            Err(err) => {
                tracing::warn!(%err, "failed to fetch auth page");
                None
            }
        }
    }
}

/// Persist an unparseable status page for diagnosis. Best-effort; any
/// failure is swallowed.
fn dump_debug_page(html: &str) -> Option<PathBuf> {
    let dir = config::logs_dir()?;
    fs::create_dir_all(&dir).ok()?;
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("tunnel_status_debug_{timestamp}.html"));
    fs::write(&path, html).ok()?;
    tracing::debug!(path = %path.display(), "dumped status page for diagnosis");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_url() {
        let ep = TunnelEndpoint::from_url("tcp://7.tcp.vip.cpolar.cn:12766", "ssh").unwrap();
        assert_eq!(ep.hostname(), "7.tcp.vip.cpolar.cn");
        assert_eq!(ep.port(), 12766);
        assert_eq!(ep.name(), "ssh");
        assert!(ep.active());
    }

    #[test]
    fn endpoint_url_is_canonical() {
        // The invariant url == "tcp://" + hostname + ":" + port holds even
        // when the input used the bare secondary form.
        let ep = TunnelEndpoint::from_url("35.tcp.cpolar.top:12211", "ssh").unwrap();
        assert_eq!(
            ep.url(),
            format!("tcp://{}:{}", ep.hostname(), ep.port())
        );
    }

    #[test]
    fn endpoint_rejects_invalid_url() {
        assert!(TunnelEndpoint::from_url("http://example.com", "ssh").is_err());
        assert!(TunnelEndpoint::from_url("tcp://example.com:abc", "ssh").is_err());
    }

    #[test]
    fn endpoint_display() {
        let ep = TunnelEndpoint::from_url("tcp://example.com:22", "ssh").unwrap();
        assert_eq!(ep.to_string(), "example.com:22 (ssh)");
    }
}
