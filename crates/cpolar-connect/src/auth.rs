//! Dashboard authentication session.
//!
//! The dashboard has no stable API, so login success is classified with a
//! dual deny/allow heuristic over the final URL and response body. The
//! deny-list is applied first to avoid false positives when a failure page
//! happens to echo a success keyword.
//!
//! Session identity is carried by cookies on a blocking HTTP client; a
//! session lives from a successful login until [`AuthSession::logout`] or
//! process end and is never persisted.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{AuthError, Result};
use crate::extract::extract_csrf_token;

/// Per-request timeout for dashboard HTTP calls.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// The dashboard rejects requests with a default client User-Agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Body phrases that always indicate a rejected login (checked first,
/// case-insensitive).
const FAILURE_PHRASES: &[&str] = &[
    "not valid",
    "login failed",
    "invalid credentials",
    "incorrect password",
    "authentication failed",
    "登录失败",
    "密码错误",
    "无效",
];

/// URL fragments of known post-login landing pages.
const SUCCESS_PATHS: &[&str] = &["/status", "/dashboard", "/get-started"];

/// Body keywords accepted as a success signal when the URL is inconclusive.
const SUCCESS_KEYWORDS: &[&str] = &["logout", "status", "dashboard", "tunnel", "隧道"];

/// Lifecycle of a dashboard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No login attempted yet.
    Unauthenticated,
    /// Login handshake in progress.
    Authenticating,
    /// Logged in; the cookie session is usable.
    Authenticated,
    /// Logged out; the session must not be reused.
    LoggedOut,
}

/// An authenticated dashboard session: cookie state plus base URL.
#[derive(Debug)]
pub struct AuthSession {
    client: Client,
    base_url: String,
    state: SessionState,
}

impl AuthSession {
    /// Perform the login handshake and return an authenticated session.
    ///
    /// GETs the login page, extracts the CSRF token (fatal if absent — the
    /// page contract is violated), POSTs the credentials, and classifies the
    /// response. Transport failures surface as [`crate::ConnectError::Network`],
    /// never as an authentication error.
    pub fn login(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let login_url = format!("{base_url}/login");

        tracing::debug!(url = %login_url, "fetching login page");
        let html = client.get(&login_url).send()?.error_for_status()?.text()?;
        let csrf_token = extract_csrf_token(&html).ok_or(AuthError::CsrfTokenMissing)?;
        tracing::debug!("csrf token obtained");

        let response = client
            .post(&login_url)
            .form(&[
                ("login", username),
                ("password", password),
                ("csrf_token", csrf_token.as_str()),
            ])
            .send()?;
        let final_url = response.url().to_string();
        let body = response.text()?;

        if !classify_login_response(&final_url, &body) {
            tracing::warn!(%final_url, "login rejected by dashboard");
            return Err(AuthError::login_rejected(username).into());
        }

        tracing::info!(%base_url, "logged in to dashboard");
        Ok(Self {
            client,
            base_url,
            state: SessionState::Authenticated,
        })
    }

    /// The cookie-bearing HTTP client for authenticated requests.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// The dashboard base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Best-effort logout. Failures are logged and swallowed; logout is
    /// cleanup, not a user-visible operation.
    pub fn logout(&mut self) {
        if self.state != SessionState::Authenticated {
            return;
        }
        let logout_url = format!("{}/logout", self.base_url);
        match self.client.get(&logout_url).send() {
            Ok(_) => tracing::debug!("logged out of dashboard"),
            Err(err) => tracing::debug!(%err, "logout request failed (ignored)"),
        }
        self.state = SessionState::LoggedOut;
    }
}

/// Classify a login POST response as success (`true`) or failure (`false`).
///
/// Order matters: the failure deny-list is checked before any success
/// signal, then a final URL still on `/login` fails, then a known landing
/// page succeeds, and only then are body keywords consulted.
#[must_use]
pub fn classify_login_response(final_url: &str, body: &str) -> bool {
    let body_lower = body.to_lowercase();
    if FAILURE_PHRASES.iter().any(|p| body_lower.contains(p)) {
        return false;
    }

    if final_url.contains("/login") {
        return false;
    }

    if SUCCESS_PATHS.iter().any(|p| final_url.contains(p)) {
        return true;
    }

    SUCCESS_KEYWORDS.iter().any(|k| body_lower.contains(k))
}
