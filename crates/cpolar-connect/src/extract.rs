//! HTML endpoint extraction.
//!
//! Pure functions over raw dashboard HTML: CSRF token scraping from the
//! login page, tunnel URL selection from the status table, and host/port
//! splitting. No network access and no state; markup drift in the dashboard
//! is a one-module fix.
//!
//! Extraction is structural first (tag/attribute selectors), with regex
//! fallbacks where the original pages embed values in free text.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::TunnelError;

/// Tunnel names excluded from selection by default. The free tier commonly
/// carries a `remoteDesktop` tunnel on the same account that must never be
/// mistaken for the SSH forward.
pub const DEFAULT_SKIP_TUNNELS: &[&str] = &["remoteDesktop"];

/// Anchored `tcp://<host>:<port>` pattern used for row filtering.
fn tcp_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^tcp://[A-Za-z0-9.\-]+:\d+").expect("hard-coded regex"))
}

/// Strict `tcp://<host>:<port>` splitter, with the bare `<host>:<port>`
/// secondary form.
fn host_port_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:tcp://)?([A-Za-z0-9.\-]+):(\d+)$").expect("hard-coded regex")
    })
}

/// `authtoken: <token>` free-text pattern on the auth page.
fn authtoken_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"authtoken:\s*([A-Za-z0-9_\-]+)").expect("hard-coded regex"))
}

/// Extract the CSRF token from a login page.
///
/// Looks for a hidden `<input name="csrf_token">` first, then falls back to
/// a `<meta name="csrf-token">` tag. Returns `None` when neither exists;
/// the caller decides whether that is fatal.
#[must_use]
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    let input_sel = Selector::parse(r#"input[name="csrf_token"]"#).ok()?;
    if let Some(token) = doc
        .select(&input_sel)
        .next()
        .and_then(|el| el.value().attr("value"))
        .filter(|v| !v.is_empty())
    {
        return Some(token.to_string());
    }

    let meta_sel = Selector::parse(r#"meta[name="csrf-token"]"#).ok()?;
    doc.select(&meta_sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Extract the SSH tunnel URL from a status page.
///
/// The status table lists (name, URL, region, local address, created at)
/// rows, where the URL column is a `<th scope="row">` rather than a `<td>`.
/// Selection policy, in order:
///
/// 1. a row whose name is not in `skip_names`, whose URL matches
///    `tcp://<host>:<port>`, and whose local address forwards to port 22;
/// 2. the first row not in `skip_names` whose URL matches the TCP pattern,
///    regardless of local port;
/// 3. `None`.
#[must_use]
pub fn extract_tunnel_url(html: &str, skip_names: &[&str]) -> Option<String> {
    let doc = Html::parse_document(html);
    let table_sel = Selector::parse("table").ok()?;
    let row_sel = Selector::parse("tr").ok()?;
    let cell_sel = Selector::parse("td, th").ok()?;
    let tcp = tcp_url_pattern();

    // Pass 1: prefer the row that forwards to a local SSH server.
    for table in doc.select(&table_sel) {
        for row in table.select(&row_sel) {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            // Header rows are all-<th>; data rows start with a <td> name cell.
            if cells.len() < 5 || cells[0].value().name() != "td" {
                continue;
            }
            let name = cell_text(cells[0]);
            let url = cell_text(cells[1]);
            let local_addr = cell_text(cells[3]);

            if skip_names.contains(&name.as_str()) {
                tracing::debug!(tunnel = %name, "skipping tunnel by name");
                continue;
            }
            if tcp.is_match(&url) && local_addr.contains(":22") {
                tracing::debug!(%url, tunnel = %name, "found SSH tunnel via table");
                return Some(url);
            }
        }
    }

    // Pass 2: fall back to any TCP tunnel not in the skip list.
    for table in doc.select(&table_sel) {
        for row in table.select(&row_sel) {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            if cells.len() < 2 || cells[0].value().name() != "td" {
                continue;
            }
            let name = cell_text(cells[0]);
            let url = cell_text(cells[1]);

            if skip_names.contains(&name.as_str()) {
                continue;
            }
            if tcp.is_match(&url) {
                tracing::debug!(%url, tunnel = %name, "found TCP tunnel via fallback");
                return Some(url);
            }
        }
    }

    None
}

/// Split a tunnel URL into hostname and port.
///
/// Accepts the strict `tcp://<host>:<port>` form and the bare
/// `<host>:<port>` secondary form; anything else (missing port, non-numeric
/// port, out-of-range port, garbage) is invalid.
pub fn split_host_port(url: &str) -> std::result::Result<(String, u16), TunnelError> {
    let caps = host_port_pattern()
        .captures(url.trim())
        .ok_or_else(|| TunnelError::invalid_url(url))?;

    let hostname = caps[1].to_string();
    let port: u32 = caps[2]
        .parse()
        .map_err(|_| TunnelError::invalid_url(url))?;
    if port == 0 || port > u32::from(u16::MAX) {
        return Err(TunnelError::invalid_url(url));
    }

    Ok((hostname, port as u16))
}

/// Extract the account auth token from the `/auth` page.
///
/// Looks for `<input id="authtoken">`, then falls back to scanning
/// `<code>`/`<pre>` blocks for an `authtoken: <value>` line. Used only
/// opportunistically; `None` is an ordinary outcome.
#[must_use]
pub fn extract_auth_token(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    let input_sel = Selector::parse("input#authtoken").ok()?;
    if let Some(token) = doc
        .select(&input_sel)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(token.to_string());
    }

    let code_sel = Selector::parse("code, pre").ok()?;
    for el in doc.select(&code_sel) {
        let text: String = el.text().collect();
        if let Some(caps) = authtoken_pattern().captures(&text) {
            return Some(caps[1].to_string());
        }
    }

    None
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // HTML samples based on actual cpolar dashboard pages.

    const STATUS_HTML: &str = r##"
<table class="table table-sm">
 <thead>
  <tr>
   <th scope="col">隧道名称</th>
   <th scope="col">URL</th>
   <th scope="col">地区</th>
   <th scope="col">本地地址</th>
   <th scope="col">创建时间</th>
  </tr>
 </thead>
 <tbody>
  <tr>
   <td>default</td>
   <th scope="row">
    <a href="#ZgotmplZ" target="_blank">tcp://7.tcp.vip.cpolar.cn:12766</a>
   </th>
   <td>cn_vip</td>
   <td>tcp://127.0.0.1:22</td>
   <td>2026-01-28 09:51:32 +0800 CST</td>
  </tr>
  <tr>
   <td>website</td>
   <th scope="row">
    <a href="http://4cbb1683.r35.cpolar.top" target="_blank">http://4cbb1683.r35.cpolar.top</a>
   </th>
   <td>cn_top</td>
   <td>http://localhost:8080</td>
   <td>2026-01-28 10:03:51 +0800 CST</td>
  </tr>
  <tr>
   <td>remoteDesktop</td>
   <th scope="row">
    <a href="#ZgotmplZ" target="_blank">tcp://35.tcp.cpolar.top:12211</a>
   </th>
   <td>cn_top</td>
   <td>tcp://127.0.0.1:3389</td>
   <td>2026-01-28 10:03:53 +0800 CST</td>
  </tr>
 </tbody>
</table>
"##;

    const STATUS_HTML_ONLY_REMOTE_DESKTOP: &str = r##"
<table class="table table-sm">
 <thead>
  <tr>
   <th scope="col">隧道名称</th>
   <th scope="col">URL</th>
   <th scope="col">地区</th>
   <th scope="col">本地地址</th>
   <th scope="col">创建时间</th>
  </tr>
 </thead>
 <tbody>
  <tr>
   <td>remoteDesktop</td>
   <th scope="row">
    <a href="#ZgotmplZ" target="_blank">tcp://35.tcp.cpolar.top:12211</a>
   </th>
   <td>cn_top</td>
   <td>tcp://127.0.0.1:3389</td>
   <td>2026-01-28 10:03:53 +0800 CST</td>
  </tr>
 </tbody>
</table>
"##;

    const LOGIN_FORM_HTML: &str = r##"
<form action="/login" id="captcha-form" method="POST">
 <fieldset>
  <div class="control-group">
   <div class="controls">
    <input class="input-block-level" name="login" placeholder="邮箱地址" required="" type="email" value=""/>
   </div>
  </div>
  <div class="control-group">
   <input class="input-block-level" id="password" maxlength="20" name="password" placeholder="密码" required="" type="password" value=""/>
  </div>
 </fieldset>
 <input name="csrf_token" type="hidden" value="1538662349.68##b5aa35f374452a6198004dab20d88b13583c7c2c"/>
 <div>
  <button class="btn btn-primary btn-large" id="loginBtn" type="submit">登 录</button>
 </div>
</form>
"##;

    #[test]
    fn csrf_from_hidden_input() {
        let token = extract_csrf_token(LOGIN_FORM_HTML).unwrap();
        assert_eq!(
            token,
            "1538662349.68##b5aa35f374452a6198004dab20d88b13583c7c2c"
        );
    }

    #[test]
    fn csrf_token_format() {
        // Token format: timestamp##hash, both parts non-empty.
        let token = extract_csrf_token(LOGIN_FORM_HTML).unwrap();
        let parts: Vec<&str> = token.split("##").collect();
        assert_eq!(parts.len(), 2);
        assert!(!parts[0].is_empty());
        assert!(!parts[1].is_empty());
    }

    #[test]
    fn csrf_from_meta_tag_fallback() {
        let html = r#"<html><head><meta name="csrf-token" content="meta_token_123"></head></html>"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("meta_token_123"));
    }

    #[test]
    fn csrf_missing_is_none() {
        assert!(extract_csrf_token("<html><body>no form here</body></html>").is_none());
    }

    #[test]
    fn selects_ssh_tunnel_from_table() {
        let url = extract_tunnel_url(STATUS_HTML, DEFAULT_SKIP_TUNNELS).unwrap();
        assert_eq!(url, "tcp://7.tcp.vip.cpolar.cn:12766");
    }

    #[test]
    fn skips_remote_desktop_by_default() {
        let url = extract_tunnel_url(STATUS_HTML, DEFAULT_SKIP_TUNNELS).unwrap();
        assert!(!url.contains("12211"));
    }

    #[test]
    fn skips_http_tunnels() {
        let url = extract_tunnel_url(STATUS_HTML, DEFAULT_SKIP_TUNNELS).unwrap();
        assert!(url.starts_with("tcp://"));
        assert!(!url.contains("4cbb1683.r35.cpolar.top"));
    }

    #[test]
    fn empty_skip_list_falls_back_to_any_tcp_tunnel() {
        let url = extract_tunnel_url(STATUS_HTML_ONLY_REMOTE_DESKTOP, &[]).unwrap();
        assert_eq!(url, "tcp://35.tcp.cpolar.top:12211");
    }

    #[test]
    fn skip_listed_only_tunnel_is_not_selected() {
        assert!(extract_tunnel_url(STATUS_HTML_ONLY_REMOTE_DESKTOP, DEFAULT_SKIP_TUNNELS).is_none());
    }

    #[test]
    fn no_tunnel_rows_is_none() {
        assert!(extract_tunnel_url("<html><body><p>No tunnels here</p></body></html>", DEFAULT_SKIP_TUNNELS).is_none());
    }

    #[test]
    fn empty_table_is_none() {
        let html = r"
        <table class='table'>
         <thead><tr><th>Name</th><th>URL</th></tr></thead>
         <tbody></tbody>
        </table>
        ";
        assert!(extract_tunnel_url(html, DEFAULT_SKIP_TUNNELS).is_none());
    }

    #[test]
    fn split_standard_url() {
        let (host, port) = split_host_port("tcp://7.tcp.vip.cpolar.cn:12766").unwrap();
        assert_eq!(host, "7.tcp.vip.cpolar.cn");
        assert_eq!(port, 12766);
    }

    #[test]
    fn split_without_scheme_prefix() {
        let (host, port) = split_host_port("35.tcp.cpolar.top:12211").unwrap();
        assert_eq!(host, "35.tcp.cpolar.top");
        assert_eq!(port, 12211);
    }

    #[test]
    fn split_missing_port_is_invalid() {
        assert!(split_host_port("tcp://example.com").is_err());
    }

    #[test]
    fn split_non_numeric_port_is_invalid() {
        assert!(split_host_port("tcp://example.com:abc").is_err());
    }

    #[test]
    fn split_garbage_is_invalid() {
        assert!(split_host_port("invalid_url").is_err());
    }

    #[test]
    fn split_out_of_range_port_is_invalid() {
        assert!(split_host_port("tcp://example.com:0").is_err());
        assert!(split_host_port("tcp://example.com:70000").is_err());
    }

    #[test]
    fn auth_token_from_input_field() {
        let html = r#"<input id="authtoken" value="Zm9vYmFyLXRva2Vu"/>"#;
        assert_eq!(extract_auth_token(html).as_deref(), Some("Zm9vYmFyLXRva2Vu"));
    }

    #[test]
    fn auth_token_from_code_block() {
        let html = "<pre>./cpolar authtoken: abc123_-DEF</pre>";
        assert_eq!(extract_auth_token(html).as_deref(), Some("abc123_-DEF"));
    }

    #[test]
    fn auth_token_missing_is_none() {
        assert!(extract_auth_token("<html><body></body></html>").is_none());
    }
}
