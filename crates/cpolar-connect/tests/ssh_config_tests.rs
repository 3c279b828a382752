//! Integration tests for SSH config reconciliation.

use std::fs;

use cpolar_connect::ssh::reconcile_config;
use cpolar_connect::tunnel::TunnelEndpoint;

fn endpoint(url: &str) -> TunnelEndpoint {
    TunnelEndpoint::from_url(url, "ssh").unwrap()
}

#[test]
fn creates_file_with_header_and_block() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join(".ssh/config");
    let ep = endpoint("tcp://7.tcp.vip.cpolar.cn:12766");

    reconcile_config(
        &config,
        "cpolar",
        &ep,
        "alice",
        dir.path().join("id_rsa").as_path(),
        &[8888],
    )
    .unwrap();

    let text = fs::read_to_string(&config).unwrap();
    assert!(text.starts_with("# SSH config file\n"));
    assert!(text.contains("Host cpolar\n"));
    assert!(text.contains("\tHostName 7.tcp.vip.cpolar.cn\n"));
    assert!(text.contains("\tPort 12766\n"));
    assert!(text.contains("\tUser alice\n"));
    assert!(text.contains("\tLocalForward 8888 localhost:8888\n"));
    assert!(text.ends_with('\n'));
}

#[cfg(unix)]
#[test]
fn created_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join(".ssh/config");
    let ep = endpoint("tcp://example.com:22");

    reconcile_config(&config, "cpolar", &ep, "alice", dir.path().join("k").as_path(), &[]).unwrap();

    let file_mode = fs::metadata(&config).unwrap().permissions().mode() & 0o777;
    let dir_mode = fs::metadata(dir.path().join(".ssh")).unwrap().permissions().mode() & 0o777;
    assert_eq!(file_mode, 0o600);
    assert_eq!(dir_mode, 0o700);
}

#[test]
fn reconciling_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let key = dir.path().join("id_rsa");
    let ep = endpoint("tcp://7.tcp.vip.cpolar.cn:12766");

    reconcile_config(&config, "cpolar", &ep, "alice", &key, &[8888, 6666]).unwrap();
    let first = fs::read(&config).unwrap();
    reconcile_config(&config, "cpolar", &ep, "alice", &key, &[8888, 6666]).unwrap();
    let second = fs::read(&config).unwrap();

    assert_eq!(first, second);
}

#[test]
fn replaces_stale_endpoint_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let key = dir.path().join("id_rsa");

    reconcile_config(
        &config,
        "cpolar",
        &endpoint("tcp://7.tcp.vip.cpolar.cn:12766"),
        "alice",
        &key,
        &[],
    )
    .unwrap();
    reconcile_config(
        &config,
        "cpolar",
        &endpoint("tcp://3.tcp.cpolar.top:10022"),
        "alice",
        &key,
        &[],
    )
    .unwrap();

    let text = fs::read_to_string(&config).unwrap();
    assert!(text.contains("\tHostName 3.tcp.cpolar.top\n"));
    assert!(text.contains("\tPort 10022\n"));
    assert!(!text.contains("12766"));
    assert_eq!(text.matches("Host cpolar").count(), 1);
}

#[test]
fn unmanaged_blocks_keep_their_exact_lines() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let existing = "Host work\n    HostName work.example.com\n    User bob\n\n\
                    Host cpolar\n\tHostName old.cpolar.cn\n\tPort 1\n\n\
                    Host home\n    HostName home.example.com\n";
    fs::write(&config, existing).unwrap();

    reconcile_config(
        &config,
        "cpolar",
        &endpoint("tcp://7.tcp.vip.cpolar.cn:12766"),
        "alice",
        dir.path().join("id_rsa").as_path(),
        &[],
    )
    .unwrap();

    let text = fs::read_to_string(&config).unwrap();
    assert!(text.contains("Host work\n    HostName work.example.com\n    User bob\n"));
    assert!(text.contains("Host home\n    HostName home.example.com\n"));
    assert!(text.contains("\tHostName 7.tcp.vip.cpolar.cn\n"));
    assert!(!text.contains("old.cpolar.cn"));
}

#[test]
fn appends_block_when_alias_absent() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    fs::write(&config, "Host work\n    HostName work.example.com\n").unwrap();

    reconcile_config(
        &config,
        "cpolar",
        &endpoint("tcp://example.com:2222"),
        "alice",
        dir.path().join("id_rsa").as_path(),
        &[],
    )
    .unwrap();

    let text = fs::read_to_string(&config).unwrap();
    // Separated from the previous block by a blank line.
    assert!(text.contains("    HostName work.example.com\n\nHost cpolar\n"));
}

#[test]
fn similar_alias_is_not_touched() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    fs::write(&config, "Host cpolar-staging\n\tHostName staging.example.com\n").unwrap();

    reconcile_config(
        &config,
        "cpolar",
        &endpoint("tcp://example.com:2222"),
        "alice",
        dir.path().join("id_rsa").as_path(),
        &[],
    )
    .unwrap();

    let text = fs::read_to_string(&config).unwrap();
    assert!(text.contains("Host cpolar-staging\n\tHostName staging.example.com\n"));
    assert!(text.contains("Host cpolar\n\tHostName example.com\n"));
}
