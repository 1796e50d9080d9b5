// End-to-end CLI checks that run without a destination tenant.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;

fn sasesync() -> Command {
    let mut cmd = Command::cargo_bin("sasesync").expect("binary builds");
    // Keep ambient config out of the tests.
    cmd.env_remove("SASESYNC_PROFILE")
        .env_remove("SASESYNC_OUTPUT")
        .env_remove("SASESYNC_CONFIG_FILE")
        .env("NO_COLOR", "1");
    cmd
}

fn write_snapshot() -> tempfile::NamedTempFile {
    let capture = json!({
        "source_tenant": "acme-prod",
        "items": [
            {
                "kind": "ike-crypto-profile", "name": "IKE-1", "location": "global",
                "fields": { "hash": ["sha256"] }
            },
            {
                "kind": "ipsec-crypto-profile", "name": "ESP-1", "location": "global",
                "fields": { "esp": { "encryption": ["aes-256-gcm"] } }
            },
            {
                "kind": "ike-gateway", "name": "GW-1", "location": "global",
                "fields": { "protocol": { "ikev2": { "ikeCryptoProfile": "IKE-1" } } }
            },
            {
                "kind": "ipsec-tunnel", "name": "T-1", "location": "global",
                "fields": {
                    "autoKey": {
                        "ikeGateway": [ { "name": "GW-1" } ],
                        "ipsecCryptoProfile": "ESP-1"
                    }
                }
            },
            {
                "kind": "service-connection", "name": "SC-1", "location": "global",
                "fields": { "ipsecTunnel": "T-1" }
            }
        ]
    });

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(capture.to_string().as_bytes())
        .expect("write snapshot");
    file
}

#[test]
fn help_lists_subcommands() {
    sasesync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("conflicts"));
}

#[test]
fn offline_plan_orders_dependencies_first() {
    let snapshot = write_snapshot();
    sasesync()
        .args(["plan", "--assume-new", "-o", "plain"])
        .args(["-f", &snapshot.path().display().to_string()])
        .args(["-s", "service-connection:global:SC-1"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "ike-crypto-profile:global:IKE-1\n\
             ipsec-crypto-profile:global:ESP-1\n\
             ike-gateway:global:GW-1\n\
             ipsec-tunnel:global:T-1\n\
             service-connection:global:SC-1\n",
        ));
}

#[test]
fn offline_plan_renders_json() {
    let snapshot = write_snapshot();
    let output = sasesync()
        .args(["plan", "--assume-new", "-o", "json"])
        .args(["-f", &snapshot.path().display().to_string()])
        .output()
        .expect("command runs");
    assert!(output.status.success());

    let view: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(view["create"].as_array().map(Vec::len), Some(5));
    assert_eq!(view["delete"].as_array().map(Vec::len), Some(0));
    assert_eq!(view["create"][0]["op"], "create");
}

#[test]
fn bad_selector_is_a_usage_error() {
    let snapshot = write_snapshot();
    sasesync()
        .args(["plan", "--assume-new"])
        .args(["-f", &snapshot.path().display().to_string()])
        .args(["-s", "not-a-selector"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("selector"));
}

#[test]
fn selection_outside_the_snapshot_fails() {
    let snapshot = write_snapshot();
    sasesync()
        .args(["plan", "--assume-new"])
        .args(["-f", &snapshot.path().display().to_string()])
        .args(["-s", "address:global:no-such-item"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not in the snapshot"));
}

#[test]
fn missing_snapshot_file_fails() {
    sasesync()
        .args(["plan", "--assume-new", "-f", "/no/such/capture.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not read"));
}

#[test]
fn unknown_inventory_kind_is_a_usage_error() {
    sasesync()
        .args(["inventory", "widget"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown configuration kind"));
}

#[test]
fn push_without_profile_reports_missing_profile() {
    let snapshot = write_snapshot();
    let config = tempfile::NamedTempFile::new().expect("temp config");
    sasesync()
        .args(["push", "-f", &snapshot.path().display().to_string()])
        .args(["--config", &config.path().display().to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile"));
}

#[test]
fn completions_cover_the_command_tree() {
    sasesync()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sasesync"));
}
