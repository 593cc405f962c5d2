use std::path::Path;
use std::process::{Command, Output};

fn josephine(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_josephine"))
        .arg("--config-dir")
        .arg(config_dir)
        .args(args)
        .env_remove("OWNER_NUMBER")
        .env_remove("AUTH_DIR")
        .env_remove("WHATSAPP_BRIDGE_URL")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run josephine")
}

fn write_config(dir: &Path, json: &str) {
    std::fs::write(dir.join("config.json"), json).expect("write config");
}

#[test]
fn test_script_command_prints_table() {
    let dir = tempfile::tempdir().unwrap();
    let output = josephine(dir.path(), &["script"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("All reachable steps have content."));
    assert!(stdout.contains("4 (TrackChoice)"));
    assert!(stdout.contains("selects business"));
    assert!(stdout.contains("16 (Farewell)"));
}

#[test]
fn test_status_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let output = josephine(dir.path(), &["status"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Josephine Status"));
    assert!(stdout.contains("Cooldown: 120 minutes"));
    assert!(stdout.contains("Resume keyword: resume"));
}

#[test]
fn test_status_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), r#"{"dialogue": {"cooldown_secs": 0}}"#);

    let output = josephine(dir.path(), &["status"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("dialogue.cooldown_secs must be > 0"));
}

#[test]
fn test_channel_status_reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"{
            "operator": {"id": "255700000002@s.whatsapp.net"},
            "channels": {"whatsapp": {
                "enabled": true,
                "bridge_url": "ws://localhost:4001",
                "allow_from": ["255700000001"]
            }}
        }"#,
    );

    let output = josephine(dir.path(), &["channels", "status"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Bridge: ws://localhost:4001"));
    assert!(stdout.contains("Allowed senders: 255700000001"));
    assert!(stdout.contains("Auth directory: ./auth_info"));
}

#[test]
fn test_enabled_whatsapp_requires_owner() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), r#"{"channels": {"whatsapp": {"enabled": true}}}"#);

    let output = josephine(dir.path(), &["channels", "status"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("set OWNER_NUMBER"));
}
