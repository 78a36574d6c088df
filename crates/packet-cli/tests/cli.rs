#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn packet() -> Command {
    let mut cmd = Command::cargo_bin("packet").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("PACKET_REMOTE")
        .env_remove("PACKET_REMOTE_DIR");
    cmd
}

fn seed_workspace(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("plugin")).unwrap();
    fs::write(root.join("src/main.txt"), "main").unwrap();
    fs::write(root.join("src/skip.tmp"), "tmp").unwrap();
    fs::write(root.join("plugin/ext.txt"), "ext").unwrap();
    fs::write(
        root.join("packet.yaml"),
        r#"name: app
ver: 1.2.0
targets:
  - path: "src/*"
    exclude: "*.tmp"
packets:
  - name: plugin
    ver: 0.1.0
    targets:
      - path: "plugin/*.txt"
"#,
    )
    .unwrap();
}

#[test]
fn test_version_flag() {
    packet()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("packet"));
}

#[test]
fn test_create_without_upload_writes_archives() {
    let dir = tempdir().unwrap();
    seed_workspace(dir.path());

    packet()
        .current_dir(dir.path())
        .args(["create", "packet.yaml", "--no-upload", "--format", "tgz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app-1.2.0.tgz"))
        .stdout(predicate::str::contains("plugin-0.1.0.tgz"));

    assert!(dir.path().join("app-1.2.0.tgz").exists());
    assert!(dir.path().join("plugin-0.1.0.tgz").exists());
}

#[test]
fn test_create_then_update_over_file_remote() {
    let work = tempdir().unwrap();
    seed_workspace(work.path());
    let store = tempdir().unwrap();
    let remote = format!("file://{}", store.path().display());

    packet()
        .current_dir(work.path())
        .args(["create", "packet.yaml", "--remote", &remote, "--remote-dir", "packets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("published packets/app-1.2.0.zip"));
    assert!(store.path().join("packets/plugin-0.1.0.zip").exists());

    let requests = work.path().join("packages.json");
    fs::write(
        &requests,
        r#"{"packages": [{"name": "app", "ver": ">=1.0"}, {"name": "plugin"}]}"#,
    )
    .unwrap();
    let dest = work.path().join("installed");

    packet()
        .args(["update"])
        .arg(&requests)
        .arg("--dest")
        .arg(&dest)
        .args(["--remote", &remote, "--remote-dir", "packets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed app 1.2.0"));

    assert_eq!(
        fs::read_to_string(dest.join("app/src/main.txt")).unwrap(),
        "main"
    );
    assert!(!dest.join("app/src/skip.tmp").exists());
    assert_eq!(
        fs::read_to_string(dest.join("plugin/plugin/ext.txt")).unwrap(),
        "ext"
    );
}

#[test]
fn test_unknown_format_is_config_error() {
    let dir = tempdir().unwrap();
    seed_workspace(dir.path());

    packet()
        .current_dir(dir.path())
        .args(["create", "packet.yaml", "--no-upload", "--format", "rar"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("possible values: zip, tar.gz, tgz"));
    assert!(!dir.path().join("app-1.2.0.zip").exists());
}

#[test]
fn test_create_help_explains_working_directory_root() {
    packet()
        .args(["create", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("../shared/*"))
        .stdout(predicate::str::contains("tar.gz"));
}

#[test]
fn test_nothing_collected_is_config_error() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("packet.json"),
        r#"{"name": "empty", "ver": "1.0.0", "targets": [{"path": "nothing/*"}]}"#,
    )
    .unwrap();

    packet()
        .current_dir(dir.path())
        .args(["create", "packet.json", "--no-upload"])
        .assert()
        .code(1);
}

#[test]
fn test_update_bad_constraint_fails_only_its_package() {
    let work = tempdir().unwrap();
    seed_workspace(work.path());
    let store = tempdir().unwrap();
    let remote = format!("file://{}", store.path().display());

    packet()
        .current_dir(work.path())
        .args(["create", "packet.yaml", "--remote", &remote])
        .assert()
        .success();

    let requests = work.path().join("packages.json");
    fs::write(
        &requests,
        r#"{"packages": [{"name": "app", "ver": "^1"}, {"name": "plugin", "ver": "not a range"}]}"#,
    )
    .unwrap();
    let dest = work.path().join("installed");

    packet()
        .arg("update")
        .arg(&requests)
        .arg("--dest")
        .arg(&dest)
        .args(["--remote", &remote])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("not a range"));

    assert_eq!(
        fs::read_to_string(dest.join("app/src/main.txt")).unwrap(),
        "main"
    );
    assert!(!dest.join("plugin").exists());
}

#[test]
fn test_update_missing_package_is_partial_failure() {
    let work = tempdir().unwrap();
    let store = tempdir().unwrap();
    let remote = format!("file://{}", store.path().display());
    let requests = work.path().join("packages.json");
    fs::write(&requests, r#"{"packages": [{"name": "ghost", "ver": "^1"}]}"#).unwrap();

    packet()
        .arg("update")
        .arg(&requests)
        .arg("--dest")
        .arg(work.path().join("out"))
        .args(["--remote", &remote])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_create_requires_remote_unless_no_upload() {
    let dir = tempdir().unwrap();
    seed_workspace(dir.path());

    packet()
        .current_dir(dir.path())
        .args(["create", "packet.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no remote store"));
}
