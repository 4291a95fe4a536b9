use assert_cmd::prelude::*;
use boardlens_dom::NodeSpec;
use boardlens_engine::fixture::{BoardFixture, CardOwner};
use boardlens_engine::resolve_owner_id;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn board_lens(settings: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("board-lens"));
    cmd.env_remove("BOARD_LENS_SETTINGS")
        .env("RUST_LOG", "warn")
        .arg("--settings")
        .arg(settings);
    cmd
}

fn write_board(dir: &Path) -> PathBuf {
    let board = BoardFixture::new()
        .column(Some("To Do"))
        .card("K-0", 10.0, CardOwner::named("Bob"))
        .card("K-1", 14.0, CardOwner::named("Alice"))
        .column(Some("Done"))
        .card("K-2", 300.0, CardOwner::named("Alice"))
        .card("K-3", 304.0, CardOwner::named("Alice"));
    let spec = NodeSpec::new("body").child(board.build());
    let path = dir.join("board.json");
    fs::write(&path, serde_json::to_string(&spec).unwrap()).unwrap();
    path
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join("board-lens.settings.json")
}

fn limit_alice(settings: &Path) {
    let alice = resolve_owner_id(None, "Alice");
    board_lens(settings)
        .args(["limits", "add-owner", "--user-id", &alice, "--name", "Alice"])
        .args(["--columns", "column-1", "--limit", "1"])
        .assert()
        .success()
        .stdout("owner-1\n");
    board_lens(settings)
        .args(["limits", "enable", "owner-limits"])
        .assert()
        .success();
}

#[test]
fn evaluate_prints_inferred_columns() {
    let tmp = TempDir::new().unwrap();
    let board = write_board(tmp.path());

    board_lens(&settings_path(tmp.path()))
        .arg("evaluate")
        .arg("--board")
        .arg(&board)
        .assert()
        .success()
        .stdout(predicate::str::contains("Columns (2):"))
        .stdout(predicate::str::contains("Alice"));
}

#[test]
fn evaluate_reports_exceeded_owner_limit_as_json() {
    let tmp = TempDir::new().unwrap();
    let board = write_board(tmp.path());
    let settings = settings_path(tmp.path());
    limit_alice(&settings);

    let output = board_lens(&settings)
        .arg("evaluate")
        .arg("--board")
        .arg(&board)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "applied");
    assert_eq!(report["ownerLimits"][0]["limitId"], "owner-1");
    assert_eq!(report["ownerLimits"][0]["currentCount"], 2);
    assert_eq!(report["ownerLimits"][0]["exceeded"], true);
    assert_eq!(report["annotations"]["highlightedCards"], 2);
}

#[test]
fn evaluate_writes_annotated_snapshot() {
    let tmp = TempDir::new().unwrap();
    let board = write_board(tmp.path());
    let settings = settings_path(tmp.path());
    limit_alice(&settings);
    let annotated = tmp.path().join("annotated.json");

    board_lens(&settings)
        .arg("evaluate")
        .arg("--board")
        .arg(&board)
        .arg("--output")
        .arg(&annotated)
        .assert()
        .success();

    let raw = fs::read_to_string(&annotated).unwrap();
    assert!(raw.contains("bl-wip-overloaded"));
    assert!(raw.contains("bl-avatar-indicator"));
}

#[test]
fn settings_path_comes_from_environment() {
    let tmp = TempDir::new().unwrap();
    let settings = settings_path(tmp.path());

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("board-lens"));
    cmd.env("BOARD_LENS_SETTINGS", &settings)
        .args(["limits", "add-group", "--name", "Development"])
        .args(["--columns", "column-0,column-1", "--limit", "5"])
        .assert()
        .success()
        .stdout("group-1\n");

    let raw = fs::read_to_string(&settings).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        stored["columnGroupWipLimits"]["limits"][0]["columnIds"],
        serde_json::json!(["column-0", "column-1"])
    );
}

#[test]
fn settings_file_name_is_enforced() {
    let tmp = TempDir::new().unwrap();
    board_lens(&tmp.path().join("other.json"))
        .args(["limits", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("settings file must be named"));
}

#[test]
fn limits_round_trip_through_the_file() {
    let tmp = TempDir::new().unwrap();
    let settings = settings_path(tmp.path());
    limit_alice(&settings);

    board_lens(&settings)
        .args(["limits", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Owner limits (on):"))
        .stdout(predicate::str::contains("owner-1"));

    board_lens(&settings)
        .args(["limits", "remove", "owner-1"])
        .assert()
        .success();
    board_lens(&settings)
        .args(["limits", "remove", "owner-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No limit with id owner-1"));
}

#[test]
fn colors_reject_invalid_values() {
    let tmp = TempDir::new().unwrap();
    let settings = settings_path(tmp.path());

    board_lens(&settings)
        .args(["colors", "set", "name:abc", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a #RRGGBB color"));
    board_lens(&settings)
        .args(["colors", "set", "name:abc", "#36B37E"])
        .assert()
        .success();

    let raw = fs::read_to_string(&settings).unwrap();
    assert!(raw.contains("#36B37E"));
}

#[test]
fn schema_describes_settings() {
    let tmp = TempDir::new().unwrap();
    board_lens(&settings_path(tmp.path()))
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("personalWipLimits"));
}

#[test]
fn watch_prints_initial_pass() {
    let tmp = TempDir::new().unwrap();
    let board = write_board(tmp.path());

    board_lens(&settings_path(tmp.path()))
        .arg("watch")
        .arg("--board")
        .arg(&board)
        .args(["--duration-ms", "300"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reason\":\"initial\""));
}
