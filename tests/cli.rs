// End-to-end checks of the mess-oracle binary.

use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::TempDir;

fn fixture_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mess = dir.path().join("mess");
    let xml = dir.path().join("xml");
    fs::create_dir(&mess).unwrap();
    fs::create_dir(&xml).unwrap();

    fs::write(mess.join("ok.mss"), "Map { background-color: white; }").unwrap();
    fs::write(
        xml.join("ok.xml"),
        "<Map background-color=\"white\" srs=\"+init=epsg:3857\"/>",
    )
    .unwrap();
    fs::write(mess.join("bad.mss"), "#road { line-width: ").unwrap();
    fs::write(
        xml.join("bad.json"),
        r#"[{"kind": "ParseError", "message": "unexpected end of input", "line": 1}]"#,
    )
    .unwrap();
    dir
}

fn oracle(root: &Path, subcommand: &str) -> Command {
    let mut cmd = Command::cargo_bin("mess-oracle").unwrap();
    cmd.arg(subcommand)
        .arg("--source-dir")
        .arg(root.join("mess"))
        .arg("--expected-errors")
        .arg(root.join("xml"))
        .arg("--expected-output")
        .arg(root.join("xml"));
    cmd
}

/// A stand-in compiler: fails on any source mentioning `line-width`.
#[cfg(unix)]
const FAKE_COMPILER: &str = r#"
if grep -q 'line-width'; then
  printf '{"errors":[{"kind":"ParseError","message":"unexpected end of input","line":1}]}'
else
  cat <<'JSON'
{"output": "<Map srs=\"+init=epsg:3857\" background-color=\"white\"></Map>"}
JSON
fi
"#;

#[test]
fn list_shows_fixture_kinds() {
    let dir = fixture_tree();
    fs::write(dir.path().join("mess").join("lonely.mss"), "").unwrap();

    oracle(dir.path(), "list")
        .assert()
        .success()
        .stdout(contains("error   bad"))
        .stdout(contains("none    lonely"))
        .stdout(contains("output  ok"));
}

#[test]
fn canonicalize_prints_sorted_tree() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("style.xml");
    fs::write(&file, "<Style name=\"a\" b=\"2\">\n  hi\n</Style>").unwrap();

    Command::cargo_bin("mess-oracle")
        .unwrap()
        .arg("canonicalize")
        .arg(&file)
        .assert()
        .success()
        .stdout("<Map>\n  <Style b=\"2\" name=\"a\">\n    \"hi\"\n  </Style>\n</Map>\n");
}

#[test]
fn missing_source_dir_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("mess-oracle")
        .unwrap()
        .arg("list")
        .arg("--source-dir")
        .arg(dir.path().join("absent"))
        .assert()
        .code(2)
        .stderr(contains("mess_oracle::discovery").or(contains("failed to enumerate")));
}

#[test]
fn bad_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("oracle.yaml");
    fs::write(&config, "extension: .mss\n").unwrap();

    Command::cargo_bin("mess-oracle")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .code(2)
        .stderr(contains("configuration error"));
}

#[cfg(unix)]
#[test]
fn run_passes_when_every_fixture_matches() {
    let dir = fixture_tree();

    oracle(dir.path(), "run")
        .args(["--no-color", "--compiler", "sh", "--compiler-arg", "-c"])
        .arg("--compiler-arg")
        .arg(FAKE_COMPILER)
        .assert()
        .success()
        .stdout(contains("PASS: bad passed test."))
        .stdout(contains("PASS: ok passed test."))
        .stdout(contains("All 2 fixtures passed."));
}

#[cfg(unix)]
#[test]
fn run_reports_failure_count_and_exit_code() {
    let dir = fixture_tree();
    fs::write(dir.path().join("mess").join("orphan.mss"), "Map {}").unwrap();
    fs::write(
        dir.path().join("xml").join("ok.xml"),
        "<Map background-color=\"black\"/>",
    )
    .unwrap();

    oracle(dir.path(), "run")
        .args(["--no-color", "--compiler", "sh", "--compiler-arg", "-c"])
        .arg("--compiler-arg")
        .arg(FAKE_COMPILER)
        .assert()
        .code(1)
        .stdout(contains("FAIL: ok: output differs from expected output"))
        .stdout(contains("FAIL: orphan: compiled but no expected output recorded"))
        .stdout(contains("2 of 3 compilations failed."));
}

#[cfg(unix)]
#[test]
fn run_json_summary() {
    let dir = fixture_tree();

    oracle(dir.path(), "run")
        .args(["--json", "--compiler", "sh", "--compiler-arg", "-c"])
        .arg("--compiler-arg")
        .arg(FAKE_COMPILER)
        .assert()
        .success()
        .stdout(contains("\"failed\": 0"))
        .stdout(contains("\"verdict\": \"pass\""));
}

#[cfg(unix)]
#[test]
fn crashing_compiler_fails_every_case_without_aborting() {
    let dir = fixture_tree();

    oracle(dir.path(), "run")
        .args(["--no-color", "--compiler", "sh", "--compiler-arg", "-c"])
        .args(["--compiler-arg", "cat >/dev/null; echo boom >&2; exit 3"])
        .assert()
        .code(1)
        .stdout(contains("CompilerCrash"))
        .stdout(contains("2 of 2 compilations failed."));
}
