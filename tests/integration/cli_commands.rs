use predicates::prelude::*;
use test_support::{cmd_bin, fixtures_dir, tempdir};

#[test]
fn help_lists_every_command() {
  let td = tempdir();
  cmd_bin("timecard-sync", td.path())
    .arg("--help")
    .assert()
    .success()
    .stdout(
      predicate::str::contains("import")
        .and(predicate::str::contains("submit"))
        .and(predicate::str::contains("update-accounts"))
        .and(predicate::str::contains("encode-password")),
    );
}

#[test]
fn encode_password_reads_stdin() {
  let td = tempdir();
  cmd_bin("timecard-sync", td.path())
    .arg("encode-password")
    .write_stdin("secret\n")
    .assert()
    .success()
    .stdout("c2VjcmV0\n");
}

#[test]
fn unnamed_task_code_stops_submit_before_any_request() {
  let td = tempdir();
  let mapping = fixtures_dir().join("mapping/task_mapping_unnamed.json");
  cmd_bin("timecard-sync", td.path())
    .args(["submit", "--yes", "--task-mapping"])
    .arg(&mapping)
    .assert()
    .failure()
    .stderr(predicate::str::contains("N0003"));
}

#[test]
fn submit_names_the_missing_setting() {
  let td = tempdir();
  let mapping = fixtures_dir().join("mapping/task_mapping.json");
  cmd_bin("timecard-sync", td.path())
    .args(["submit", "--yes", "--task-mapping"])
    .arg(&mapping)
    .assert()
    .failure()
    .stderr(predicate::str::contains("JIRA_URL"));
}

#[test]
fn ambiguous_import_window_is_rejected() {
  let td = tempdir();
  cmd_bin("timecard-sync", td.path())
    .args(["import", "--month", "2024-04", "--for", "last week"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Ambiguous time selection"));
}

#[test]
fn missing_command_is_an_error() {
  let td = tempdir();
  cmd_bin("timecard-sync", td.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("Provide a command"));
}
