//! Apply command integration tests.

use std::os::unix::fs::PermissionsExt;

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn apply_creates_files_directories_and_links() {
  let env = TestEnv::from_fixture("files.json");

  env
    .run("apply")
    .assert()
    .success()
    .stdout(predicate::str::contains("app config (changed)"))
    .stdout(predicate::str::contains("Apply complete"));

  let dir = env.path("srv/app");
  assert!(dir.is_dir());
  assert_eq!(std::fs::metadata(&dir).unwrap().permissions().mode() & 0o7777, 0o750);

  let config = env.path("srv/app/config.ini");
  assert_eq!(std::fs::read_to_string(&config).unwrap(), "[server]\nport = 8080\n");
  assert_eq!(std::fs::metadata(&config).unwrap().permissions().mode() & 0o7777, 0o640);

  assert_eq!(std::fs::read_link(env.path("srv/current")).unwrap(), dir);
}

#[test]
fn apply_is_idempotent() {
  let env = TestEnv::from_fixture("files.json");

  // First apply
  env.run("apply").assert().success();

  // Second apply should find nothing to do
  env
    .run("apply")
    .assert()
    .success()
    .stdout(predicate::str::contains("(changed)").not())
    .stdout(predicate::str::contains("Unchanged: 3"));
}

#[test]
fn apply_respects_command_guards() {
  let env = TestEnv::from_fixture("commands.json");

  env
    .run("apply")
    .assert()
    .success()
    .stdout(predicate::str::contains("write marker (changed)"))
    .stdout(predicate::str::contains("guarded by RunIf (skipped: RunIf"))
    .stdout(predicate::str::contains("guarded by NotRunIf (skipped: NotRunIf"))
    .stdout(predicate::str::contains("Skipped: 2"));

  assert_eq!(std::fs::read_to_string(env.path("marker")).unwrap(), "ran\n");
  assert!(!env.path("never").exists());
  assert!(!env.path("never-either").exists());
}

#[test]
fn apply_stops_at_first_failure() {
  let env = TestEnv::from_fixture("failing.json");

  env
    .run("apply")
    .assert()
    .failure()
    .stderr(predicate::str::contains("broken step (failed): something went wrong"))
    .stderr(predicate::str::contains("1 resource(s) not run"));

  assert!(!env.path("after").exists());
}

#[test]
fn apply_keep_going_runs_remaining_resources() {
  let env = TestEnv::from_fixture("failing.json");

  env
    .run("apply")
    .arg("--keep-going")
    .assert()
    .failure()
    .stderr(predicate::str::contains("1 of 2 resource(s) failed"));

  assert!(env.path("after").is_file());
}

#[test]
fn apply_json_output_reports_each_resource() {
  let env = TestEnv::from_fixture("commands.json");

  let output = env.run("apply").args(["--output", "json"]).output().unwrap();
  assert!(output.status.success());

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["changed"], 1);
  assert_eq!(summary["skipped"], 2);
  assert_eq!(summary["resources"][0]["status"], "changed");
  assert_eq!(summary["resources"][1]["status"], "skipped");
  assert_eq!(summary["resources"][1]["kind"], "Command");
}

#[test]
fn apply_reports_undecodable_records() {
  let env = TestEnv::with_resources(r#"[{"Type": "Package", "Brief": "nginx"}]"#);

  env
    .run("apply")
    .assert()
    .failure()
    .stderr(predicate::str::contains("nginx (failed): invalid resource description"));
}

#[test]
fn apply_requires_a_json_array() {
  let env = TestEnv::with_resources(r#"{"Type": "Command"}"#);

  env
    .run("apply")
    .assert()
    .failure()
    .stderr(predicate::str::contains("must contain a JSON array"));
}
