//! Check and describe command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn check_accepts_valid_resources_without_applying() {
  let env = TestEnv::from_fixture("files.json");

  env
    .run("check")
    .assert()
    .success()
    .stdout(predicate::str::contains("3 resource(s) valid"));

  assert!(!env.path("srv").exists());
}

#[test]
fn check_reports_every_invalid_resource() {
  let env = TestEnv::from_fixture("invalid.json");

  env
    .run("check")
    .assert()
    .failure()
    .stdout(predicate::str::contains("fine (ok)"))
    .stderr(predicate::str::contains("relative path (invalid): file path is relative"))
    .stderr(predicate::str::contains("file permission is invalid: rw-r--r--"))
    .stderr(predicate::str::contains("unknown file type `socket`"))
    .stderr(predicate::str::contains("3 of 4 resource(s) are invalid"));
}

#[test]
fn check_does_not_run_commands() {
  let env = TestEnv::from_fixture("commands.json");

  env.run("check").assert().success();
  assert!(!env.path("marker").exists());
}

#[test]
fn describe_prints_each_resource() {
  let env = TestEnv::from_fixture("files.json");

  env
    .run("describe")
    .assert()
    .success()
    .stdout(predicate::str::contains("[2] File: app config"))
    .stdout(predicate::str::contains("config.ini"))
    .stdout(predicate::str::contains("permission:  0640"))
    .stdout(predicate::str::contains("target:"));
}
