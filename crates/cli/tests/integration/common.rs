//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// The user running the tests, so commands never need a privilege switch.
pub fn current_user() -> String {
  let output = std::process::Command::new("id").arg("-un").output().unwrap();
  String::from_utf8(output.stdout).unwrap().trim().to_string()
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory. Fixtures refer to it as `{{root}}`.
pub struct TestEnv {
  pub temp: TempDir,
  pub resources_path: PathBuf,
}

impl TestEnv {
  /// Create from a fixture file.
  ///
  /// Copies the fixture content to a temporary `resources.json`, with `{{root}}`
  /// replaced by the temp directory.
  pub fn from_fixture(name: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let resources_path = temp.path().join("resources.json");
    let content = fixture_content(name).replace("{{root}}", &temp.path().display().to_string());
    std::fs::write(&resources_path, content).unwrap();
    Self { temp, resources_path }
  }

  /// Create with the given resource file content.
  pub fn with_resources(content: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let resources_path = temp.path().join("resources.json");
    std::fs::write(&resources_path, content).unwrap();
    Self { temp, resources_path }
  }

  /// Path inside the temp directory.
  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Get a pre-configured Command for the hostform binary.
  ///
  /// Sets `HOSTFORM_DEFAULT_USER` to the current user so commands run directly
  /// through the shell.
  pub fn hostform_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("hostform");
    cmd.env("HOSTFORM_DEFAULT_USER", current_user());
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// `hostform <subcommand> <resources file>`.
  pub fn run(&self, subcommand: &str) -> Command {
    let mut cmd = self.hostform_cmd();
    cmd.arg(subcommand).arg(&self.resources_path);
    cmd
  }
}
