//! Agent configuration.
//!
//! The engine reads its configuration once per process. Individual command
//! resources can carry their own copy, which is how tests point the engine
//! at a different launcher or shell without touching the environment.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::debug;

use crate::consts::{DEFAULT_LAUNCHER, DEFAULT_SHELL, DEFAULT_USER, ENV_DEFAULT_USER, ENV_LAUNCHER, ENV_SHELL};

static GLOBAL: OnceLock<AgentConfig> = OnceLock::new();

/// Settings shared by every command resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
  /// Privilege-switching launcher, invoked as `<launcher> <user> -c <line>`.
  pub launcher: PathBuf,

  /// Account used when a command resource leaves `User` unset.
  pub default_user: String,

  /// Shell used when the run-as account is the agent's own.
  pub shell: PathBuf,
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      launcher: PathBuf::from(DEFAULT_LAUNCHER),
      default_user: DEFAULT_USER.to_string(),
      shell: PathBuf::from(DEFAULT_SHELL),
    }
  }
}

impl AgentConfig {
  /// Build a configuration from the defaults, applying any `HOSTFORM_*` overrides.
  ///
  /// Empty values are ignored.
  pub fn from_env() -> Self {
    let mut config = Self::default();

    if let Some(launcher) = non_empty_var(ENV_LAUNCHER) {
      config.launcher = PathBuf::from(launcher);
    }
    if let Some(user) = non_empty_var(ENV_DEFAULT_USER) {
      config.default_user = user;
    }
    if let Some(shell) = non_empty_var(ENV_SHELL) {
      config.shell = PathBuf::from(shell);
    }

    config
  }

  /// The process-wide configuration, read from the environment on first use.
  pub fn global() -> &'static AgentConfig {
    GLOBAL.get_or_init(|| {
      let config = Self::from_env();
      debug!(launcher = ?config.launcher, default_user = %config.default_user, shell = ?config.shell, "agent config loaded");
      config
    })
  }
}

fn non_empty_var(key: &str) -> Option<String> {
  std::env::var(key).ok().filter(|v| !v.is_empty())
}
