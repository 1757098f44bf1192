//! Process-wide defaults.
//!
//! These never change at runtime. `AgentConfig` starts from them and lets
//! the environment override the few that differ between hosts.

/// Launcher used to run a command line as another account: `<launcher> <user> -c <line>`.
pub const DEFAULT_LAUNCHER: &str = "/sbin/runuser";

/// Account commands run as when a resource does not name one.
pub const DEFAULT_USER: &str = "root";

/// POSIX shell used when no privilege switch is required.
pub const DEFAULT_SHELL: &str = "/bin/sh";

pub const ENV_KEY_PATH: &str = "PATH";

pub const ENV_LAUNCHER: &str = "HOSTFORM_LAUNCHER";
pub const ENV_DEFAULT_USER: &str = "HOSTFORM_DEFAULT_USER";
pub const ENV_SHELL: &str = "HOSTFORM_SHELL";

pub const DEFAULT_MODE_DIR: u32 = 0o755;
pub const DEFAULT_MODE_FILE: u32 = 0o644;
pub const DEFAULT_MODE_LINK: u32 = 0o777;

/// Highest permission value a resource may declare (setuid, setgid, sticky and rwx bits).
pub const MAX_MODE: u32 = 0o7777;
