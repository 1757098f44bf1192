//! Command resources.
//!
//! Runs a shell command line as a given account, optionally gated by guard
//! commands. Output is streamed into the log while the command runs: stdout
//! at debug, stderr at warn. Stderr is also collected so a failure can be
//! reported with what the command actually said.

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::consts::ENV_KEY_PATH;
use crate::platform::account::{is_effective_uid, lookup_uid};
use crate::resource::types::{ApplyError, ApplyOutcome, Logged, Phase, ValidationError};
use crate::resource::{Adapter, non_empty};

/// A shell command to run, optionally gated by guard commands.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CommandResource {
  pub brief: String,
  pub command: String,
  #[serde(deserialize_with = "non_empty")]
  pub cwd: Option<PathBuf>,
  /// Account to run as. Defaults to the configured default user at parse time.
  #[serde(deserialize_with = "non_empty")]
  pub user: Option<String>,
  /// `PATH` for the subprocess. Inherited from the agent when unset.
  #[serde(deserialize_with = "non_empty")]
  pub path: Option<String>,
  /// Run only if this command exits zero.
  #[serde(deserialize_with = "non_empty")]
  pub run_if: Option<String>,
  /// Run only if this command does not exit zero.
  #[serde(deserialize_with = "non_empty")]
  pub not_run_if: Option<String>,

  #[serde(skip)]
  config: Option<AgentConfig>,
  #[serde(skip)]
  phase: Phase,
}

/// Program and arguments for running one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<OsString>,
}

impl Invocation {
  /// `<shell> -c <line>` when already running as `user`, otherwise
  /// `<launcher> <user> -c <line>`.
  pub fn for_user(config: &AgentConfig, user: &str, runs_as_self: bool, line: &str) -> Self {
    if runs_as_self {
      Self {
        program: config.shell.clone(),
        args: vec!["-c".into(), line.into()],
      }
    } else {
      Self {
        program: config.launcher.clone(),
        args: vec![user.into(), "-c".into(), line.into()],
      }
    }
  }
}

impl CommandResource {
  pub fn new(brief: impl Into<String>, command: impl Into<String>) -> Self {
    Self {
      brief: brief.into(),
      command: command.into(),
      ..Self::default()
    }
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn user(mut self, user: impl Into<String>) -> Self {
    self.user = Some(user.into());
    self
  }

  pub fn path(mut self, path: impl Into<String>) -> Self {
    self.path = Some(path.into());
    self
  }

  pub fn run_if(mut self, line: impl Into<String>) -> Self {
    self.run_if = Some(line.into());
    self
  }

  pub fn not_run_if(mut self, line: impl Into<String>) -> Self {
    self.not_run_if = Some(line.into());
    self
  }

  /// Use `config` instead of the process-wide configuration.
  pub fn with_config(mut self, config: AgentConfig) -> Self {
    self.config = Some(config);
    self
  }

  fn config(&self) -> &AgentConfig {
    self.config.as_ref().unwrap_or_else(|| AgentConfig::global())
  }

  fn run_as(&self) -> &str {
    self.user.as_deref().unwrap_or(&self.config().default_user)
  }

  /// How `line` will be launched under this resource's user.
  pub fn invocation(&self, line: &str) -> Invocation {
    let user = self.run_as();
    let runs_as_self = lookup_uid(user).map(is_effective_uid).unwrap_or(false);
    Invocation::for_user(self.config(), user, runs_as_self, line)
  }

  fn build(&self, invocation: &Invocation) -> Command {
    let path = match &self.path {
      Some(path) => path.clone(),
      None => std::env::var(ENV_KEY_PATH).unwrap_or_default(),
    };

    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .env_clear()
      .env(ENV_KEY_PATH, path)
      .stdin(Stdio::null());

    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }

    command
  }

  fn validate(&self) -> Result<(), ValidationError> {
    if self.brief.is_empty() {
      return Err(ValidationError::EmptyBrief { kind: "command" });
    }

    if self.command.is_empty() {
      return Err(ValidationError::EmptyCommand);
    }

    if let Some(cwd) = &self.cwd {
      match std::fs::metadata(cwd) {
        Err(_) => return Err(ValidationError::CwdMissing(cwd.clone())),
        Ok(meta) if !meta.is_dir() => return Err(ValidationError::CwdNotDirectory(cwd.clone())),
        Ok(_) => {}
      }
    }

    if let Some(user) = &self.user {
      lookup_uid(user)?;
    }

    Ok(())
  }

  /// Evaluate a guard. Any failure to run it counts as the guard failing.
  async fn guard(&self, line: &str) -> bool {
    let invocation = self.invocation(line);
    let status = self
      .build(&invocation)
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status()
      .await;

    match status {
      Ok(status) => {
        debug!(guard = %line, status = %status, "guard finished");
        status.success()
      }
      Err(e) => {
        debug!(guard = %line, error = %e, "guard could not be started");
        false
      }
    }
  }

  async fn run_streaming(&self) -> Result<(), ApplyError> {
    let invocation = self.invocation(&self.command);
    debug!(program = ?invocation.program, user = %self.run_as(), cwd = ?self.cwd, "spawning command");

    let mut child = self
      .build(&invocation)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|source| {
        ApplyError::Spawn {
          program: invocation.program.clone(),
          source,
        }
        .logged()
      })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Both pipes are drained while the child runs so neither can fill up and block it.
    let stdout_task = async {
      if let Some(pipe) = stdout {
        drain_lines(pipe, |line| debug!(line = %line, "stdout")).await;
      }
    };
    let stderr_task = async {
      let mut collected = String::new();
      if let Some(pipe) = stderr {
        drain_lines(pipe, |line| {
          warn!(line = %line, "stderr");
          collected.push_str(&line);
          collected.push('\n');
        })
        .await;
      }
      collected
    };

    let ((), stderr_text, status) = tokio::join!(stdout_task, stderr_task, child.wait());
    let status = status.map_err(|e| ApplyError::Wait(e).logged())?;

    if status.success() {
      debug!(status = %status, "command succeeded");
      return Ok(());
    }

    if stderr_text.is_empty() {
      Err(ApplyError::Exited(status).logged())
    } else {
      Err(
        ApplyError::CommandFailed {
          stderr: stderr_text,
          status,
        }
        .logged(),
      )
    }
  }

  async fn execute(&self) -> Result<ApplyOutcome, ApplyError> {
    if let Some(run_if) = &self.run_if {
      if !self.guard(run_if).await {
        info!(brief = %self.brief, "skip running, RunIf returned false");
        return Ok(ApplyOutcome::Skipped {
          reason: format!("RunIf `{run_if}` returned false"),
        });
      }
    }

    if let Some(not_run_if) = &self.not_run_if {
      if self.guard(not_run_if).await {
        info!(brief = %self.brief, "skip running, NotRunIf returned true");
        return Ok(ApplyOutcome::Skipped {
          reason: format!("NotRunIf `{not_run_if}` returned true"),
        });
      }
    }

    self.run_streaming().await?;
    Ok(ApplyOutcome::Changed)
  }
}

/// Read `pipe` line by line until EOF or a read error, handing each line to `on_line`.
///
/// A final line without a trailing newline is still delivered.
async fn drain_lines<R, F>(pipe: R, mut on_line: F)
where
  R: AsyncRead + Unpin,
  F: FnMut(String),
{
  let mut segments = BufReader::new(pipe).split(b'\n');
  loop {
    match segments.next_segment().await {
      Ok(Some(mut segment)) => {
        if segment.last() == Some(&b'\r') {
          segment.pop();
        }
        on_line(String::from_utf8_lossy(&segment).into_owned());
      }
      Ok(None) => break,
      Err(e) => {
        debug!(error = %e, "stopped reading command output");
        break;
      }
    }
  }
}

impl Adapter for CommandResource {
  fn brief(&self) -> &str {
    &self.brief
  }

  fn phase(&self) -> Phase {
    self.phase
  }

  fn check(&mut self) -> Result<(), ValidationError> {
    if !matches!(self.phase, Phase::Unchecked | Phase::Validated) {
      return Err(
        ValidationError::OutOfOrder {
          phase: "check",
          current: self.phase,
        }
        .logged(),
      );
    }

    match self.validate() {
      Ok(()) => {
        self.phase = Phase::Validated;
        Ok(())
      }
      Err(e) => {
        self.phase = Phase::Failed;
        Err(e.logged())
      }
    }
  }

  fn parse(&mut self) -> Result<(), ValidationError> {
    if self.phase != Phase::Validated {
      return Err(
        ValidationError::OutOfOrder {
          phase: "parse",
          current: self.phase,
        }
        .logged(),
      );
    }

    if self.user.is_none() {
      self.user = Some(self.config().default_user.clone());
    }
    self.phase = Phase::Normalized;
    Ok(())
  }

  fn process(&mut self) -> impl Future<Output = Result<ApplyOutcome, ApplyError>> + Send {
    async move {
      if self.phase != Phase::Normalized {
        return Err(ApplyError::NotNormalized(self.phase).logged());
      }

      let result = self.execute().await;
      self.phase = match &result {
        Ok(ApplyOutcome::Skipped { .. }) => Phase::Skipped,
        Ok(_) => Phase::Succeeded,
        Err(_) => Phase::Failed,
      };
      result
    }
  }
}

impl fmt::Display for CommandResource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "  command:     {}", self.command)?;
    if let Some(cwd) = &self.cwd {
      write!(f, "\n  cwd:         {}", cwd.display())?;
    }
    if let Some(user) = &self.user {
      write!(f, "\n  user:        {}", user)?;
    }
    if let Some(path) = &self.path {
      write!(f, "\n  path:        {}", path)?;
    }
    if let Some(run_if) = &self.run_if {
      write!(f, "\n  run if:      {}", run_if)?;
    }
    if let Some(not_run_if) = &self.not_run_if {
      write!(f, "\n  not run if:  {}", not_run_if)?;
    }
    Ok(())
  }
}
