//! Types shared by every resource kind.
//!
//! This module defines the lifecycle phases, the result of applying a
//! resource, and the error taxonomy returned by each phase.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::platform::account::AccountError;

/// Where a resource is in its Check → Parse → Process lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
  #[default]
  Unchecked,
  /// `check` passed.
  Validated,
  /// `parse` filled in defaults and resolved names.
  Normalized,
  /// A guard prevented execution. Terminal.
  Skipped,
  /// `process` completed. Terminal.
  Succeeded,
  /// A phase returned an error. Terminal.
  Failed,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Unchecked => "unchecked",
      Phase::Validated => "validated",
      Phase::Normalized => "normalized",
      Phase::Skipped => "skipped",
      Phase::Succeeded => "succeeded",
      Phase::Failed => "failed",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Phase::Skipped | Phase::Succeeded | Phase::Failed)
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Result of a successful `process` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
  /// The host was changed (or the command ran).
  Changed,
  /// The host already matched; nothing was done.
  Unchanged,
  /// A guard condition prevented execution. Not an error.
  Skipped { reason: String },
}

impl ApplyOutcome {
  pub fn is_change(&self) -> bool {
    matches!(self, ApplyOutcome::Changed)
  }
}

/// Declared kind of a filesystem resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
  File,
  Dir,
  Link,
}

impl FileType {
  pub fn as_str(&self) -> &'static str {
    match self {
      FileType::File => "file",
      FileType::Dir => "dir",
      FileType::Link => "link",
    }
  }
}

impl fmt::Display for FileType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FileType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "file" => Ok(FileType::File),
      "dir" => Ok(FileType::Dir),
      "link" => Ok(FileType::Link),
      other => Err(format!("unknown file type `{other}`, expected one of: file, dir, link")),
    }
  }
}

/// Kind of an entry found on disk, without following a final symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  File,
  Dir,
  Symlink,
  /// Sockets, fifos, device nodes.
  Other,
}

impl EntryKind {
  /// Whether an entry of this kind satisfies a declared `FileType`.
  pub fn matches(&self, declared: FileType) -> bool {
    matches!(
      (self, declared),
      (EntryKind::File, FileType::File) | (EntryKind::Dir, FileType::Dir) | (EntryKind::Symlink, FileType::Link)
    )
  }
}

impl fmt::Display for EntryKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      EntryKind::File => "a regular file",
      EntryKind::Dir => "a directory",
      EntryKind::Symlink => "a symbolic link",
      EntryKind::Other => "a special file",
    })
  }
}

/// Structural or referential precondition violated. Raised by `check` and `parse`
/// before any host mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{kind} brief is empty")]
  EmptyBrief { kind: &'static str },

  #[error("command is empty")]
  EmptyCommand,

  #[error("cwd does not exist: {}", .0.display())]
  CwdMissing(PathBuf),

  #[error("cwd is not a directory: {}", .0.display())]
  CwdNotDirectory(PathBuf),

  #[error("file type is empty")]
  EmptyFileType,

  #[error("file path is empty")]
  EmptyFilePath,

  #[error("file path is root")]
  RootFilePath,

  #[error("file path is relative: {}", .0.display())]
  RelativeFilePath(PathBuf),

  #[error("symbolic link target is empty")]
  EmptyLinkTarget,

  #[error("file permission is invalid: {0}")]
  InvalidPermission(String),

  #[error(transparent)]
  Account(#[from] AccountError),

  #[error("cannot {phase} a resource that is {current}")]
  OutOfOrder { phase: &'static str, current: Phase },
}

/// An existing path has the wrong kind for the declared resource. Nothing is changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("path already exists but is {found}, not a {declared}: {}", .path.display())]
pub struct ConflictError {
  pub path: PathBuf,
  pub declared: FileType,
  pub found: EntryKind,
}

/// A host operation failed while applying a resource.
#[derive(Debug, Error)]
pub enum ApplyError {
  #[error(transparent)]
  Conflict(#[from] ConflictError),

  #[error("parent directory name already exists, but is not a directory: {}", .0.display())]
  ParentNotDirectory(PathBuf),

  #[error("failed to {op} {}: {source}", .path.display())]
  Io {
    op: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to start {}: {source}", .program.display())]
  Spawn {
    program: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to wait for command: {0}")]
  Wait(#[source] std::io::Error),

  /// The command exited unsuccessfully and wrote to stderr.
  #[error("{stderr}")]
  CommandFailed { stderr: String, status: ExitStatus },

  /// The command exited unsuccessfully without writing to stderr.
  #[error("command exited unsuccessfully: {0}")]
  Exited(ExitStatus),

  #[error("cannot process a resource that is {0}")]
  NotNormalized(Phase),
}

impl ApplyError {
  pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    ApplyError::Io {
      op,
      path: path.into(),
      source,
    }
  }

  pub fn is_conflict(&self) -> bool {
    matches!(self, ApplyError::Conflict(_))
  }
}

/// A generic record could not be turned into a concrete resource.
#[derive(Debug, Error)]
#[error("invalid resource description: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// Any failure from running a resource through its full lifecycle.
#[derive(Debug, Error)]
pub enum ResourceError {
  #[error(transparent)]
  Decode(#[from] DecodeError),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Apply(#[from] ApplyError),
}

/// Log an error where it is detected, then hand it back for returning.
pub(crate) trait Logged: Sized {
  fn logged(self) -> Self;
}

impl<E: std::error::Error> Logged for E {
  fn logged(self) -> Self {
    error!(error = %self, "adapter error");
    self
  }
}
