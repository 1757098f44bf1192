//! Test utilities for hostform-lib.
//!
//! `RecordingFs` wraps the real filesystem and keeps a log of every mutating
//! call, so tests can assert that a reconcile touched nothing.

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::AgentConfig;
use crate::platform::account::{effective_group_name, effective_user_name};
use crate::resource::fs::{EntryMeta, HostFs, OsFs};

/// A mutating filesystem call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsOp {
  CreateFile(PathBuf),
  Write(PathBuf),
  CreateDir(PathBuf),
  CreateDirAll(PathBuf),
  Remove(PathBuf),
  Symlink { target: PathBuf, link: PathBuf },
  Lchown { path: PathBuf, uid: u32, gid: u32 },
  Chmod { path: PathBuf, mode: u32 },
}

/// Delegates to `OsFs` and records every mutating call.
///
/// With `dry_chown` set, ownership changes are recorded but not performed, so
/// tests can check the ids passed without needing privileges.
#[derive(Debug, Default)]
pub struct RecordingFs {
  ops: RefCell<Vec<FsOp>>,
  dry_chown: bool,
}

impl RecordingFs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_dry_chown() -> Self {
    Self {
      ops: RefCell::default(),
      dry_chown: true,
    }
  }

  pub fn ops(&self) -> Vec<FsOp> {
    self.ops.borrow().clone()
  }

  pub fn clear(&self) {
    self.ops.borrow_mut().clear();
  }

  fn record(&self, op: FsOp) {
    self.ops.borrow_mut().push(op);
  }
}

impl HostFs for RecordingFs {
  fn lstat(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
    OsFs.lstat(path)
  }

  fn stat(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
    OsFs.stat(path)
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    OsFs.read(path)
  }

  fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
    OsFs.read_link(path)
  }

  fn create_file(&self, path: &Path, mode: u32) -> io::Result<()> {
    self.record(FsOp::CreateFile(path.to_path_buf()));
    OsFs.create_file(path, mode)
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    self.record(FsOp::Write(path.to_path_buf()));
    OsFs.write(path, contents)
  }

  fn create_dir(&self, path: &Path, mode: u32) -> io::Result<()> {
    self.record(FsOp::CreateDir(path.to_path_buf()));
    OsFs.create_dir(path, mode)
  }

  fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
    self.record(FsOp::CreateDirAll(path.to_path_buf()));
    OsFs.create_dir_all(path, mode)
  }

  fn remove(&self, path: &Path) -> io::Result<()> {
    self.record(FsOp::Remove(path.to_path_buf()));
    OsFs.remove(path)
  }

  fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
    self.record(FsOp::Symlink {
      target: target.to_path_buf(),
      link: link.to_path_buf(),
    });
    OsFs.symlink(target, link)
  }

  fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    self.record(FsOp::Lchown {
      path: path.to_path_buf(),
      uid,
      gid,
    });
    if self.dry_chown {
      return Ok(());
    }
    OsFs.lchown(path, uid, gid)
  }

  fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
    self.record(FsOp::Chmod {
      path: path.to_path_buf(),
      mode,
    });
    OsFs.chmod(path, mode)
  }
}

/// The test runner's own user name.
pub fn current_user() -> String {
  effective_user_name().expect("test runner should have a passwd entry")
}

/// The test runner's own primary group name.
pub fn current_group() -> String {
  effective_group_name().expect("test runner should have a group entry")
}

/// Config that runs commands through `/bin/sh` as the test runner, so no privilege switch is attempted.
pub fn local_config() -> AgentConfig {
  AgentConfig {
    default_user: current_user(),
    ..AgentConfig::default()
  }
}
