//! File resources: regular files, directories and symbolic links.
//!
//! Reconciliation never deletes or reinterprets a path of the wrong kind.
//! Every step compares the host against the declaration first and only
//! mutates on a mismatch, so a second apply against an unchanged host makes
//! no mutating calls at all.

use std::ffi::OsStr;
use std::fmt;
use std::future::Future;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::consts::{DEFAULT_MODE_DIR, DEFAULT_MODE_FILE, DEFAULT_MODE_LINK, MAX_MODE};
use crate::platform::account::{lookup_gid, lookup_uid};
use crate::resource::fs::{HostFs, OsFs};
use crate::resource::types::{
  ApplyError, ApplyOutcome, ConflictError, EntryKind, FileType, Logged, Phase, ValidationError,
};
use crate::resource::{Adapter, non_empty};

/// Desired state of a single filesystem path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileResource {
  pub brief: String,
  pub file_path: PathBuf,
  #[serde(deserialize_with = "non_empty")]
  pub file_type: Option<FileType>,
  pub file_content: String,
  /// For an existing file with empty `file_content`, leave its content alone.
  pub no_truncate: bool,
  #[serde(deserialize_with = "non_empty")]
  pub target: Option<PathBuf>,
  #[serde(deserialize_with = "non_empty")]
  pub user: Option<String>,
  #[serde(deserialize_with = "non_empty")]
  pub group: Option<String>,
  /// Octal permission string, e.g. `"0644"`.
  #[serde(deserialize_with = "non_empty")]
  pub permission: Option<String>,

  #[serde(skip)]
  state: Resolved,
}

/// Values computed once by `parse`/`process` and never recomputed within a cycle.
#[derive(Debug, Clone, Default)]
struct Resolved {
  phase: Phase,
  mode: u32,
  owner: Option<Owner>,
  path_existed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owner {
  uid: u32,
  gid: u32,
}

impl FileResource {
  pub fn new(brief: impl Into<String>, path: impl Into<PathBuf>, file_type: FileType) -> Self {
    Self {
      brief: brief.into(),
      file_path: path.into(),
      file_type: Some(file_type),
      ..Self::default()
    }
  }

  pub fn content(mut self, content: impl Into<String>) -> Self {
    self.file_content = content.into();
    self
  }

  pub fn no_truncate(mut self, no_truncate: bool) -> Self {
    self.no_truncate = no_truncate;
    self
  }

  pub fn target(mut self, target: impl Into<PathBuf>) -> Self {
    self.target = Some(target.into());
    self
  }

  pub fn user(mut self, user: impl Into<String>) -> Self {
    self.user = Some(user.into());
    self
  }

  pub fn group(mut self, group: impl Into<String>) -> Self {
    self.group = Some(group.into());
    self
  }

  pub fn permission(mut self, permission: impl Into<String>) -> Self {
    self.permission = Some(permission.into());
    self
  }

  /// Resolved permission bits. Meaningful once `parse` has succeeded.
  pub fn mode(&self) -> u32 {
    self.state.mode
  }

  /// Whether the path existed with the declared kind when `process` probed it.
  pub fn path_existed(&self) -> bool {
    self.state.path_existed
  }

  /// Reconcile the host against this resource using the given filesystem.
  pub fn process_with<F: HostFs>(&mut self, fs: &F) -> Result<ApplyOutcome, ApplyError> {
    if self.state.phase != Phase::Normalized {
      return Err(ApplyError::NotNormalized(self.state.phase).logged());
    }

    let result = self.reconcile(fs);
    self.state.phase = if result.is_ok() { Phase::Succeeded } else { Phase::Failed };
    result
  }

  fn validate(&self) -> Result<(), ValidationError> {
    if self.brief.is_empty() {
      return Err(ValidationError::EmptyBrief { kind: "file" });
    }

    let Some(file_type) = self.file_type else {
      return Err(ValidationError::EmptyFileType);
    };

    if self.file_path.as_os_str().is_empty() {
      return Err(ValidationError::EmptyFilePath);
    }
    if self.file_path == Path::new("/") {
      return Err(ValidationError::RootFilePath);
    }
    if !self.file_path.is_absolute() {
      return Err(ValidationError::RelativeFilePath(self.file_path.clone()));
    }

    if file_type == FileType::Link && self.target.is_none() {
      return Err(ValidationError::EmptyLinkTarget);
    }

    Ok(())
  }

  fn resolve(&mut self) -> Result<(), ValidationError> {
    let file_type = self.file_type.ok_or(ValidationError::EmptyFileType)?;

    if file_type == FileType::Dir {
      self.file_path = strip_trailing_slashes(&self.file_path);
    }

    self.state.mode = match &self.permission {
      Some(permission) => parse_mode(permission)?,
      None => default_mode(file_type),
    };

    self.state.owner = match (&self.user, &self.group) {
      (Some(user), Some(group)) => {
        let gid = lookup_gid(group)?;
        let uid = lookup_uid(user)?;
        Some(Owner { uid, gid })
      }
      (None, None) => None,
      _ => {
        debug!(path = ?self.file_path, "user and group are not both set, ownership is left alone");
        None
      }
    };

    Ok(())
  }

  fn reconcile<F: HostFs>(&mut self, fs: &F) -> Result<ApplyOutcome, ApplyError> {
    let file_type = self
      .file_type
      .ok_or_else(|| ApplyError::NotNormalized(self.state.phase).logged())?;

    info!(path = ?self.file_path, file_type = %file_type, "reconciling path");

    self.probe(fs, file_type)?;

    let mut changed = self.ensure_parent(fs)?;
    changed |= match file_type {
      FileType::Dir => self.apply_dir(fs)?,
      FileType::File => self.apply_file(fs)?,
      FileType::Link => self.apply_link(fs)?,
    };

    Ok(if changed {
      ApplyOutcome::Changed
    } else {
      ApplyOutcome::Unchanged
    })
  }

  /// Record whether the path exists, refusing a path of the wrong kind.
  fn probe<F: HostFs>(&mut self, fs: &F, declared: FileType) -> Result<(), ApplyError> {
    let entry = fs
      .lstat(&self.file_path)
      .map_err(|e| ApplyError::io("inspect", &self.file_path, e).logged())?;

    match entry {
      None => self.state.path_existed = false,
      Some(meta) if meta.kind.matches(declared) => self.state.path_existed = true,
      Some(meta) => {
        let conflict = ConflictError {
          path: self.file_path.clone(),
          declared,
          found: meta.kind,
        };
        return Err(ApplyError::from(conflict).logged());
      }
    }

    Ok(())
  }

  /// Create missing parent directories.
  ///
  /// Parents get the resolved mode widened by `searchable`, not the exact
  /// resolved bits, so a `0600` file still gets a parent its owner can enter.
  fn ensure_parent<F: HostFs>(&self, fs: &F) -> Result<bool, ApplyError> {
    let Some(parent) = self.file_path.parent() else {
      return Ok(false);
    };

    match fs.stat(parent).map_err(|e| ApplyError::io("inspect", parent, e).logged())? {
      Some(meta) if meta.kind == EntryKind::Dir => {
        debug!(parent = ?parent, "parent directory exists");
        Ok(false)
      }
      Some(_) => Err(ApplyError::ParentNotDirectory(parent.to_path_buf()).logged()),
      None => {
        fs.create_dir_all(parent, searchable(self.state.mode))
          .map_err(|e| ApplyError::io("create parent directory", parent, e).logged())?;
        debug!(parent = ?parent, "created parent directory");
        Ok(true)
      }
    }
  }

  fn apply_dir<F: HostFs>(&self, fs: &F) -> Result<bool, ApplyError> {
    let mut changed = false;

    if self.state.path_existed {
      debug!(path = ?self.file_path, "directory exists");
    } else {
      fs.create_dir(&self.file_path, self.state.mode)
        .map_err(|e| ApplyError::io("create directory", &self.file_path, e).logged())?;
      debug!(path = ?self.file_path, "created directory");
      changed = true;
    }

    changed |= self.reconcile_owner(fs)?;
    changed |= self.reconcile_mode(fs)?;
    Ok(changed)
  }

  fn apply_file<F: HostFs>(&self, fs: &F) -> Result<bool, ApplyError> {
    let mut changed = false;

    // Empty declared content truncates an existing file unless no_truncate is set.
    let write_wanted = if self.state.path_existed {
      debug!(path = ?self.file_path, "file exists");
      !self.file_content.is_empty() || !self.no_truncate
    } else {
      // Owner-writable until content is in place; reconcile_mode narrows it afterwards.
      fs.create_file(&self.file_path, self.state.mode | 0o200)
        .map_err(|e| ApplyError::io("create file", &self.file_path, e).logged())?;
      debug!(path = ?self.file_path, "created file");
      changed = true;
      !self.file_content.is_empty()
    };

    if write_wanted {
      changed |= self.write_content(fs)?;
    }

    changed |= self.reconcile_owner(fs)?;
    changed |= self.reconcile_mode(fs)?;
    Ok(changed)
  }

  fn write_content<F: HostFs>(&self, fs: &F) -> Result<bool, ApplyError> {
    let current = fs
      .read(&self.file_path)
      .map_err(|e| ApplyError::io("read", &self.file_path, e).logged())?;

    if current == self.file_content.as_bytes() {
      debug!(path = ?self.file_path, "content already matches");
      return Ok(false);
    }

    fs.write(&self.file_path, self.file_content.as_bytes())
      .map_err(|e| ApplyError::io("write", &self.file_path, e).logged())?;
    debug!(path = ?self.file_path, bytes = self.file_content.len(), "wrote content");
    Ok(true)
  }

  fn apply_link<F: HostFs>(&self, fs: &F) -> Result<bool, ApplyError> {
    let target = self
      .target
      .as_deref()
      .ok_or_else(|| ApplyError::NotNormalized(self.state.phase).logged())?;

    if self.state.path_existed {
      match fs.read_link(&self.file_path) {
        Ok(current) if current == target => {
          debug!(path = ?self.file_path, target = ?target, "link already points at target");
          return Ok(false);
        }
        Ok(current) => debug!(path = ?self.file_path, current = ?current, "replacing link"),
        Err(e) => debug!(path = ?self.file_path, error = %e, "unreadable link, replacing"),
      }

      fs.remove(&self.file_path)
        .map_err(|e| ApplyError::io("remove old link", &self.file_path, e).logged())?;
    }

    fs.symlink(target, &self.file_path)
      .map_err(|e| ApplyError::io("create link", &self.file_path, e).logged())?;
    debug!(path = ?self.file_path, target = ?target, "created link");
    Ok(true)
  }

  fn reconcile_owner<F: HostFs>(&self, fs: &F) -> Result<bool, ApplyError> {
    let Some(owner) = self.state.owner else {
      return Ok(false);
    };

    let current = fs
      .lstat(&self.file_path)
      .map_err(|e| ApplyError::io("inspect", &self.file_path, e).logged())?;
    if current.is_some_and(|meta| meta.uid == owner.uid && meta.gid == owner.gid) {
      debug!(path = ?self.file_path, "ownership already matches");
      return Ok(false);
    }

    fs.lchown(&self.file_path, owner.uid, owner.gid)
      .map_err(|e| ApplyError::io("change ownership of", &self.file_path, e).logged())?;
    debug!(path = ?self.file_path, uid = owner.uid, gid = owner.gid, "changed ownership");
    Ok(true)
  }

  fn reconcile_mode<F: HostFs>(&self, fs: &F) -> Result<bool, ApplyError> {
    if self.permission.is_none() {
      return Ok(false);
    }

    let current = fs
      .lstat(&self.file_path)
      .map_err(|e| ApplyError::io("inspect", &self.file_path, e).logged())?;
    if current.is_some_and(|meta| meta.mode == self.state.mode) {
      debug!(path = ?self.file_path, "permission already matches");
      return Ok(false);
    }

    fs.chmod(&self.file_path, self.state.mode)
      .map_err(|e| ApplyError::io("change permission of", &self.file_path, e).logged())?;
    debug!(path = ?self.file_path, mode = %format!("{:o}", self.state.mode), "changed permission");
    Ok(true)
  }
}

impl Adapter for FileResource {
  fn brief(&self) -> &str {
    &self.brief
  }

  fn phase(&self) -> Phase {
    self.state.phase
  }

  fn check(&mut self) -> Result<(), ValidationError> {
    if !matches!(self.state.phase, Phase::Unchecked | Phase::Validated) {
      return Err(
        ValidationError::OutOfOrder {
          phase: "check",
          current: self.state.phase,
        }
        .logged(),
      );
    }

    match self.validate() {
      Ok(()) => {
        self.state.phase = Phase::Validated;
        Ok(())
      }
      Err(e) => {
        self.state.phase = Phase::Failed;
        Err(e.logged())
      }
    }
  }

  fn parse(&mut self) -> Result<(), ValidationError> {
    if self.state.phase != Phase::Validated {
      return Err(
        ValidationError::OutOfOrder {
          phase: "parse",
          current: self.state.phase,
        }
        .logged(),
      );
    }

    match self.resolve() {
      Ok(()) => {
        self.state.phase = Phase::Normalized;
        Ok(())
      }
      Err(e) => {
        self.state.phase = Phase::Failed;
        Err(e.logged())
      }
    }
  }

  fn process(&mut self) -> impl Future<Output = Result<ApplyOutcome, ApplyError>> + Send {
    async move { self.process_with(&OsFs) }
  }
}

impl fmt::Display for FileResource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "  file path:   {}", self.file_path.display())?;
    write!(f, "\n  file type:   {}", self.file_type.map_or("<unset>", |t| t.as_str()))?;
    if let Some(target) = &self.target {
      write!(f, "\n  target:      {}", target.display())?;
    }
    if let Some(user) = &self.user {
      write!(f, "\n  user:        {}", user)?;
    }
    if let Some(group) = &self.group {
      write!(f, "\n  group:       {}", group)?;
    }
    if let Some(permission) = &self.permission {
      write!(f, "\n  permission:  {}", permission)?;
    }
    Ok(())
  }
}

fn default_mode(file_type: FileType) -> u32 {
  match file_type {
    FileType::Dir => DEFAULT_MODE_DIR,
    FileType::File => DEFAULT_MODE_FILE,
    FileType::Link => DEFAULT_MODE_LINK,
  }
}

/// Parse an octal permission string such as `"644"` or `"0755"`.
fn parse_mode(permission: &str) -> Result<u32, ValidationError> {
  match u32::from_str_radix(permission, 8) {
    Ok(mode) if mode <= MAX_MODE => Ok(mode),
    _ => Err(ValidationError::InvalidPermission(permission.to_string())),
  }
}

/// Mode for created parent directories: the rwx bits of `mode`, plus search
/// permission for every class that may read.
fn searchable(mode: u32) -> u32 {
  let mode = mode & 0o777;
  mode | ((mode & 0o444) >> 2)
}

fn strip_trailing_slashes(path: &Path) -> PathBuf {
  let bytes = path.as_os_str().as_bytes();
  let mut end = bytes.len();
  while end > 1 && bytes[end - 1] == b'/' {
    end -= 1;
  }
  PathBuf::from(OsStr::from_bytes(&bytes[..end]))
}
