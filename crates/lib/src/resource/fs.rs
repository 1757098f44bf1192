//! Filesystem primitives used by file resources.
//!
//! `HostFs` is the narrow set of operations reconciliation needs. `OsFs` is the
//! real host; tests wrap it to observe which mutating calls a reconcile makes.

use std::fs::{self, DirBuilder, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::resource::types::EntryKind;

/// What reconciliation needs to know about an existing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
  pub kind: EntryKind,
  pub uid: u32,
  pub gid: u32,
  /// Permission bits, including setuid/setgid/sticky.
  pub mode: u32,
}

impl EntryMeta {
  fn from_metadata(meta: &fs::Metadata) -> Self {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
      EntryKind::Symlink
    } else if file_type.is_dir() {
      EntryKind::Dir
    } else if file_type.is_file() {
      EntryKind::File
    } else {
      EntryKind::Other
    };

    Self {
      kind,
      uid: meta.uid(),
      gid: meta.gid(),
      mode: meta.mode() & 0o7777,
    }
  }
}

/// Host filesystem operations.
///
/// Probes return `Ok(None)` when the path does not exist, including when an
/// ancestor is not a directory; any other failure is an error.
pub trait HostFs {
  /// Inspect `path` without following a final symbolic link.
  fn lstat(&self, path: &Path) -> io::Result<Option<EntryMeta>>;

  /// Inspect `path`, following symbolic links.
  fn stat(&self, path: &Path) -> io::Result<Option<EntryMeta>>;

  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

  fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

  /// Create an empty regular file. Fails if anything already exists at `path`.
  fn create_file(&self, path: &Path, mode: u32) -> io::Result<()>;

  /// Replace the contents of an existing file.
  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

  fn create_dir(&self, path: &Path, mode: u32) -> io::Result<()>;

  /// Create `path` and any missing ancestors, each with `mode`.
  fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

  /// Remove a non-directory entry (regular file or symbolic link).
  fn remove(&self, path: &Path) -> io::Result<()>;

  fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

  /// Change ownership of `path` itself, never a symbolic link's target.
  fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()>;

  fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;
}

/// The real host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

fn absent_as_none(result: io::Result<fs::Metadata>) -> io::Result<Option<EntryMeta>> {
  match result {
    Ok(meta) => Ok(Some(EntryMeta::from_metadata(&meta))),
    Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => Ok(None),
    Err(e) => Err(e),
  }
}

impl HostFs for OsFs {
  fn lstat(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
    absent_as_none(fs::symlink_metadata(path))
  }

  fn stat(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
    absent_as_none(fs::metadata(path))
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    fs::read(path)
  }

  fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
    fs::read_link(path)
  }

  fn create_file(&self, path: &Path, mode: u32) -> io::Result<()> {
    OpenOptions::new().write(true).create_new(true).mode(mode).open(path).map(|_| ())
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::write(path, contents)
  }

  fn create_dir(&self, path: &Path, mode: u32) -> io::Result<()> {
    DirBuilder::new().mode(mode).create(path)
  }

  fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
    DirBuilder::new().recursive(true).mode(mode).create(path)
  }

  fn remove(&self, path: &Path) -> io::Result<()> {
    fs::remove_file(path)
  }

  fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
  }

  fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    std::os::unix::fs::lchown(path, Some(uid), Some(gid))
  }

  fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode))
  }
}
