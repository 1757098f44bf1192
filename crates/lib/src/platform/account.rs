//! System account resolution.
//!
//! Resources name accounts by user and group name; the host wants numeric
//! ids. Lookups go through the system user database (`getpwnam`/`getgrnam`),
//! so NSS-backed accounts resolve the same way the shell would see them.

use nix::unistd::{Gid, Group, Uid, User, getegid, geteuid};

/// Error during account resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
  #[error("user does not exist: {0}")]
  UnknownUser(String),

  #[error("group does not exist: {0}")]
  UnknownGroup(String),

  #[error("failed to look up {name}: {source}")]
  Lookup {
    name: String,
    #[source]
    source: nix::Error,
  },
}

/// Resolve a user name to its numeric id.
pub fn lookup_uid(name: &str) -> Result<u32, AccountError> {
  match User::from_name(name) {
    Ok(Some(user)) => Ok(user.uid.as_raw()),
    Ok(None) => Err(AccountError::UnknownUser(name.to_string())),
    Err(source) => Err(AccountError::Lookup {
      name: name.to_string(),
      source,
    }),
  }
}

/// Resolve a group name to its numeric id.
pub fn lookup_gid(name: &str) -> Result<u32, AccountError> {
  match Group::from_name(name) {
    Ok(Some(group)) => Ok(group.gid.as_raw()),
    Ok(None) => Err(AccountError::UnknownGroup(name.to_string())),
    Err(source) => Err(AccountError::Lookup {
      name: name.to_string(),
      source,
    }),
  }
}

/// Name of the account the agent is running as, if it has a passwd entry.
pub fn effective_user_name() -> Option<String> {
  User::from_uid(geteuid()).ok().flatten().map(|u| u.name)
}

/// Name of the agent's effective group, if it has a group entry.
pub fn effective_group_name() -> Option<String> {
  Group::from_gid(getegid()).ok().flatten().map(|g| g.name)
}

/// Whether `uid` is the agent's own effective user id.
pub fn is_effective_uid(uid: u32) -> bool {
  geteuid() == Uid::from_raw(uid)
}

/// Whether `gid` is the agent's own effective group id.
pub fn is_effective_gid(gid: u32) -> bool {
  getegid() == Gid::from_raw(gid)
}
