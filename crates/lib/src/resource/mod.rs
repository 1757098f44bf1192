//! Declarative resources and their lifecycle.
//!
//! A resource describes one piece of desired host state. Each one is driven
//! through three phases, in order:
//! - `check`: structural validation, no host access beyond existence probes
//! - `parse`: defaults filled in, names resolved to ids
//! - `process`: the host is brought to the declared state
//!
//! # Resource Kinds
//!
//! - [`Resource::Command`] - Run a shell command as a given user, optionally guarded
//! - [`Resource::File`] - Ensure a regular file, directory or symbolic link
//!
//! Records arrive as generic JSON objects tagged by `"Type"`; see
//! [`Resource::from_value`].

pub mod command;
pub mod file;
pub mod fs;
mod types;

pub use command::{CommandResource, Invocation};
pub use file::FileResource;
pub use types::*;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, de};
use tracing::info;

/// The lifecycle every resource kind implements.
///
/// Phases must run in order. A phase called out of order is rejected without
/// touching the host, and any failing phase leaves the resource in
/// [`Phase::Failed`].
pub trait Adapter: fmt::Display {
  /// One-line human description.
  fn brief(&self) -> &str;

  fn phase(&self) -> Phase;

  /// Validate the declaration.
  fn check(&mut self) -> Result<(), ValidationError>;

  /// Fill in defaults and resolve names. Requires a successful `check`.
  fn parse(&mut self) -> Result<(), ValidationError>;

  /// Apply the declaration to the host. Requires a successful `parse`.
  fn process(&mut self) -> impl Future<Output = Result<ApplyOutcome, ApplyError>> + Send;
}

/// Any supported resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "Type")]
pub enum Resource {
  Command(CommandResource),
  File(FileResource),
}

impl Resource {
  /// Decode a generic record.
  pub fn from_value(value: serde_json::Value) -> Result<Self, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::from(e).logged())
  }

  /// Decode a record from JSON text.
  pub fn from_json(text: &str) -> Result<Self, DecodeError> {
    serde_json::from_str(text).map_err(|e| DecodeError::from(e).logged())
  }

  /// The `"Type"` tag of this resource.
  pub fn kind(&self) -> &'static str {
    match self {
      Resource::Command(_) => "Command",
      Resource::File(_) => "File",
    }
  }

  /// Run check, parse and process in order, stopping at the first failure.
  pub async fn apply(&mut self) -> Result<ApplyOutcome, ResourceError> {
    info!(kind = self.kind(), brief = %self.brief(), "applying resource");
    self.check()?;
    self.parse()?;
    let outcome = self.process().await?;
    info!(brief = %self.brief(), outcome = ?outcome, "resource applied");
    Ok(outcome)
  }
}

impl From<CommandResource> for Resource {
  fn from(resource: CommandResource) -> Self {
    Resource::Command(resource)
  }
}

impl From<FileResource> for Resource {
  fn from(resource: FileResource) -> Self {
    Resource::File(resource)
  }
}

impl Adapter for Resource {
  fn brief(&self) -> &str {
    match self {
      Resource::Command(r) => r.brief(),
      Resource::File(r) => r.brief(),
    }
  }

  fn phase(&self) -> Phase {
    match self {
      Resource::Command(r) => r.phase(),
      Resource::File(r) => r.phase(),
    }
  }

  fn check(&mut self) -> Result<(), ValidationError> {
    match self {
      Resource::Command(r) => r.check(),
      Resource::File(r) => r.check(),
    }
  }

  fn parse(&mut self) -> Result<(), ValidationError> {
    match self {
      Resource::Command(r) => r.parse(),
      Resource::File(r) => r.parse(),
    }
  }

  fn process(&mut self) -> impl Future<Output = Result<ApplyOutcome, ApplyError>> + Send {
    async move {
      match self {
        Resource::Command(r) => r.process().await,
        Resource::File(r) => r.process().await,
      }
    }
  }
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Resource::Command(r) => r.fmt(f),
      Resource::File(r) => r.fmt(f),
    }
  }
}

/// Deserialize an optional field where an empty string means "not set".
pub(crate) fn non_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: FromStr,
  T::Err: fmt::Display,
{
  match Option::<String>::deserialize(deserializer)? {
    None => Ok(None),
    Some(s) if s.is_empty() => Ok(None),
    Some(s) => s.parse().map(Some).map_err(de::Error::custom),
  }
}
