//! hostform-lib: Resource application engine for Hostform
//!
//! This crate applies declarative resources to the local host:
//! - `Command`: run a shell command as a given user, gated by guard commands
//! - `File`: ensure a regular file, directory or symbolic link with content,
//!   ownership and permissions
//!
//! Each resource goes through `check`, `parse` and `process` in order; see
//! [`resource::Adapter`].

pub mod config;
pub mod consts;
pub mod platform;
pub mod resource;
pub mod util;
