//! Implementation of the `hostform describe` command.

use std::path::Path;

use anyhow::{Context, Result};

use hostform_lib::resource::{Adapter, Resource};

use super::{label, read_records};
use crate::output::print_info;

pub fn cmd_describe(file: &Path) -> Result<()> {
  for (index, record) in read_records(file)?.into_iter().enumerate() {
    let resource = Resource::from_value(record).with_context(|| format!("Resource {} is malformed", index + 1))?;
    print_info(&label(index, resource.kind(), resource.brief()));
    println!("{}", resource);
  }
  Ok(())
}
