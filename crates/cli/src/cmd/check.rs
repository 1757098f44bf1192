//! Implementation of the `hostform check` command.
//!
//! Runs decode, check and parse over every record. Nothing on the host is changed.

use std::path::Path;

use anyhow::{Result, bail};

use hostform_lib::resource::{Adapter, Resource, ResourceError};

use super::{label, raw_fields, read_records};
use crate::output::{print_error, print_success};

pub fn cmd_check(file: &Path) -> Result<()> {
  let records = read_records(file)?;
  let total = records.len();
  let mut failed = 0;

  for (index, record) in records.into_iter().enumerate() {
    let (kind, brief) = raw_fields(&record);
    let name = label(index, &kind, &brief);

    match validate(record) {
      Ok(()) => print_success(&format!("{} (ok)", name)),
      Err(e) => {
        failed += 1;
        print_error(&format!("{} (invalid): {}", name, e));
      }
    }
  }

  if failed > 0 {
    bail!("{} of {} resource(s) are invalid", failed, total);
  }
  print_success(&format!("{} resource(s) valid", total));
  Ok(())
}

fn validate(record: serde_json::Value) -> Result<(), ResourceError> {
  let mut resource = Resource::from_value(record)?;
  resource.check()?;
  resource.parse()?;
  Ok(())
}
