mod apply;
mod check;
mod describe;

pub use apply::cmd_apply;
pub use check::cmd_check;
pub use describe::cmd_describe;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

/// Read a resource file: a JSON array of records, each decoded separately.
fn read_records(file: &Path) -> Result<Vec<serde_json::Value>> {
  let text = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
  let value: serde_json::Value =
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {} as JSON", file.display()))?;

  match value {
    serde_json::Value::Array(records) => Ok(records),
    _ => bail!("{} must contain a JSON array of resources", file.display()),
  }
}

/// Label used for a resource in output lines.
fn label(index: usize, kind: &str, brief: &str) -> String {
  format!("[{}] {}: {}", index + 1, kind, brief)
}

/// Best-effort kind and brief of a record that could not be decoded.
fn raw_fields(record: &serde_json::Value) -> (String, String) {
  let field = |key: &str| record.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string();
  (field("Type"), field("Brief"))
}
