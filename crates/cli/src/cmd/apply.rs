//! Implementation of the `hostform apply` command.
//!
//! Decodes each record of a resource file and runs it through check, parse and
//! process, one resource at a time and in file order.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use hostform_lib::resource::{Adapter, ApplyOutcome, Resource, ResourceError};

use super::{label, raw_fields, read_records};
use crate::output::{
  OutputFormat, format_duration, print_changed, print_error, print_json, print_stat, print_success, print_skipped,
  print_warning,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
  Changed,
  Unchanged,
  Skipped,
  Failed,
}

/// Result of one resource, as printed and as emitted in JSON.
#[derive(Debug, Serialize)]
struct Report {
  index: usize,
  kind: String,
  brief: String,
  status: Status,
  #[serde(skip_serializing_if = "Option::is_none")]
  detail: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
  changed: usize,
  unchanged: usize,
  skipped: usize,
  failed: usize,
  not_run: usize,
  resources: Vec<Report>,
}

impl Summary {
  fn record(&mut self, report: Report) {
    match report.status {
      Status::Changed => self.changed += 1,
      Status::Unchanged => self.unchanged += 1,
      Status::Skipped => self.skipped += 1,
      Status::Failed => self.failed += 1,
    }
    self.resources.push(report);
  }
}

/// Execute the apply command.
///
/// Stops at the first failed resource unless `keep_going` is set. Returns an
/// error (and so a non-zero exit code) when any resource failed.
pub fn cmd_apply(file: &Path, keep_going: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let records = read_records(file)?;
  let total = records.len();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let mut summary = Summary::default();

  for (index, record) in records.into_iter().enumerate() {
    let report = match Resource::from_value(record.clone()) {
      Ok(mut resource) => {
        let result = rt.block_on(resource.apply());
        report_for(index, &resource, result)
      }
      Err(e) => {
        let (kind, brief) = raw_fields(&record);
        Report {
          index,
          kind,
          brief,
          status: Status::Failed,
          detail: Some(ResourceError::from(e).to_string()),
        }
      }
    };

    let failed = report.status == Status::Failed;
    if !output.is_json() {
      print_report(&report);
    }
    summary.record(report);

    if failed && !keep_going {
      summary.not_run = total - index - 1;
      break;
    }
  }

  info!(
    changed = summary.changed,
    failed = summary.failed,
    elapsed = %format_duration(start.elapsed()),
    "apply finished"
  );

  if output.is_json() {
    print_json(&summary)?;
  } else {
    println!();
    if summary.failed == 0 {
      print_success("Apply complete!");
    } else {
      print_error("Apply failed");
    }
    print_stat("Changed", &summary.changed.to_string());
    print_stat("Unchanged", &summary.unchanged.to_string());
    print_stat("Skipped", &summary.skipped.to_string());
    print_stat("Failed", &summary.failed.to_string());
    if summary.not_run > 0 {
      print_warning(&format!("{} resource(s) not run after the failure", summary.not_run));
    }
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  if summary.failed > 0 {
    bail!("{} of {} resource(s) failed", summary.failed, total);
  }
  Ok(())
}

fn report_for(index: usize, resource: &Resource, result: Result<ApplyOutcome, ResourceError>) -> Report {
  let (status, detail) = match result {
    Ok(ApplyOutcome::Changed) => (Status::Changed, None),
    Ok(ApplyOutcome::Unchanged) => (Status::Unchanged, None),
    Ok(ApplyOutcome::Skipped { reason }) => (Status::Skipped, Some(reason)),
    Err(e) => (Status::Failed, Some(e.to_string().trim_end().to_string())),
  };

  Report {
    index,
    kind: resource.kind().to_string(),
    brief: resource.brief().to_string(),
    status,
    detail,
  }
}

fn print_report(report: &Report) {
  let name = label(report.index, &report.kind, &report.brief);
  match (report.status, &report.detail) {
    (Status::Changed, _) => print_changed(&format!("{} (changed)", name)),
    (Status::Unchanged, _) => print_success(&format!("{} (unchanged)", name)),
    (Status::Skipped, Some(reason)) => print_skipped(&format!("{} (skipped: {})", name, reason)),
    (Status::Skipped, None) => print_skipped(&format!("{} (skipped)", name)),
    (Status::Failed, Some(detail)) => print_error(&format!("{} (failed): {}", name, detail)),
    (Status::Failed, None) => print_error(&format!("{} (failed)", name)),
  }
}
