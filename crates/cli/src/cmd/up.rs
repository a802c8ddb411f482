//! Implementation of the `stv up` command.
//!
//! Observes the project's containers, plans every selected service and
//! applies the plans, printing one line per service.

use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use stevedore_lib::execute::{ExecutionReport, ServiceOutcome, up};

use crate::output::{
  Tone, format_duration, name_width, print_error, print_json, print_service_line, print_stat, print_success,
  print_warning, symbols,
};
use crate::{ConvergeArgs, Globals};

use super::{async_runtime, container_runtime, load, up_options};

#[derive(Serialize)]
struct UpOutput<'a> {
  project: &'a str,
  success: bool,
  services: Vec<ServiceOutput<'a>>,
}

#[derive(Serialize)]
struct ServiceOutput<'a> {
  service: &'a str,
  outcome: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  detail: Option<String>,
  created: usize,
  started: usize,
  recreated: usize,
  removed: usize,
}

/// Execute the up command. Returns whether every service converged.
pub fn cmd_up(globals: &Globals, args: &ConvergeArgs) -> Result<bool> {
  let start = Instant::now();
  let options = up_options(args)?;
  let project = load(globals)?;
  let runtime = container_runtime(globals);

  let rt = async_runtime()?;
  let result = rt.block_on(up(runtime, &project, &options)).context("Up failed")?;
  let report = &result.report;

  if globals.output.is_json() {
    print_json(&UpOutput {
      project: project.name(),
      success: report.is_success(),
      services: service_outputs(report),
    })?;
    return Ok(report.is_success());
  }

  // Services in the order they finished.
  let width = name_width(report.completion_order.iter().map(String::as_str));
  for name in &report.completion_order {
    let Some(result) = report.results.get(name) else {
      continue;
    };
    let (symbol, tone) = match &result.outcome {
      ServiceOutcome::Created | ServiceOutcome::Recreated => (symbols::SUCCESS, Tone::Change),
      ServiceOutcome::Started => (symbols::SUCCESS, Tone::Good),
      ServiceOutcome::Noop => (symbols::UNCHANGED, Tone::Muted),
      ServiceOutcome::Failed(_) => (symbols::ERROR, Tone::Bad),
      ServiceOutcome::Skipped { .. } => (symbols::WARNING, Tone::Bad),
    };
    let mut detail = result.outcome.to_string();
    if result.counts.removed > 0 {
      detail.push_str(&format!(" ({} removed)", result.counts.removed));
    }
    print_service_line(symbol, tone, name, width, &detail);
  }

  println!();
  if report.is_success() {
    print_success(&format!("Project {} is up", project.name()));
  } else {
    print_error(&format!("{} service(s) failed", report.failed().len()));
    let skipped = report.skipped();
    if !skipped.is_empty() {
      print_warning(&format!("Skipped: {}", skipped.join(", ")));
    }
  }

  let totals = report.totals();
  print_stat("Created", &totals.created.to_string());
  print_stat("Started", &totals.started.to_string());
  print_stat("Recreated", &totals.recreated.to_string());
  print_stat("Removed", &totals.removed.to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(report.is_success())
}

fn service_outputs(report: &ExecutionReport) -> Vec<ServiceOutput<'_>> {
  report
    .completion_order
    .iter()
    .filter_map(|name| report.results.get(name).map(|r| (name, r)))
    .map(|(name, r)| ServiceOutput {
      service: name,
      outcome: r.outcome.label(),
      detail: match &r.outcome {
        ServiceOutcome::Failed(failure) => Some(failure.to_string()),
        ServiceOutcome::Skipped { dependency } => Some(format!("dependency {} failed", dependency)),
        _ => None,
      },
      created: r.counts.created,
      started: r.counts.started,
      recreated: r.counts.recreated,
      removed: r.counts.removed,
    })
    .collect()
}
