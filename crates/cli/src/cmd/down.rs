//! Implementation of the `stv down` command.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use stevedore_lib::execute::down;

use crate::Globals;
use crate::output::{Tone, name_width, print_error, print_json, print_service_line, print_success, symbols};

use super::{async_runtime, container_runtime, load};

#[derive(Serialize)]
struct DownOutput<'a> {
  project: &'a str,
  success: bool,
  services: Vec<ServiceDownOutput<'a>>,
}

#[derive(Serialize)]
struct ServiceDownOutput<'a> {
  service: &'a str,
  removed: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

/// Execute the down command. Returns whether every container was removed.
pub fn cmd_down(globals: &Globals, timeout: Duration) -> Result<bool> {
  let project = load(globals)?;
  let runtime = container_runtime(globals);

  let rt = async_runtime()?;
  let report = rt
    .block_on(down(runtime, &project, timeout))
    .context("Down failed")?;

  if globals.output.is_json() {
    print_json(&DownOutput {
      project: project.name(),
      success: report.is_success(),
      services: report
        .removed
        .iter()
        .map(|(service, result)| ServiceDownOutput {
          service,
          removed: *result.as_ref().unwrap_or(&0),
          error: result.as_ref().err().map(ToString::to_string),
        })
        .collect(),
    })?;
    return Ok(report.is_success());
  }

  let width = name_width(report.removed.keys().map(String::as_str));
  for (service, result) in &report.removed {
    match result {
      Ok(0) => print_service_line(symbols::UNCHANGED, Tone::Muted, service, width, "no containers"),
      Ok(n) => print_service_line(symbols::REMOVE, Tone::Good, service, width, &format!("removed {}", n)),
      Err(e) => print_service_line(symbols::ERROR, Tone::Bad, service, width, &e.to_string()),
    }
  }

  println!();
  if report.is_success() {
    print_success(&format!(
      "Project {} is down ({} containers removed)",
      project.name(),
      report.total_removed()
    ));
  } else {
    print_error("Some containers could not be removed");
  }

  Ok(report.is_success())
}
