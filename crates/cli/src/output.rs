//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, per-service result lines, and durations.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ADD: &str = "+";
  pub const MODIFY: &str = "~";
  pub const REMOVE: &str = "-";
  pub const UNCHANGED: &str = "=";
}

/// Color applied to a service line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
  Good,
  Change,
  Bad,
  Muted,
}

/// Width of the service-name column for a set of names.
pub fn name_width<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
  names.into_iter().map(str::len).max().unwrap_or(0)
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// Print `<symbol> <service> <detail>` with the service name padded to `width`.
pub fn print_service_line(symbol: &str, tone: Tone, service: &str, width: usize, detail: &str) {
  let padded = format!("{:<width$}", service, width = width);
  let symbol = match tone {
    Tone::Good => symbol.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    Tone::Change => symbol.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
    Tone::Bad => symbol.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
    Tone::Muted => symbol.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
  };
  println!(
    "{} {}  {}",
    symbol,
    padded.if_supports_color(Stream::Stdout, |s| s.bold()),
    detail
  );
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
