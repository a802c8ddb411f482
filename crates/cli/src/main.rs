mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use stevedore_lib::consts::DEFAULT_PROJECT_FILE;

use crate::output::OutputFormat;

/// stv - converge declared container services
#[derive(Parser)]
#[command(name = "stv")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the declaration file
  #[arg(short, long, global = true, env = "STV_FILE", default_value = DEFAULT_PROJECT_FILE)]
  file: PathBuf,

  /// Project name (default: the declaration file's directory name)
  #[arg(short, long, global = true, env = "STV_PROJECT_NAME")]
  project_name: Option<String>,

  /// Container CLI to drive
  #[arg(long, global = true, env = "STV_DOCKER", default_value = "docker", hide = true)]
  docker: String,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create, start and recreate containers until they match the declaration
  Up(ConvergeArgs),

  /// Show what `up` would do without changing anything
  Plan(ConvergeArgs),

  /// Stop and remove every container of the project
  Down {
    /// Seconds (or a duration like `1m30s`) to wait for each container to stop
    #[arg(short, long, value_parser = parse_timeout, default_value = "10")]
    timeout: Duration,
  },
}

/// Flags shared by `up` and `plan`.
#[derive(Args, Debug)]
pub struct ConvergeArgs {
  /// Services to converge (default: all)
  #[arg(value_name = "SERVICE")]
  pub services: Vec<String>,

  /// Recreate containers even if their configuration is unchanged
  #[arg(long, conflicts_with = "no_recreate")]
  pub force_recreate: bool,

  /// Never recreate existing containers
  #[arg(long)]
  pub no_recreate: bool,

  /// Recreate every dependent of a service whose containers changed
  #[arg(long)]
  pub always_recreate_deps: bool,

  /// Do not converge the dependencies of the named services
  #[arg(long)]
  pub no_deps: bool,

  /// Override a service's replica count for this run
  #[arg(long, value_name = "SERVICE=N", value_parser = parse_scale)]
  pub scale: Vec<(String, u32)>,

  /// Seconds (or a duration like `1m30s`) to wait per container
  #[arg(short, long, value_parser = parse_timeout, default_value = "10")]
  pub timeout: Duration,

  /// Maximum number of services converged at once (default: CPU count)
  #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
  pub parallel: Option<u16>,

  /// With --no-recreate, leave stopped containers stopped
  #[arg(long, requires = "no_recreate")]
  pub never_start_stopped: bool,
}

/// Global settings every command needs.
pub struct Globals {
  pub file: PathBuf,
  pub project_name: Option<String>,
  pub docker: String,
  pub output: OutputFormat,
}

fn parse_scale(s: &str) -> Result<(String, u32), String> {
  let (service, count) = s
    .split_once('=')
    .ok_or_else(|| format!("expected SERVICE=N, got '{}'", s))?;
  if service.is_empty() {
    return Err(format!("missing service name in '{}'", s));
  }
  let count = count
    .parse::<u32>()
    .map_err(|_| format!("invalid replica count '{}' for {}", count, service))?;
  Ok((service.to_string(), count))
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
  if let Ok(secs) = s.parse::<u64>() {
    return Ok(Duration::from_secs(secs));
  }
  humantime::parse_duration(s).map_err(|e| format!("invalid timeout '{}': {}", s, e))
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let globals = Globals {
    file: cli.file,
    project_name: cli.project_name,
    docker: cli.docker,
    output: cli.output,
  };

  let success = match cli.command {
    Commands::Up(args) => cmd::cmd_up(&globals, &args)?,
    Commands::Plan(args) => cmd::cmd_plan(&globals, &args)?,
    Commands::Down { timeout } => cmd::cmd_down(&globals, timeout)?,
  };

  Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;
  use stevedore_lib::consts::DEFAULT_TIMEOUT;

  #[test]
  fn cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn scale_parses() {
    assert_eq!(parse_scale("web=3").unwrap(), ("web".to_string(), 3));
    assert!(parse_scale("web").is_err());
    assert!(parse_scale("=3").is_err());
    assert!(parse_scale("web=many").is_err());
  }

  #[test]
  fn timeout_accepts_seconds_and_durations() {
    assert_eq!(parse_timeout("5").unwrap(), Duration::from_secs(5));
    assert_eq!(parse_timeout("1m30s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_timeout("250ms").unwrap(), Duration::from_millis(250));
    assert!(parse_timeout("soon").is_err());
  }

  #[test]
  fn default_timeout_matches_library() {
    let cli = Cli::parse_from(["stv", "up"]);
    let Commands::Up(args) = cli.command else {
      panic!("expected up");
    };
    assert_eq!(args.timeout, DEFAULT_TIMEOUT);
    assert!(args.services.is_empty());
  }

  #[test]
  fn strategy_flags_conflict() {
    let result = Cli::try_parse_from(["stv", "up", "--force-recreate", "--no-recreate"]);
    assert!(result.is_err());
  }

  #[test]
  fn up_flags_parse() {
    let cli = Cli::parse_from([
      "stv",
      "-f",
      "demo.yaml",
      "up",
      "web",
      "--no-deps",
      "--scale",
      "web=2",
      "--parallel",
      "3",
    ]);
    assert_eq!(cli.file, PathBuf::from("demo.yaml"));
    let Commands::Up(args) = cli.command else {
      panic!("expected up");
    };
    assert_eq!(args.services, vec!["web"]);
    assert!(args.no_deps);
    assert_eq!(args.scale, vec![("web".to_string(), 2)]);
    assert_eq!(args.parallel, Some(3));
  }
}
