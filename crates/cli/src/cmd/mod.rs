mod down;
mod plan;
mod up;

pub use down::cmd_down;
pub use plan::cmd_plan;
pub use up::cmd_up;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use stevedore_lib::container::DockerCli;
use stevedore_lib::converge::{ConvergenceStrategy, NeverStartsStopped};
use stevedore_lib::execute::{ExecuteOptions, UpOptions};
use stevedore_lib::project::{Project, load_project};

use crate::{ConvergeArgs, Globals};

fn load(globals: &Globals) -> Result<Project> {
  let project = load_project(&globals.file, globals.project_name.as_deref())
    .with_context(|| format!("Failed to load {}", globals.file.display()))?;
  debug!(project = %project.name(), services = project.len(), "loaded project");
  Ok(project)
}

fn container_runtime(globals: &Globals) -> Arc<DockerCli> {
  Arc::new(DockerCli::with_binary(globals.docker.as_str()))
}

fn async_runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Translate `up`/`plan` flags into library options.
fn up_options(args: &ConvergeArgs) -> Result<UpOptions> {
  let strategy = ConvergenceStrategy::from_flags(args.force_recreate, args.no_recreate)?;
  let never_starts_stopped = if args.never_start_stopped {
    NeverStartsStopped::LeaveStopped
  } else {
    NeverStartsStopped::Start
  };

  let mut execute = ExecuteOptions {
    strategy,
    never_starts_stopped,
    always_recreate_deps: args.always_recreate_deps,
    selected: (!args.services.is_empty()).then(|| args.services.iter().cloned().collect()),
    start_deps: !args.no_deps,
    timeout: args.timeout,
    ..ExecuteOptions::default()
  };
  if let Some(parallel) = args.parallel {
    execute.parallelism = usize::from(parallel);
  }

  Ok(UpOptions {
    execute,
    scale: args.scale.clone(),
  })
}
