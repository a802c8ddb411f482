//! Tearing a project down.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::container::{ContainerRuntime, Operation};
use crate::converge::ServiceGraph;
use crate::project::{ConfigError, Project};

use super::service::blocking;
use super::types::ServiceFailure;

/// Outcome of [`down`]: containers removed per service, or why a service
/// could not be fully removed.
#[derive(Debug, Default, Clone)]
pub struct DownReport {
  pub removed: BTreeMap<String, Result<usize, ServiceFailure>>,
}

impl DownReport {
  pub fn is_success(&self) -> bool {
    self.removed.values().all(Result::is_ok)
  }

  pub fn total_removed(&self) -> usize {
    self.removed.values().filter_map(|r| r.as_ref().ok()).sum()
  }
}

/// Stop and remove every container of the project, dependents first.
///
/// A failing service does not stop the teardown of the others.
///
/// # Errors
///
/// `CyclicDependency` or `UnknownDependency` if the project graph is invalid.
pub async fn down<R: ContainerRuntime>(
  runtime: Arc<R>,
  project: &Project,
  timeout: Duration,
) -> Result<DownReport, ConfigError> {
  let graph = ServiceGraph::build(project)?;
  let mut report = DownReport::default();

  info!(project = %project.name(), "tearing project down");

  for name in graph.order_for_down() {
    let result = remove_service(&runtime, project.name(), &name, timeout).await;
    match &result {
      Ok(count) => info!(service = %name, removed = count, "service removed"),
      Err(e) => error!(service = %name, error = %e, "failed to remove service"),
    }
    report.removed.insert(name, result);
  }

  Ok(report)
}

async fn remove_service<R: ContainerRuntime>(
  runtime: &Arc<R>,
  project: &str,
  service: &str,
  timeout: Duration,
) -> Result<usize, ServiceFailure> {
  let project_name = project.to_string();
  let service_name = service.to_string();
  let containers = blocking(runtime, Operation::List, move |rt| rt.list(&project_name, &service_name))
    .await
    .map_err(|e| ServiceFailure::from_runtime(Operation::List, service, e))?;

  for container in &containers {
    let id = container.id.clone();
    blocking(runtime, Operation::Stop, move |rt| rt.stop(&id, timeout))
      .await
      .map_err(|e| ServiceFailure::from_runtime(Operation::Stop, &container.name, e))?;

    let id = container.id.clone();
    blocking(runtime, Operation::Remove, move |rt| rt.remove(&id))
      .await
      .map_err(|e| ServiceFailure::from_runtime(Operation::Remove, &container.name, e))?;
  }

  Ok(containers.len())
}
