//! Observe, plan and apply: the `up` operation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::container::{ContainerRecord, ContainerRuntime, Operation};
use crate::converge::{ServiceGraph, plan_service};
use crate::project::{ConfigError, Project};

use super::service::blocking;
use super::types::{ExecuteOptions, ExecutionReport, ServiceFailure, ServicePlans};
use super::{PlanExecutor, preview};

/// Options for [`up`] and [`plan_project`].
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
  pub execute: ExecuteOptions,

  /// Replica counts overriding the declared ones.
  pub scale: Vec<(String, u32)>,
}

/// A project after observation and planning.
#[derive(Debug, Clone)]
pub struct PlannedProject {
  /// The project with scale overrides and resolved image ids applied.
  pub project: Project,

  /// The dependency graph of the selected services.
  pub graph: ServiceGraph,

  /// Plans for the selected services, before any cascade.
  pub plans: ServicePlans,
}

impl PlannedProject {
  /// Plans as they would be applied, including forced cascades.
  pub fn preview(&self, options: &ExecuteOptions) -> Result<ServicePlans, ConfigError> {
    preview(&self.project, &self.graph, &self.plans, options)
  }
}

/// Outcome of [`up`].
#[derive(Debug, Clone)]
pub struct UpResult {
  /// Plans computed before execution.
  pub plans: ServicePlans,
  pub report: ExecutionReport,
}

/// Observe the runtime and compute a plan for every selected service.
///
/// Image references are resolved to content ids first so that a moved tag
/// changes the fingerprint. A service whose image cannot be resolved, or
/// whose containers cannot be listed, gets a failure entry instead of a plan.
///
/// # Errors
///
/// Configuration errors: unknown services in the selection or in scale
/// overrides, invalid scales, and dependency cycles.
pub async fn plan_project<R: ContainerRuntime>(
  runtime: &Arc<R>,
  project: &Project,
  options: &UpOptions,
) -> Result<PlannedProject, ConfigError> {
  let project = project.with_scale_overrides(&options.scale)?;
  let graph = ServiceGraph::build(&project)?.select(options.execute.selected.as_ref(), options.execute.start_deps)?;
  let order = graph.order_for_up();

  debug!(project = %project.name(), services = ?order, "observing services");

  let mut image_ids: HashMap<String, Result<String, ServiceFailure>> = HashMap::new();
  let mut observed: HashMap<String, Result<Vec<ContainerRecord>, ServiceFailure>> = HashMap::new();

  for name in &order {
    let Some(spec) = project.service(name) else {
      continue;
    };

    let reference = spec.image.clone();
    let resolved = blocking(runtime, Operation::ResolveImage, move |rt| rt.resolve_image_id(&reference))
      .await
      .map_err(|e| ServiceFailure::ImageResolution(e.to_string()));
    if let Err(failure) = &resolved {
      warn!(service = %name, image = %spec.image, error = %failure, "could not resolve image");
    }
    image_ids.insert(name.clone(), resolved);

    let project_name = project.name().to_string();
    let service = name.clone();
    let listed = blocking(runtime, Operation::List, move |rt| rt.list(&project_name, &service))
      .await
      .map_err(|e| ServiceFailure::from_runtime(Operation::List, name, e));
    observed.insert(name.clone(), listed);
  }

  let project = project.map_services(|spec| match image_ids.get(&spec.name) {
    Some(Ok(id)) => spec.clone().with_image_id(id.clone()),
    _ => spec.clone(),
  });

  let planner = options.execute.planner();
  let mut plans = ServicePlans::new();
  for name in order {
    let Some(spec) = project.service(&name) else {
      continue;
    };

    let entry = match (image_ids.remove(&name), observed.remove(&name)) {
      (Some(Err(failure)), _) | (_, Some(Err(failure))) => Err(failure),
      (Some(Ok(_)), Some(Ok(existing))) => Ok(plan_service(spec, &existing, &planner, false)),
      _ => Err(ServiceFailure::MissingPlan),
    };

    if let Ok(plan) = &entry {
      debug!(service = %name, action = %plan.action(), actions = plan.actions.len(), "planned service");
    }
    plans.insert(name, entry);
  }

  Ok(PlannedProject { project, graph, plans })
}

/// Converge a project: observe, plan, then apply.
///
/// # Errors
///
/// Only configuration errors. Runtime failures are reported per service in
/// the returned [`ExecutionReport`].
pub async fn up<R: ContainerRuntime>(
  runtime: Arc<R>,
  project: &Project,
  options: &UpOptions,
) -> Result<UpResult, ConfigError> {
  info!(project = %project.name(), "bringing project up");

  let planned = plan_project(&runtime, project, options).await?;
  let executor = PlanExecutor::new(runtime, Arc::new(planned.project));
  let report = executor
    .apply(&planned.graph, planned.plans.clone(), &options.execute)
    .await?;

  Ok(UpResult {
    plans: planned.plans,
    report,
  })
}
