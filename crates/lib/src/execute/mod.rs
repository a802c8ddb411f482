//! Plan execution.
//!
//! This module applies convergence plans to a container runtime:
//! - Dependency-ordered dispatch: a service starts once all its dependencies finished
//! - Parallel execution of independent services, bounded by a semaphore
//! - Failure propagation: dependents of a failed service are skipped
//! - Recreate cascades to dependents when `always_recreate_deps` is set
//!
//! Unlike wave-by-wave scheduling, a service is dispatched the moment its
//! last dependency completes, so one slow branch never holds back another.

pub mod down;
pub(crate) mod service;
pub mod types;
pub mod up;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::container::ContainerRuntime;
use crate::converge::{ConvergencePlan, ServiceGraph, plan_service};
use crate::project::{ConfigError, Project, ServiceSpec};

use service::{ServiceRun, ServiceWorker};

pub use down::{DownReport, down};
pub use types::{
  ActionCounts, ExecuteOptions, ExecutionReport, ServiceFailure, ServiceOutcome, ServicePlans, ServiceResult,
};
pub use up::{PlannedProject, UpOptions, UpResult, plan_project, up};

/// What to do with a service whose dependencies have all finished.
enum Dispatch {
  Run { spec: ServiceSpec, plan: ConvergencePlan },
  Skip { dependency: String },
  Fail(ServiceFailure),
}

/// Applies convergence plans to a runtime.
pub struct PlanExecutor<R: ContainerRuntime> {
  runtime: Arc<R>,
  project: Arc<Project>,
}

impl<R: ContainerRuntime> PlanExecutor<R> {
  pub fn new(runtime: Arc<R>, project: Arc<Project>) -> Self {
    Self { runtime, project }
  }

  /// Apply `plans` to every service in `graph` selected by `options`.
  ///
  /// A service whose entry in `plans` is an error, or which has no entry,
  /// fails without touching the runtime. Failures never abort independent
  /// services; they only skip the failed service's dependents.
  ///
  /// # Errors
  ///
  /// `UnknownService` when the selection names a service outside the graph.
  pub async fn apply(
    &self,
    graph: &ServiceGraph,
    mut plans: ServicePlans,
    options: &ExecuteOptions,
  ) -> Result<ExecutionReport, ConfigError> {
    let graph = graph.select(options.selected.as_ref(), options.start_deps)?;
    let order = graph.order_for_up();

    info!(
      project = %self.project.name(),
      services = order.len(),
      parallelism = options.parallelism,
      strategy = %options.strategy,
      "applying plans"
    );

    let mut report = ExecutionReport::default();
    let mut forced: HashSet<String> = HashSet::new();
    let mut pending: HashMap<String, usize> = order
      .iter()
      .map(|name| (name.clone(), graph.dependencies_of(name).len()))
      .collect();
    let mut ready: VecDeque<String> = order.iter().filter(|name| pending[*name] == 0).cloned().collect();

    let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
    let mut join_set = JoinSet::new();
    let mut running: HashMap<tokio::task::Id, String> = HashMap::new();

    loop {
      while let Some(name) = ready.pop_front() {
        match self.dispatch(&graph, &name, &mut plans, &forced, &report, options) {
          Dispatch::Run { spec, plan } => {
            debug!(service = %name, action = %plan.action(), "dispatching service");
            let worker = ServiceWorker::new(Arc::clone(&self.runtime), self.project.name(), spec, options.timeout);
            let semaphore = Arc::clone(&semaphore);
            let handle = join_set.spawn(async move {
              let Ok(_permit) = semaphore.acquire_owned().await else {
                return ServiceRun {
                  counts: ActionCounts::default(),
                  failure: Some(ServiceFailure::Aborted("worker pool closed".to_string())),
                };
              };
              worker.run(plan).await
            });
            running.insert(handle.id(), name);
          }
          Dispatch::Skip { dependency } => {
            warn!(service = %name, dependency = %dependency, "skipping service due to failed dependency");
            report.record(&name, ServiceResult::skipped(dependency));
            release(&graph, &name, &mut pending, &mut ready);
          }
          Dispatch::Fail(failure) => {
            error!(service = %name, error = %failure, "service failed");
            report.record(&name, ServiceResult::failed(failure, ActionCounts::default()));
            release(&graph, &name, &mut pending, &mut ready);
          }
        }
      }

      let Some(joined) = join_set.join_next_with_id().await else {
        break;
      };

      let (id, run) = match joined {
        Ok((id, run)) => (id, run),
        Err(e) => {
          error!(error = %e, "service task panicked");
          (
            e.id(),
            ServiceRun {
              counts: ActionCounts::default(),
              failure: Some(ServiceFailure::Aborted(e.to_string())),
            },
          )
        }
      };

      let Some(name) = running.remove(&id) else {
        error!("finished task was not tracked");
        continue;
      };

      match run.failure {
        Some(failure) => {
          error!(service = %name, error = %failure, "service failed");
          report.record(&name, ServiceResult::failed(failure, run.counts));
        }
        None => {
          let outcome = run.counts.outcome();
          info!(service = %name, outcome = %outcome, "service converged");

          if options.always_recreate_deps && run.counts.changed_containers() {
            let dependents = graph.transitive_dependents_of(&name);
            if !dependents.is_empty() {
              debug!(service = %name, dependents = ?dependents, "forcing recreate of dependents");
            }
            forced.extend(dependents);
          }

          report.record(
            &name,
            ServiceResult {
              outcome,
              counts: run.counts,
            },
          );
        }
      }

      release(&graph, &name, &mut pending, &mut ready);
    }

    info!(
      succeeded = report.results.values().filter(|r| !r.outcome.is_failed() && !r.outcome.is_skipped()).count(),
      failed = report.failed().len(),
      skipped = report.skipped().len(),
      "apply complete"
    );

    Ok(report)
  }

  fn dispatch(
    &self,
    graph: &ServiceGraph,
    name: &str,
    plans: &mut ServicePlans,
    forced: &HashSet<String>,
    report: &ExecutionReport,
    options: &ExecuteOptions,
  ) -> Dispatch {
    for dependency in graph.dependencies_of(name) {
      match report.outcome(&dependency) {
        Some(ServiceOutcome::Failed(_)) => return Dispatch::Skip { dependency },
        Some(ServiceOutcome::Skipped { dependency }) => {
          return Dispatch::Skip {
            dependency: dependency.clone(),
          };
        }
        _ => {}
      }
    }

    let Some(spec) = self.project.service(name) else {
      return Dispatch::Fail(ServiceFailure::MissingPlan);
    };

    let plan = match plans.remove(name) {
      Some(Ok(plan)) => plan,
      Some(Err(failure)) => return Dispatch::Fail(failure),
      None => return Dispatch::Fail(ServiceFailure::MissingPlan),
    };

    let plan = if forced.contains(name) {
      debug!(service = %name, "re-planning after dependency change");
      plan_service(spec, &plan.existing(), &options.planner(), true)
    } else {
      plan
    };

    Dispatch::Run {
      spec: spec.clone(),
      plan,
    }
  }
}

/// Mark `name` finished and queue dependents whose dependencies are all done.
fn release(graph: &ServiceGraph, name: &str, pending: &mut HashMap<String, usize>, ready: &mut VecDeque<String>) {
  for dependent in graph.dependents_of(name) {
    if let Some(count) = pending.get_mut(&dependent) {
      *count = count.saturating_sub(1);
      if *count == 0 {
        ready.push_back(dependent);
      }
    }
  }
}

/// Plans as `apply` would run them, assuming every service succeeds.
///
/// With `always_recreate_deps`, dependents of a service whose plan changes
/// containers are re-planned as forced. Services outside the selection are
/// dropped.
///
/// # Errors
///
/// `UnknownService` when the selection names a service outside the graph.
pub fn preview(
  project: &Project,
  graph: &ServiceGraph,
  plans: &ServicePlans,
  options: &ExecuteOptions,
) -> Result<ServicePlans, ConfigError> {
  let graph = graph.select(options.selected.as_ref(), options.start_deps)?;
  let mut forced: HashSet<String> = HashSet::new();
  let mut previewed = BTreeMap::new();

  for name in graph.order_for_up() {
    let entry = match (plans.get(&name), project.service(&name)) {
      (Some(Ok(plan)), Some(spec)) => {
        let plan = if forced.contains(&name) {
          plan_service(spec, &plan.existing(), &options.planner(), true)
        } else {
          plan.clone()
        };
        if options.always_recreate_deps && plan.changes_containers() {
          forced.extend(graph.transitive_dependents_of(&name));
        }
        Ok(plan)
      }
      (Some(Err(failure)), _) => Err(failure.clone()),
      _ => Err(ServiceFailure::MissingPlan),
    };
    previewed.insert(name, entry);
  }

  Ok(previewed)
}
