//! Per-container convergence decisions.
//!
//! For each existing container of a service the planner decides, in order:
//!
//! 1. `always` strategy: recreate.
//! 2. `never` strategy: leave it, or start it if stopped and
//!    [`NeverStartsStopped::Start`] is configured. Never recreate.
//! 3. `changed` strategy: recreate if a dependency forces it or the stored
//!    fingerprint differs from the declared one; start if stopped; otherwise
//!    leave it.
//!
//! Containers that do not exist yet are the [`scale`](super::scale)
//! reconciler's business.

use crate::container::ContainerRecord;
use crate::project::ServiceSpec;
use crate::util::hash::Fingerprint;

use super::fingerprint::fingerprint;
use super::scale::reconcile;
use super::types::{ContainerAction, ConvergencePlan, ConvergenceStrategy, NeverStartsStopped};

/// Inputs to planning that hold for every service in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerOptions {
  pub strategy: ConvergenceStrategy,
  pub never_starts_stopped: NeverStartsStopped,
}

fn decide(
  desired: &Fingerprint,
  container: &ContainerRecord,
  options: &PlannerOptions,
  dependency_forces_recreate: bool,
) -> ContainerAction {
  let container = container.clone();
  let stopped = !container.status.is_running();

  match options.strategy {
    ConvergenceStrategy::Always => ContainerAction::Recreate(container),
    ConvergenceStrategy::Never => {
      if stopped && options.never_starts_stopped == NeverStartsStopped::Start {
        ContainerAction::Start(container)
      } else {
        ContainerAction::Noop(container)
      }
    }
    ConvergenceStrategy::Changed => {
      if dependency_forces_recreate || container.fingerprint.as_ref() != Some(desired) {
        ContainerAction::Recreate(container)
      } else if stopped {
        ContainerAction::Start(container)
      } else {
        ContainerAction::Noop(container)
      }
    }
  }
}

/// Decide an action for every existing container, ordered by instance number.
pub fn plan(
  spec: &ServiceSpec,
  existing: &[ContainerRecord],
  options: &PlannerOptions,
  dependency_forces_recreate: bool,
) -> Vec<ContainerAction> {
  let desired = fingerprint(spec);

  let mut sorted: Vec<&ContainerRecord> = existing.iter().collect();
  sorted.sort_by_key(|c| c.number);

  sorted
    .into_iter()
    .map(|c| decide(&desired, c, options, dependency_forces_recreate))
    .collect()
}

/// Plan a service end to end: per-container decisions, then scale.
pub fn plan_service(
  spec: &ServiceSpec,
  existing: &[ContainerRecord],
  options: &PlannerOptions,
  dependency_forces_recreate: bool,
) -> ConvergencePlan {
  let per_container = plan(spec, existing, options, dependency_forces_recreate);
  reconcile(spec, existing, per_container)
}
