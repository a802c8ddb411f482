//! Types for plan execution.
//!
//! This module defines the options, per-service outcomes and the report
//! produced by applying convergence plans.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use thiserror::Error;

use crate::consts::DEFAULT_TIMEOUT;
use crate::container::{Operation, RuntimeError};
use crate::converge::{ConvergencePlan, ConvergenceStrategy, NeverStartsStopped, PlannerOptions};

/// Plans keyed by service. A service whose observation failed (image
/// resolution, listing) carries the failure instead of a plan.
pub type ServicePlans = BTreeMap<String, Result<ConvergencePlan, ServiceFailure>>;

/// Why a service failed to converge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceFailure {
  /// The service's image could not be resolved to a content id.
  #[error("image resolution failed: {0}")]
  ImageResolution(String),

  /// A runtime call failed.
  #[error("{operation} failed for {container}: {message}")]
  Runtime {
    operation: Operation,
    container: String,
    message: String,
  },

  /// A container did not reach `running` in time.
  #[error("container {container} did not reach running within {timeout:?}")]
  Timeout { container: String, timeout: Duration },

  /// No plan was computed for a service the executor was asked to run.
  #[error("no convergence plan for service")]
  MissingPlan,

  /// The worker applying the service stopped unexpectedly.
  #[error("worker aborted: {0}")]
  Aborted(String),
}

impl ServiceFailure {
  /// Classify a runtime error raised while operating on `container`.
  pub fn from_runtime(operation: Operation, container: &str, error: RuntimeError) -> Self {
    match error {
      RuntimeError::ImageNotFound { .. } => ServiceFailure::ImageResolution(error.to_string()),
      other => ServiceFailure::Runtime {
        operation,
        container: container.to_string(),
        message: other.to_string(),
      },
    }
  }
}

/// Final state of one service after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
  Created,
  Started,
  Recreated,
  Noop,
  Failed(ServiceFailure),
  /// Not attempted because `dependency` failed.
  Skipped { dependency: String },
}

impl ServiceOutcome {
  pub fn label(&self) -> &'static str {
    match self {
      ServiceOutcome::Created => "created",
      ServiceOutcome::Started => "started",
      ServiceOutcome::Recreated => "recreated",
      ServiceOutcome::Noop => "noop",
      ServiceOutcome::Failed(_) => "failed",
      ServiceOutcome::Skipped { .. } => "skipped",
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, ServiceOutcome::Failed(_))
  }

  pub fn is_skipped(&self) -> bool {
    matches!(self, ServiceOutcome::Skipped { .. })
  }
}

impl std::fmt::Display for ServiceOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ServiceOutcome::Failed(failure) => write!(f, "failed: {}", failure),
      ServiceOutcome::Skipped { dependency } => write!(f, "skipped: dependency {} failed", dependency),
      other => write!(f, "{}", other.label()),
    }
  }
}

/// Container operations completed for one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
  pub created: usize,
  pub started: usize,
  pub recreated: usize,
  pub removed: usize,
}

impl ActionCounts {
  /// True when containers were created, replaced or removed.
  pub fn changed_containers(&self) -> bool {
    self.created + self.recreated + self.removed > 0
  }

  /// Outcome of a successful run with these counts.
  ///
  /// Recreate beats create beats start. A run that only removed surplus
  /// containers reports `noop`; the removals show in the counts.
  pub fn outcome(&self) -> ServiceOutcome {
    if self.recreated > 0 {
      ServiceOutcome::Recreated
    } else if self.created > 0 {
      ServiceOutcome::Created
    } else if self.started > 0 {
      ServiceOutcome::Started
    } else {
      ServiceOutcome::Noop
    }
  }
}

/// Result of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResult {
  pub outcome: ServiceOutcome,
  /// Operations that completed, including those before a failure.
  pub counts: ActionCounts,
}

impl ServiceResult {
  pub fn skipped(dependency: impl Into<String>) -> Self {
    Self {
      outcome: ServiceOutcome::Skipped {
        dependency: dependency.into(),
      },
      counts: ActionCounts::default(),
    }
  }

  pub fn failed(failure: ServiceFailure, counts: ActionCounts) -> Self {
    Self {
      outcome: ServiceOutcome::Failed(failure),
      counts,
    }
  }
}

/// Result of applying plans to a project.
#[derive(Debug, Default, Clone)]
pub struct ExecutionReport {
  /// Result per service in the run.
  pub results: BTreeMap<String, ServiceResult>,

  /// Services in the order they reached a terminal state.
  pub completion_order: Vec<String>,
}

impl ExecutionReport {
  pub(crate) fn record(&mut self, service: &str, result: ServiceResult) {
    self.completion_order.push(service.to_string());
    self.results.insert(service.to_string(), result);
  }

  /// Returns true if no service failed.
  pub fn is_success(&self) -> bool {
    !self.results.values().any(|r| r.outcome.is_failed())
  }

  pub fn outcome(&self, service: &str) -> Option<&ServiceOutcome> {
    self.results.get(service).map(|r| &r.outcome)
  }

  /// Failed services and why.
  pub fn failed(&self) -> Vec<(&str, &ServiceFailure)> {
    self
      .results
      .iter()
      .filter_map(|(name, r)| match &r.outcome {
        ServiceOutcome::Failed(failure) => Some((name.as_str(), failure)),
        _ => None,
      })
      .collect()
  }

  pub fn skipped(&self) -> Vec<&str> {
    self
      .results
      .iter()
      .filter(|(_, r)| r.outcome.is_skipped())
      .map(|(name, _)| name.as_str())
      .collect()
  }

  /// Sum of completed operations across services.
  pub fn totals(&self) -> ActionCounts {
    self.results.values().fold(ActionCounts::default(), |acc, r| ActionCounts {
      created: acc.created + r.counts.created,
      started: acc.started + r.counts.started,
      recreated: acc.recreated + r.counts.recreated,
      removed: acc.removed + r.counts.removed,
    })
  }
}

/// Configuration for applying plans.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
  pub strategy: ConvergenceStrategy,

  pub never_starts_stopped: NeverStartsStopped,

  /// Recreate every transitive dependent of a service whose containers were
  /// created, recreated or rescaled.
  pub always_recreate_deps: bool,

  /// Services to converge. `None` means all.
  pub selected: Option<BTreeSet<String>>,

  /// Also converge the transitive dependencies of selected services.
  pub start_deps: bool,

  /// Per-container timeout for stopping and for reaching `running`.
  pub timeout: Duration,

  /// Maximum number of services applied at once.
  pub parallelism: usize,
}

impl ExecuteOptions {
  pub fn planner(&self) -> PlannerOptions {
    PlannerOptions {
      strategy: self.strategy,
      never_starts_stopped: self.never_starts_stopped,
    }
  }
}

impl Default for ExecuteOptions {
  fn default() -> Self {
    Self {
      strategy: ConvergenceStrategy::default(),
      never_starts_stopped: NeverStartsStopped::default(),
      always_recreate_deps: false,
      selected: None,
      start_deps: true,
      timeout: DEFAULT_TIMEOUT,
      parallelism: num_cpus(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
