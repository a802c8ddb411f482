//! Plan types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::container::ContainerRecord;
use crate::project::ConfigError;

/// Policy deciding when existing containers are recreated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceStrategy {
  /// Recreate every existing container.
  Always,
  /// Never recreate, whatever changed.
  Never,
  /// Recreate only when the configuration changed or a dependency forces it.
  #[default]
  Changed,
}

impl ConvergenceStrategy {
  /// Map the `--force-recreate` / `--no-recreate` flags onto a strategy.
  ///
  /// # Errors
  ///
  /// `ConflictingStrategy` when both flags are set.
  pub fn from_flags(force_recreate: bool, no_recreate: bool) -> Result<Self, ConfigError> {
    match (force_recreate, no_recreate) {
      (true, true) => Err(ConfigError::ConflictingStrategy),
      (true, false) => Ok(ConvergenceStrategy::Always),
      (false, true) => Ok(ConvergenceStrategy::Never),
      (false, false) => Ok(ConvergenceStrategy::Changed),
    }
  }
}

impl fmt::Display for ConvergenceStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConvergenceStrategy::Always => write!(f, "always"),
      ConvergenceStrategy::Never => write!(f, "never"),
      ConvergenceStrategy::Changed => write!(f, "changed"),
    }
  }
}

/// What the `never` strategy does with a stopped container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeverStartsStopped {
  /// Start it. Its configuration is not inspected.
  #[default]
  Start,
  /// Leave it stopped.
  LeaveStopped,
}

/// The decision for one container slot of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerAction {
  /// Create and start a new container with this instance number.
  Create { number: u32 },
  /// Start an existing stopped container.
  Start(ContainerRecord),
  /// Replace a container, keeping its instance number.
  Recreate(ContainerRecord),
  /// Leave a container as it is.
  Noop(ContainerRecord),
  /// Stop and remove a surplus container.
  Remove(ContainerRecord),
}

impl ContainerAction {
  /// The existing container this action targets, if any.
  pub fn container(&self) -> Option<&ContainerRecord> {
    match self {
      ContainerAction::Create { .. } => None,
      ContainerAction::Start(c) | ContainerAction::Recreate(c) | ContainerAction::Noop(c) | ContainerAction::Remove(c) => {
        Some(c)
      }
    }
  }

  /// Instance number the action concerns.
  pub fn number(&self) -> u32 {
    match self {
      ContainerAction::Create { number } => *number,
      other => other.container().map(|c| c.number).unwrap_or_default(),
    }
  }

  pub fn kind(&self) -> ActionKind {
    match self {
      ContainerAction::Create { .. } => ActionKind::Create,
      ContainerAction::Start(_) => ActionKind::Start,
      ContainerAction::Recreate(_) => ActionKind::Recreate,
      ContainerAction::Noop(_) => ActionKind::Noop,
      ContainerAction::Remove(_) => ActionKind::Remove,
    }
  }
}

/// Kind of a [`ContainerAction`], without the container it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
  Create,
  Start,
  Recreate,
  Noop,
  Remove,
}

impl ActionKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ActionKind::Create => "create",
      ActionKind::Start => "start",
      ActionKind::Recreate => "recreate",
      ActionKind::Noop => "noop",
      ActionKind::Remove => "remove",
    }
  }
}

impl fmt::Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Summary action of a service's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
  Create,
  Start,
  Recreate,
  Noop,
}

impl fmt::Display for PlanAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PlanAction::Create => write!(f, "create"),
      PlanAction::Start => write!(f, "start"),
      PlanAction::Recreate => write!(f, "recreate"),
      PlanAction::Noop => write!(f, "noop"),
    }
  }
}

/// The computed actions for one service.
///
/// Actions are ordered for execution: removals first, then decisions for
/// retained containers by instance number, then creations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergencePlan {
  pub service: String,
  pub actions: Vec<ContainerAction>,
}

impl ConvergencePlan {
  pub fn new(service: impl Into<String>, actions: Vec<ContainerAction>) -> Self {
    Self {
      service: service.into(),
      actions,
    }
  }

  /// Summary action: recreate beats create beats start beats noop.
  pub fn action(&self) -> PlanAction {
    let has = |kind: ActionKind| self.actions.iter().any(|a| a.kind() == kind);
    if has(ActionKind::Recreate) {
      PlanAction::Recreate
    } else if has(ActionKind::Create) {
      PlanAction::Create
    } else if has(ActionKind::Start) {
      PlanAction::Start
    } else {
      PlanAction::Noop
    }
  }

  /// Containers the plan was computed from, by instance number.
  pub fn existing(&self) -> Vec<ContainerRecord> {
    let mut existing: Vec<ContainerRecord> = self.actions.iter().filter_map(|a| a.container().cloned()).collect();
    existing.sort_by_key(|c| c.number);
    existing
  }

  pub fn count(&self, kind: ActionKind) -> usize {
    self.actions.iter().filter(|a| a.kind() == kind).count()
  }

  /// True when applying the plan creates, replaces or removes a container.
  ///
  /// Such a plan is what triggers a forced cascade to dependents.
  pub fn changes_containers(&self) -> bool {
    self
      .actions
      .iter()
      .any(|a| matches!(a, ContainerAction::Create { .. } | ContainerAction::Recreate(_) | ContainerAction::Remove(_)))
  }

  /// True when applying the plan makes no runtime call at all.
  pub fn is_noop(&self) -> bool {
    self.actions.iter().all(|a| matches!(a, ContainerAction::Noop(_)))
  }
}
