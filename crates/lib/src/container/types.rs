//! Types describing observed containers.

use serde::{Deserialize, Serialize};

use crate::util::hash::Fingerprint;

/// Runtime status of a container, reduced to what planning cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
  Running,
  Stopped,
  /// Any other daemon state (`paused`, `restarting`, `dead`, ...), verbatim.
  Other(String),
}

impl ContainerStatus {
  /// Map a daemon state string onto a status.
  pub fn from_state(state: &str) -> Self {
    match state {
      "running" => ContainerStatus::Running,
      "exited" | "created" | "stopped" => ContainerStatus::Stopped,
      other => ContainerStatus::Other(other.to_string()),
    }
  }

  pub fn is_running(&self) -> bool {
    matches!(self, ContainerStatus::Running)
  }
}

impl std::fmt::Display for ContainerStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ContainerStatus::Running => write!(f, "running"),
      ContainerStatus::Stopped => write!(f, "stopped"),
      ContainerStatus::Other(state) => write!(f, "{}", state),
    }
  }
}

/// An observed container, snapshotted at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
  /// Daemon-assigned container id.
  pub id: String,

  /// Container name, `<project>_<service>_<number>`.
  pub name: String,

  /// Owning service.
  pub service: String,

  /// 1-based instance number, unique among a service's live containers.
  pub number: u32,

  pub status: ContainerStatus,

  /// Fingerprint label written at creation. `None` for containers the engine
  /// did not create, which therefore never match a declared configuration.
  pub fingerprint: Option<Fingerprint>,
}

/// Canonical container name for a service instance.
pub fn container_name(project: &str, service: &str, number: u32) -> String {
  format!("{}_{}_{}", project, service, number)
}
