//! The container runtime collaborator.
//!
//! Every call is blocking I/O against an external daemon. The executor runs
//! them on tokio's blocking pool, never on the coordinating task.

use std::time::Duration;

use thiserror::Error;

use crate::project::ServiceSpec;
use crate::util::hash::Fingerprint;

use super::types::ContainerRecord;

/// A runtime operation, used for error reporting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  Create,
  Start,
  Stop,
  Remove,
  List,
  Inspect,
  ResolveImage,
}

impl std::fmt::Display for Operation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Operation::Create => "create",
      Operation::Start => "start",
      Operation::Stop => "stop",
      Operation::Remove => "remove",
      Operation::List => "list",
      Operation::Inspect => "inspect",
      Operation::ResolveImage => "resolve image",
    };
    write!(f, "{}", name)
  }
}

/// Errors reported by a [`ContainerRuntime`].
#[derive(Debug, Error)]
pub enum RuntimeError {
  /// The image reference could not be resolved to a content id.
  #[error("image {reference} could not be resolved: {message}")]
  ImageNotFound { reference: String, message: String },

  /// No container with this id exists.
  #[error("no such container: {0}")]
  NotFound(String),

  /// A daemon command exited unsuccessfully.
  #[error("{command} exited with code {code:?}: {stderr}")]
  Command {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The daemon's output could not be understood.
  #[error("unexpected runtime output: {0}")]
  Parse(String),

  /// The operation failed for another reason.
  #[error("{operation} failed: {message}")]
  Operation { operation: Operation, message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Everything a runtime needs to create one container.
#[derive(Debug, Clone, Copy)]
pub struct CreateRequest<'a> {
  pub project: &'a str,
  pub spec: &'a ServiceSpec,
  /// Instance number to assign.
  pub number: u32,
  /// Fingerprint to record as a label on the new container.
  pub fingerprint: &'a Fingerprint,
}

/// Operations the engine needs from a container daemon.
///
/// Implementations must label created containers with the project, service,
/// instance number and fingerprint so that [`list`](Self::list) can return
/// complete [`ContainerRecord`]s.
pub trait ContainerRuntime: Send + Sync + 'static {
  /// Create (but do not start) a container.
  fn create(&self, request: &CreateRequest<'_>) -> Result<ContainerRecord, RuntimeError>;

  fn start(&self, id: &str) -> Result<(), RuntimeError>;

  /// Stop a container, waiting up to `timeout` before it is killed.
  fn stop(&self, id: &str, timeout: Duration) -> Result<(), RuntimeError>;

  fn remove(&self, id: &str) -> Result<(), RuntimeError>;

  /// All containers, running or not, belonging to one service of a project.
  fn list(&self, project: &str, service: &str) -> Result<Vec<ContainerRecord>, RuntimeError>;

  /// Current state of one container.
  fn inspect(&self, id: &str) -> Result<ContainerRecord, RuntimeError>;

  /// Resolve an image reference (which may be a mutable tag) to its content id.
  fn resolve_image_id(&self, reference: &str) -> Result<String, RuntimeError>;
}
