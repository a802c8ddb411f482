//! Observed containers and the runtime collaborator.
//!
//! The engine never talks to a container daemon directly. Everything it needs
//! goes through [`ContainerRuntime`]; two implementations ship with the crate:
//! - [`DockerCli`]: drives the `docker` binary
//! - [`MemoryRuntime`]: an in-process daemon used by tests and dry runs

pub mod docker;
pub mod memory;
pub mod runtime;
pub mod types;

pub use docker::DockerCli;
pub use memory::{MemoryRuntime, RuntimeEvent};
pub use runtime::{ContainerRuntime, CreateRequest, Operation, RuntimeError};
pub use types::{ContainerRecord, ContainerStatus, container_name};
