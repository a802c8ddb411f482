//! stevedore-lib: service convergence engine for stevedore
//!
//! This crate brings a set of declared services into agreement with the
//! containers observed on a single container daemon:
//! - `project`: declared services (`ServiceSpec`, `Project`) and the YAML loader
//! - `container`: observed containers and the `ContainerRuntime` collaborator
//! - `converge`: fingerprinting, the dependency graph, and planning
//! - `execute`: dependency-ordered, parallel application of plans

pub mod consts;
pub mod container;
pub mod converge;
pub mod execute;
pub mod project;
pub mod util;
