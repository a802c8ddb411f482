//! Convergence planning.
//!
//! Planning is pure: given a declared [`ServiceSpec`](crate::project::ServiceSpec),
//! the containers observed for it, and a [`ConvergenceStrategy`], it decides
//! what to do with each container. Nothing here performs I/O.
//!
//! - [`fingerprint`]: stable comparison key for a service's configuration
//! - [`graph`]: the service dependency DAG
//! - [`planner`]: per-container decisions
//! - [`scale`]: reconciling decisions with the desired replica count

pub mod fingerprint;
pub mod graph;
pub mod planner;
pub mod scale;
pub mod types;

pub use fingerprint::fingerprint;
pub use graph::ServiceGraph;
pub use planner::{PlannerOptions, plan, plan_service};
pub use scale::reconcile;
pub use types::{ActionKind, ContainerAction, ConvergencePlan, ConvergenceStrategy, NeverStartsStopped, PlanAction};
