//! Declared project state.
//!
//! A [`Project`] is the ordered set of [`ServiceSpec`]s for one invocation.
//! It is validated once on construction and read-only afterwards.

pub mod error;
pub mod load;
pub mod types;

pub use error::ConfigError;
pub use load::{load_project, parse_project};
pub use types::{Project, Resources, ServiceSpec};
