//! Configuration errors.
//!
//! Every variant is fatal and is reported before any container is touched.

use std::path::PathBuf;

use thiserror::Error;

/// Errors in the declared configuration or in the options of a run.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Two services share a name.
  #[error("duplicate service name: {0}")]
  DuplicateService(String),

  /// A `depends_on` or `links` entry names a service that does not exist.
  #[error("service {service} depends on undefined service {dependency}")]
  UnknownDependency { service: String, dependency: String },

  /// A service was named (selection or scale override) that does not exist.
  #[error("no such service: {0}")]
  UnknownService(String),

  /// The dependency graph contains a cycle.
  #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
  CyclicDependency { cycle: Vec<String> },

  /// `--force-recreate` and `--no-recreate` were both given.
  #[error("--force-recreate and --no-recreate cannot be combined")]
  ConflictingStrategy,

  /// A desired scale of zero.
  #[error("service {service} has invalid scale {scale}: must be at least 1")]
  InvalidScale { service: String, scale: u32 },

  /// The declaration file could not be read.
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The declaration file is not valid YAML for a project.
  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  /// The declaration parsed but describes an invalid service.
  #[error("invalid service {service}: {message}")]
  InvalidService { service: String, message: String },
}
