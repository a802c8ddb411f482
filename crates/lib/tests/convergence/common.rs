//! Shared helpers for convergence tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use stevedore_lib::container::{MemoryRuntime, Operation};
use stevedore_lib::execute::{ExecuteOptions, UpOptions, UpResult, up};
use stevedore_lib::project::{Project, parse_project};

/// db <- web <- nginx
pub const THREE_TIER: &str = r#"
services:
  db:
    image: postgres:16
    environment:
      POSTGRES_PASSWORD: secret
  web:
    image: example/web:latest
    command: serve --port 8080
    depends_on: [db]
  nginx:
    image: nginx:1.27
    links: ["web:app"]
"#;

pub fn load(yaml: &str) -> Project {
  parse_project(yaml, "demo", Path::new("stevedore.yaml")).unwrap()
}

pub fn three_tier() -> Project {
  load(THREE_TIER)
}

/// A runtime that knows every image used by the fixtures.
pub fn runtime() -> Arc<MemoryRuntime> {
  Arc::new(
    MemoryRuntime::new()
      .with_image("postgres:16", "sha256:postgres")
      .with_image("example/web:latest", "sha256:web")
      .with_image("nginx:1.27", "sha256:nginx")
      .with_image("redis:7", "sha256:redis"),
  )
}

pub fn options() -> UpOptions {
  UpOptions {
    execute: ExecuteOptions {
      timeout: Duration::from_secs(2),
      parallelism: 4,
      ..ExecuteOptions::default()
    },
    ..UpOptions::default()
  }
}

pub async fn converge(runtime: &Arc<MemoryRuntime>, project: &Project, options: &UpOptions) -> UpResult {
  up(Arc::clone(runtime), project, options).await.unwrap()
}

/// Operations recorded for one service, in order.
pub fn operations_for(runtime: &MemoryRuntime, service: &str) -> Vec<Operation> {
  runtime.events_for(service).into_iter().map(|e| e.operation).collect()
}
