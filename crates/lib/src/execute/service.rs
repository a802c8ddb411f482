//! Applying one service's plan.
//!
//! Actions run one after another in plan order. Every runtime call is
//! blocking, so it is moved onto tokio's blocking pool; waiting for a
//! container to report `running` polls [`ContainerRuntime::inspect`] under a
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::consts::RUNNING_POLL_INTERVAL;
use crate::container::{ContainerRecord, ContainerRuntime, CreateRequest, Operation, RuntimeError, container_name};
use crate::converge::{ContainerAction, ConvergencePlan, fingerprint};
use crate::project::ServiceSpec;
use crate::util::hash::Fingerprint;

use super::types::{ActionCounts, ServiceFailure};

/// Run a blocking runtime call on the blocking pool.
pub(crate) async fn blocking<R, T, F>(runtime: &Arc<R>, operation: Operation, f: F) -> Result<T, RuntimeError>
where
  R: ContainerRuntime,
  T: Send + 'static,
  F: FnOnce(&R) -> Result<T, RuntimeError> + Send + 'static,
{
  let runtime = Arc::clone(runtime);
  match tokio::task::spawn_blocking(move || f(runtime.as_ref())).await {
    Ok(result) => result,
    Err(e) => Err(RuntimeError::Operation {
      operation,
      message: format!("runtime task failed: {}", e),
    }),
  }
}

/// What a finished service worker hands back to the coordinator.
#[derive(Debug)]
pub(crate) struct ServiceRun {
  pub counts: ActionCounts,
  pub failure: Option<ServiceFailure>,
}

/// Applies the actions of one service.
pub(crate) struct ServiceWorker<R: ContainerRuntime> {
  runtime: Arc<R>,
  project: Arc<str>,
  spec: Arc<ServiceSpec>,
  fingerprint: Arc<Fingerprint>,
  timeout: Duration,
}

impl<R: ContainerRuntime> ServiceWorker<R> {
  pub fn new(runtime: Arc<R>, project: &str, spec: ServiceSpec, timeout: Duration) -> Self {
    let fingerprint = Arc::new(fingerprint(&spec));
    Self {
      runtime,
      project: Arc::from(project),
      spec: Arc::new(spec),
      fingerprint,
      timeout,
    }
  }

  /// Apply every action of `plan`, stopping at the first failure.
  pub async fn run(self, plan: ConvergencePlan) -> ServiceRun {
    let mut counts = ActionCounts::default();

    for action in plan.actions {
      let step = match action {
        ContainerAction::Noop(container) => {
          debug!(container = %container.name, "up to date");
          Ok(())
        }
        ContainerAction::Create { number } => self.create_and_start(number).await.map(|_| counts.created += 1),
        ContainerAction::Start(container) => self.start(&container).await.map(|_| counts.started += 1),
        ContainerAction::Recreate(container) => self.recreate(&container).await.map(|_| counts.recreated += 1),
        ContainerAction::Remove(container) => self.stop_and_remove(&container).await.map(|_| counts.removed += 1),
      };

      if let Err(failure) = step {
        return ServiceRun {
          counts,
          failure: Some(failure),
        };
      }
    }

    ServiceRun { counts, failure: None }
  }

  async fn call<T, F>(&self, operation: Operation, container: &str, f: F) -> Result<T, ServiceFailure>
  where
    T: Send + 'static,
    F: FnOnce(&R) -> Result<T, RuntimeError> + Send + 'static,
  {
    blocking(&self.runtime, operation, f)
      .await
      .map_err(|e| ServiceFailure::from_runtime(operation, container, e))
  }

  async fn create_and_start(&self, number: u32) -> Result<ContainerRecord, ServiceFailure> {
    let project = Arc::clone(&self.project);
    let spec = Arc::clone(&self.spec);
    let fingerprint = Arc::clone(&self.fingerprint);
    let name = container_name(&self.project, &self.spec.name, number);

    let record = self
      .call(Operation::Create, &name, move |rt| {
        rt.create(&CreateRequest {
          project: &project,
          spec: &spec,
          number,
          fingerprint: &fingerprint,
        })
      })
      .await?;
    info!(container = %record.name, id = %record.id, "created container");

    self.start(&record).await?;
    Ok(record)
  }

  async fn start(&self, container: &ContainerRecord) -> Result<(), ServiceFailure> {
    let id = container.id.clone();
    self.call(Operation::Start, &container.name, move |rt| rt.start(&id)).await?;
    self.wait_running(container).await?;
    info!(container = %container.name, "container running");
    Ok(())
  }

  async fn recreate(&self, container: &ContainerRecord) -> Result<(), ServiceFailure> {
    info!(container = %container.name, "recreating container");
    self.stop_and_remove(container).await?;
    self.create_and_start(container.number).await?;
    Ok(())
  }

  async fn stop_and_remove(&self, container: &ContainerRecord) -> Result<(), ServiceFailure> {
    let id = container.id.clone();
    let timeout = self.timeout;
    self
      .call(Operation::Stop, &container.name, move |rt| rt.stop(&id, timeout))
      .await?;

    let id = container.id.clone();
    self.call(Operation::Remove, &container.name, move |rt| rt.remove(&id)).await?;
    info!(container = %container.name, "removed container");
    Ok(())
  }

  /// Poll until the container reports `running` or the timeout elapses.
  async fn wait_running(&self, container: &ContainerRecord) -> Result<(), ServiceFailure> {
    let poll = RUNNING_POLL_INTERVAL.min(self.timeout);

    let wait = async {
      loop {
        let id = container.id.clone();
        let current = self.call(Operation::Inspect, &container.name, move |rt| rt.inspect(&id)).await?;
        if current.status.is_running() {
          return Ok::<(), ServiceFailure>(());
        }
        debug!(container = %container.name, status = %current.status, "waiting for container");
        tokio::time::sleep(poll).await;
      }
    };

    match tokio::time::timeout(self.timeout, wait).await {
      Ok(result) => result,
      Err(_) => Err(ServiceFailure::Timeout {
        container: container.name.clone(),
        timeout: self.timeout,
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::{ContainerStatus, MemoryRuntime};
  use crate::converge::{PlannerOptions, plan_service};

  fn worker(runtime: &Arc<MemoryRuntime>, spec: &ServiceSpec) -> ServiceWorker<MemoryRuntime> {
    ServiceWorker::new(Arc::clone(runtime), "demo", spec.clone(), Duration::from_secs(2))
  }

  #[tokio::test]
  async fn creates_and_starts_missing_containers() {
    let runtime = Arc::new(MemoryRuntime::new());
    let spec = ServiceSpec::new("web", "app").with_image_id("sha256:1").with_scale(2);

    let plan = plan_service(&spec, &[], &PlannerOptions::default(), false);
    let run = worker(&runtime, &spec).run(plan).await;

    assert!(run.failure.is_none());
    assert_eq!(run.counts.created, 2);
    let containers = runtime.containers("demo");
    assert_eq!(containers.len(), 2);
    assert!(containers.iter().all(|c| c.status.is_running()));
    assert_eq!(containers[0].fingerprint.as_ref(), Some(&fingerprint(&spec)));
  }

  #[tokio::test]
  async fn recreate_keeps_number_and_replaces_id() {
    let runtime = Arc::new(MemoryRuntime::new());
    let old = ServiceSpec::new("web", "app").with_image_id("sha256:1");
    let new = old.clone().with_env("MODE", "prod");

    let first = worker(&runtime, &old).run(plan_service(&old, &[], &PlannerOptions::default(), false)).await;
    assert!(first.failure.is_none());
    let before = runtime.containers("demo");

    let plan = plan_service(&new, &before, &PlannerOptions::default(), false);
    let run = worker(&runtime, &new).run(plan).await;

    assert!(run.failure.is_none());
    assert_eq!(run.counts.recreated, 1);
    let after = runtime.containers("demo");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].number, 1);
    assert_ne!(after[0].id, before[0].id);
    assert_eq!(after[0].fingerprint.as_ref(), Some(&fingerprint(&new)));
  }

  #[tokio::test]
  async fn stalled_start_times_out() {
    let runtime = Arc::new(MemoryRuntime::new());
    runtime.stall("web");
    let spec = ServiceSpec::new("web", "app").with_image_id("sha256:1");

    let worker = ServiceWorker::new(Arc::clone(&runtime), "demo", spec.clone(), Duration::from_millis(250));
    let run = worker.run(plan_service(&spec, &[], &PlannerOptions::default(), false)).await;

    assert!(matches!(
      run.failure,
      Some(ServiceFailure::Timeout { ref container, .. }) if container == "demo_web_1"
    ));
    // The container was created even though it never came up.
    assert_eq!(run.counts.created, 0);
    assert_eq!(
      runtime.containers("demo")[0].status,
      ContainerStatus::Other("starting".to_string())
    );
  }

  #[tokio::test]
  async fn runtime_failure_stops_the_service() {
    let runtime = Arc::new(MemoryRuntime::new());
    runtime.fail_on(Operation::Start, "web");
    let spec = ServiceSpec::new("web", "app").with_image_id("sha256:1").with_scale(2);

    let run = worker(&runtime, &spec)
      .run(plan_service(&spec, &[], &PlannerOptions::default(), false))
      .await;

    assert!(matches!(
      run.failure,
      Some(ServiceFailure::Runtime {
        operation: Operation::Start,
        ..
      })
    ));
    // The second container was never attempted.
    assert_eq!(runtime.containers("demo").len(), 1);
  }
}
