//! Properties that hold for any converged project.

use stevedore_lib::container::{ContainerRuntime, ContainerStatus, Operation};
use stevedore_lib::converge::{ConvergenceStrategy, NeverStartsStopped, PlanAction};
use stevedore_lib::execute::{ServiceFailure, ServiceOutcome};

use super::common::{converge, load, operations_for, options, runtime, three_tier};

const WIDE: &str = r#"
services:
  db:
    image: postgres:16
  cache:
    image: redis:7
  web:
    image: example/web:latest
    depends_on: [db, cache]
    scale: 2
  worker:
    image: example/web:latest
    command: ["work"]
    depends_on: [cache]
"#;

#[tokio::test]
async fn second_run_is_a_noop() {
  for yaml in [super::common::THREE_TIER, WIDE] {
    let runtime = runtime();
    let project = load(yaml);
    converge(&runtime, &project, &options()).await;
    runtime.clear_events();

    let result = converge(&runtime, &project, &options()).await;

    assert!(result.report.is_success());
    assert!(
      result
        .plans
        .values()
        .all(|p| p.as_ref().unwrap().action() == PlanAction::Noop)
    );
    assert!(result.report.results.values().all(|r| r.outcome == ServiceOutcome::Noop));
    assert!(runtime.events().is_empty(), "unexpected calls: {:?}", runtime.events());
  }
}

#[tokio::test]
async fn failure_is_isolated_to_dependents() {
  let runtime = runtime();
  runtime.fail_on(Operation::Create, "db");

  let result = converge(&runtime, &load(WIDE), &options()).await;

  assert!(!result.report.is_success());
  assert!(result.report.outcome("db").unwrap().is_failed());
  assert_eq!(
    result.report.outcome("web"),
    Some(&ServiceOutcome::Skipped {
      dependency: "db".to_string()
    })
  );
  // cache and worker do not depend on db.
  assert_eq!(result.report.outcome("cache"), Some(&ServiceOutcome::Created));
  assert_eq!(result.report.outcome("worker"), Some(&ServiceOutcome::Created));
  assert!(operations_for(&runtime, "web").is_empty());
}

#[tokio::test]
async fn failed_run_recovers_on_retry() {
  let runtime = runtime();
  let project = load(WIDE);
  runtime.fail_on(Operation::Start, "cache");
  let first = converge(&runtime, &project, &options()).await;
  assert!(matches!(
    first.report.outcome("cache"),
    Some(ServiceOutcome::Failed(ServiceFailure::Runtime { .. }))
  ));

  runtime.clear_faults();
  let second = converge(&runtime, &project, &options()).await;

  assert!(second.report.is_success());
  // The cache container was created before start failed, so it is only started.
  assert_eq!(second.report.outcome("cache"), Some(&ServiceOutcome::Started));
  assert_eq!(second.report.outcome("web"), Some(&ServiceOutcome::Created));
}

#[tokio::test]
async fn never_strategy_ignores_changes() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;
  runtime.clear_events();

  let changed = project.map_services(|s| s.clone().with_env("CHANGED", "1"));
  let mut never = options();
  never.execute.strategy = ConvergenceStrategy::Never;
  never.execute.always_recreate_deps = true;

  let result = converge(&runtime, &changed, &never).await;

  assert!(result.report.results.values().all(|r| r.outcome == ServiceOutcome::Noop));
  assert!(runtime.events().is_empty());
}

#[tokio::test]
async fn never_strategy_stopped_container_option() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;
  let db = runtime.list("demo", "db").unwrap().remove(0);

  let mut never = options();
  never.execute.strategy = ConvergenceStrategy::Never;

  runtime.set_status(&db.id, ContainerStatus::Stopped).unwrap();
  never.execute.never_starts_stopped = NeverStartsStopped::LeaveStopped;
  let left = converge(&runtime, &project, &never).await;
  assert_eq!(left.report.outcome("db"), Some(&ServiceOutcome::Noop));
  assert_eq!(runtime.list("demo", "db").unwrap()[0].status, ContainerStatus::Stopped);

  never.execute.never_starts_stopped = NeverStartsStopped::Start;
  let started = converge(&runtime, &project, &never).await;
  assert_eq!(started.report.outcome("db"), Some(&ServiceOutcome::Started));
  assert!(runtime.list("demo", "db").unwrap()[0].status.is_running());
}

#[tokio::test]
async fn scale_law_up_and_down() {
  let runtime = runtime();
  let project = load(WIDE);
  converge(&runtime, &project, &options()).await;
  assert_eq!(runtime.list("demo", "web").unwrap().len(), 2);

  let mut scaled = options();
  scaled.scale = vec![("web".to_string(), 4)];
  let up = converge(&runtime, &project, &scaled).await;
  assert_eq!(up.report.results["web"].counts.created, 2);
  let numbers: Vec<u32> = runtime.list("demo", "web").unwrap().iter().map(|c| c.number).collect();
  assert_eq!(numbers, vec![1, 2, 3, 4]);

  scaled.scale = vec![("web".to_string(), 1)];
  let down = converge(&runtime, &project, &scaled).await;
  assert_eq!(down.report.results["web"].counts.removed, 3);
  assert_eq!(down.report.outcome("web"), Some(&ServiceOutcome::Noop));
  let remaining: Vec<u32> = runtime.list("demo", "web").unwrap().iter().map(|c| c.number).collect();
  assert_eq!(remaining, vec![1]);
}

#[tokio::test]
async fn scale_change_cascades_when_enabled() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;

  let mut scaled = options();
  scaled.scale = vec![("web".to_string(), 2)];
  scaled.execute.always_recreate_deps = true;
  let result = converge(&runtime, &project, &scaled).await;

  assert_eq!(result.report.outcome("db"), Some(&ServiceOutcome::Noop));
  assert_eq!(result.report.outcome("web"), Some(&ServiceOutcome::Created));
  assert_eq!(result.report.outcome("nginx"), Some(&ServiceOutcome::Recreated));
}

#[tokio::test]
async fn instance_numbers_stay_unique() {
  let runtime = runtime();
  let project = load(WIDE);
  let mut scaled = options();

  for scale in [3, 1, 5, 2] {
    scaled.scale = vec![("web".to_string(), scale)];
    converge(&runtime, &project, &scaled).await;

    let mut numbers: Vec<u32> = runtime.list("demo", "web").unwrap().iter().map(|c| c.number).collect();
    assert_eq!(numbers.len(), scale as usize);
    numbers.dedup();
    assert_eq!(numbers.len(), scale as usize);
  }
}
