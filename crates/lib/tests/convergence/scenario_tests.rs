//! Multi-service scenarios.

use std::time::Duration;

use stevedore_lib::container::{ContainerRecord, ContainerRuntime, ContainerStatus, Operation};
use stevedore_lib::converge::{ConvergenceStrategy, PlanAction};
use stevedore_lib::execute::{ExecuteOptions, ServiceFailure, ServiceOutcome, UpOptions};
use stevedore_lib::project::Project;

use super::common::{converge, operations_for, options, runtime, three_tier};

fn changed(project: &Project, service: &str) -> Project {
  project.map_services(|s| {
    if s.name == service {
      s.clone().with_env("CHANGED", "1")
    } else {
      s.clone()
    }
  })
}

fn cascading() -> UpOptions {
  let mut options = options();
  options.execute.always_recreate_deps = true;
  options
}

#[tokio::test]
async fn first_run_creates_all_services() {
  let runtime = runtime();
  let result = converge(&runtime, &three_tier(), &options()).await;

  assert!(result.report.is_success());
  for service in ["db", "web", "nginx"] {
    assert_eq!(result.plans[service].as_ref().unwrap().action(), PlanAction::Create);
    assert_eq!(result.report.outcome(service), Some(&ServiceOutcome::Created));
  }

  let names: Vec<String> = runtime.containers("demo").into_iter().map(|c| c.name).collect();
  assert_eq!(names, vec!["demo_db_1", "demo_nginx_1", "demo_web_1"]);
}

#[tokio::test]
async fn leaf_change_recreates_only_the_leaf() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;
  runtime.clear_events();

  let result = converge(&runtime, &changed(&project, "nginx"), &options()).await;

  assert_eq!(result.report.outcome("db"), Some(&ServiceOutcome::Noop));
  assert_eq!(result.report.outcome("web"), Some(&ServiceOutcome::Noop));
  assert_eq!(result.report.outcome("nginx"), Some(&ServiceOutcome::Recreated));
  assert_eq!(
    operations_for(&runtime, "nginx"),
    vec![Operation::Stop, Operation::Remove, Operation::Create, Operation::Start]
  );
  assert!(operations_for(&runtime, "db").is_empty());
}

#[tokio::test]
async fn root_change_with_cascade_recreates_everything() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;

  let result = converge(&runtime, &changed(&project, "db"), &cascading()).await;

  for service in ["db", "web", "nginx"] {
    assert_eq!(result.report.outcome(service), Some(&ServiceOutcome::Recreated), "{service}");
  }
}

#[tokio::test]
async fn root_change_without_cascade_leaves_dependents() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;

  let result = converge(&runtime, &changed(&project, "db"), &options()).await;

  assert_eq!(result.report.outcome("db"), Some(&ServiceOutcome::Recreated));
  assert_eq!(result.report.outcome("web"), Some(&ServiceOutcome::Noop));
  assert_eq!(result.report.outcome("nginx"), Some(&ServiceOutcome::Noop));
}

#[tokio::test]
async fn middle_change_with_cascade_spares_upstream() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;

  let result = converge(&runtime, &changed(&project, "web"), &cascading()).await;

  assert_eq!(result.report.outcome("db"), Some(&ServiceOutcome::Noop));
  assert_eq!(result.report.outcome("web"), Some(&ServiceOutcome::Recreated));
  assert_eq!(result.report.outcome("nginx"), Some(&ServiceOutcome::Recreated));
}

#[tokio::test]
async fn force_recreate_replaces_every_container() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;
  let before = runtime.containers("demo");

  let mut forced = options();
  forced.execute.strategy = ConvergenceStrategy::Always;
  let result = converge(&runtime, &project, &forced).await;

  assert!(result.report.results.values().all(|r| r.outcome == ServiceOutcome::Recreated));
  let after = runtime.containers("demo");
  for (old, new) in before.iter().zip(&after) {
    assert_eq!(old.name, new.name);
    assert_ne!(old.id, new.id);
  }
}

#[tokio::test]
async fn stopped_container_is_started_not_recreated() {
  let runtime = runtime();
  let project = three_tier();
  converge(&runtime, &project, &options()).await;

  let web = runtime.list("demo", "web").unwrap().remove(0);
  runtime.set_status(&web.id, ContainerStatus::Stopped).unwrap();
  runtime.clear_events();

  let result = converge(&runtime, &project, &options()).await;

  assert_eq!(result.report.outcome("web"), Some(&ServiceOutcome::Started));
  assert_eq!(operations_for(&runtime, "web"), vec![Operation::Start]);
  assert_eq!(runtime.list("demo", "web").unwrap()[0].id, web.id);
}

#[tokio::test]
async fn unlabelled_container_is_recreated_in_place() {
  let runtime = runtime();
  let project = three_tier();
  runtime.seed(
    "demo",
    ContainerRecord {
      id: "foreign".to_string(),
      name: "demo_web_1".to_string(),
      service: "web".to_string(),
      number: 1,
      status: ContainerStatus::Running,
      fingerprint: None,
    },
  );

  let result = converge(&runtime, &project, &options()).await;

  assert_eq!(result.report.outcome("web"), Some(&ServiceOutcome::Recreated));
  let web = runtime.list("demo", "web").unwrap();
  assert_eq!(web.len(), 1);
  assert_eq!(web[0].number, 1);
  assert_ne!(web[0].id, "foreign");
}

#[tokio::test]
async fn timeout_fails_service_and_skips_dependents() {
  let runtime = runtime();
  runtime.stall("web");
  let mut options = options();
  options.execute.timeout = Duration::from_millis(300);

  let result = converge(&runtime, &three_tier(), &options).await;

  assert_eq!(result.report.outcome("db"), Some(&ServiceOutcome::Created));
  assert!(matches!(
    result.report.outcome("web"),
    Some(ServiceOutcome::Failed(ServiceFailure::Timeout { container, .. })) if container == "demo_web_1"
  ));
  assert_eq!(
    result.report.outcome("nginx"),
    Some(&ServiceOutcome::Skipped {
      dependency: "web".to_string()
    })
  );
  assert!(operations_for(&runtime, "nginx").is_empty());
}

#[tokio::test]
async fn only_selected_service_without_deps() {
  let runtime = runtime();
  let options = UpOptions {
    execute: ExecuteOptions {
      selected: Some(["nginx".to_string()].into()),
      start_deps: false,
      ..options().execute
    },
    ..options()
  };

  let result = converge(&runtime, &three_tier(), &options).await;

  assert_eq!(result.report.results.len(), 1);
  assert_eq!(result.report.outcome("nginx"), Some(&ServiceOutcome::Created));
  assert!(runtime.list("demo", "db").unwrap().is_empty());
}
