//! Implementation of the `stv plan` command.
//!
//! Observes the runtime and prints what `up` would do, including recreates
//! forced on dependents by `--always-recreate-deps`. Nothing is changed.

use anyhow::{Context, Result};
use serde::Serialize;

use stevedore_lib::converge::{ActionKind, ConvergencePlan, PlanAction};
use stevedore_lib::execute::{ServicePlans, plan_project};

use crate::output::{Tone, name_width, print_info, print_json, print_service_line, print_warning, symbols};
use crate::{ConvergeArgs, Globals};

use super::{async_runtime, container_runtime, load, up_options};

#[derive(Serialize)]
struct PlanOutput<'a> {
  project: &'a str,
  services: Vec<ServicePlanOutput<'a>>,
}

#[derive(Serialize)]
struct ServicePlanOutput<'a> {
  service: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  action: Option<PlanAction>,
  containers: Vec<ContainerActionOutput>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

#[derive(Serialize)]
struct ContainerActionOutput {
  action: ActionKind,
  number: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  container: Option<String>,
}

/// Execute the plan command. Returns false when a service cannot be planned.
pub fn cmd_plan(globals: &Globals, args: &ConvergeArgs) -> Result<bool> {
  let options = up_options(args)?;
  let project = load(globals)?;
  let runtime = container_runtime(globals);

  let rt = async_runtime()?;
  let planned = rt
    .block_on(plan_project(&runtime, &project, &options))
    .context("Planning failed")?;
  let previewed = planned.preview(&options.execute)?;
  let order = planned.graph.order_for_up();
  let success = previewed.values().all(Result::is_ok);

  if globals.output.is_json() {
    print_json(&PlanOutput {
      project: project.name(),
      services: plan_outputs(&order, &previewed),
    })?;
    return Ok(success);
  }

  print_info(&format!("Plan for project {}", project.name()));
  println!();

  let width = name_width(order.iter().map(String::as_str));
  for name in &order {
    match previewed.get(name) {
      Some(Ok(plan)) => {
        let (symbol, tone) = match plan.action() {
          PlanAction::Create => (symbols::ADD, Tone::Good),
          PlanAction::Recreate | PlanAction::Start => (symbols::MODIFY, Tone::Change),
          PlanAction::Noop if plan.changes_containers() => (symbols::REMOVE, Tone::Change),
          PlanAction::Noop => (symbols::UNCHANGED, Tone::Muted),
        };
        print_service_line(symbol, tone, name, width, &describe(plan));
      }
      Some(Err(failure)) => print_service_line(symbols::ERROR, Tone::Bad, name, width, &failure.to_string()),
      None => {}
    }
  }

  if !success {
    println!();
    print_warning("Some services cannot be planned and would fail");
  }

  Ok(success)
}

/// One-line summary such as `recreate (1 recreate, 2 create)`.
fn describe(plan: &ConvergencePlan) -> String {
  let counts: Vec<String> = [ActionKind::Recreate, ActionKind::Create, ActionKind::Start, ActionKind::Remove]
    .into_iter()
    .filter_map(|kind| match plan.count(kind) {
      0 => None,
      n => Some(format!("{} {}", n, kind)),
    })
    .collect();

  if counts.is_empty() {
    plan.action().to_string()
  } else {
    format!("{} ({})", plan.action(), counts.join(", "))
  }
}

fn plan_outputs<'a>(order: &'a [String], previewed: &ServicePlans) -> Vec<ServicePlanOutput<'a>> {
  order
    .iter()
    .filter_map(|name| previewed.get(name).map(|entry| (name, entry)))
    .map(|(name, entry)| match entry {
      Ok(plan) => ServicePlanOutput {
        service: name,
        action: Some(plan.action()),
        containers: plan
          .actions
          .iter()
          .map(|a| ContainerActionOutput {
            action: a.kind(),
            number: a.number(),
            container: a.container().map(|c| c.name.clone()),
          })
          .collect(),
        error: None,
      },
      Err(failure) => ServicePlanOutput {
        service: name,
        action: None,
        containers: Vec::new(),
        error: Some(failure.to_string()),
      },
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use stevedore_lib::container::{ContainerRecord, ContainerStatus};
  use stevedore_lib::converge::ContainerAction;
  use stevedore_lib::execute::ServiceFailure;

  #[test]
  fn describe_counts_actions() {
    let plan = ConvergencePlan::new(
      "web",
      vec![ContainerAction::Create { number: 1 }, ContainerAction::Create { number: 2 }],
    );
    assert_eq!(describe(&plan), "create (2 create)");
    assert_eq!(describe(&ConvergencePlan::new("web", vec![])), "noop");

    let record = |number: u32| ContainerRecord {
      id: format!("c{}", number),
      name: format!("demo_web_{}", number),
      service: "web".to_string(),
      number,
      status: ContainerStatus::Running,
      fingerprint: None,
    };
    let plan = ConvergencePlan::new(
      "web",
      vec![ContainerAction::Remove(record(2)), ContainerAction::Recreate(record(1))],
    );
    assert_eq!(describe(&plan), "recreate (1 recreate, 1 remove)");
  }

  #[test]
  fn json_follows_dependency_order() {
    let order = vec!["db".to_string(), "web".to_string()];
    let mut previewed = ServicePlans::new();
    previewed.insert(
      "db".to_string(),
      Ok(ConvergencePlan::new("db", vec![ContainerAction::Create { number: 1 }])),
    );
    previewed.insert(
      "web".to_string(),
      Err(ServiceFailure::ImageResolution("app: not found".to_string())),
    );

    let json = serde_json::to_value(plan_outputs(&order, &previewed)).unwrap();
    assert_eq!(json[0]["service"], "db");
    assert_eq!(json[0]["action"], "create");
    assert_eq!(json[0]["containers"][0]["number"], 1);
    assert_eq!(json[0]["containers"][0]["action"], "create");
    assert_eq!(json[1]["service"], "web");
    assert!(json[1].get("action").is_none());
    assert!(json[1]["error"].as_str().unwrap().contains("not found"));
  }
}
