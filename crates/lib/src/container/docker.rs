//! Container runtime backed by the `docker` command-line client.
//!
//! Each operation runs one `docker` subcommand and waits for it. Engine
//! metadata travels in `io.stevedore.*` labels, so a later `list` can rebuild
//! full [`ContainerRecord`]s from `docker inspect` output.

use std::collections::{BTreeMap, HashMap};
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::consts::{LABEL_CONFIG_HASH, LABEL_CONTAINER_NUMBER, LABEL_PROJECT, LABEL_SERVICE};
use crate::util::hash::Fingerprint;

use super::runtime::{ContainerRuntime, CreateRequest, RuntimeError};
use super::types::{ContainerRecord, ContainerStatus, container_name};

/// Runtime that shells out to a docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
  binary: String,
}

impl Default for DockerCli {
  fn default() -> Self {
    Self {
      binary: "docker".to_string(),
    }
  }
}

impl DockerCli {
  /// Use a specific client binary (e.g. `podman`).
  pub fn with_binary(binary: impl Into<String>) -> Self {
    Self { binary: binary.into() }
  }

  /// Run a subcommand and return its trimmed stdout.
  fn run(&self, args: &[String]) -> Result<String, RuntimeError> {
    debug!(binary = %self.binary, args = ?args, "running container client");

    let output = Command::new(&self.binary).args(args).output()?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      return Err(RuntimeError::Command {
        command: format!("{} {}", self.binary, args.first().map(String::as_str).unwrap_or_default()),
        code: output.status.code(),
        stderr,
      });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  fn inspect_many(&self, ids: &[&str]) -> Result<Vec<ContainerRecord>, RuntimeError> {
    let mut args = vec!["inspect".to_string()];
    args.extend(ids.iter().map(|id| id.to_string()));
    parse_inspect(&self.run(&args)?)
  }
}

/// Build the `docker stop` argument list.
///
/// `--time` takes whole seconds; a fractional grace period rounds up so it is
/// never cut to zero.
pub fn stop_args(id: &str, timeout: Duration) -> Vec<String> {
  let seconds = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
  vec![
    "stop".to_string(),
    "--time".to_string(),
    seconds.to_string(),
    id.to_string(),
  ]
}

/// Build the `docker create` argument list for a request.
pub fn create_args(request: &CreateRequest<'_>) -> Vec<String> {
  let spec = request.spec;
  let name = container_name(request.project, &spec.name, request.number);
  let mut args = vec!["create".to_string(), "--name".to_string(), name];

  let mut labels: BTreeMap<&str, String> = spec.labels.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
  labels.insert(LABEL_PROJECT, request.project.to_string());
  labels.insert(LABEL_SERVICE, spec.name.clone());
  labels.insert(LABEL_CONTAINER_NUMBER, request.number.to_string());
  labels.insert(LABEL_CONFIG_HASH, request.fingerprint.to_string());
  for (key, value) in labels {
    args.push("--label".to_string());
    args.push(format!("{}={}", key, value));
  }

  let env: BTreeMap<&String, &String> = spec.environment.iter().collect();
  for (key, value) in env {
    args.push("--env".to_string());
    args.push(format!("{}={}", key, value));
  }

  for volume in &spec.volumes {
    args.push("--volume".to_string());
    args.push(volume.clone());
  }

  if let Some(cpus) = spec.resources.cpus {
    args.push("--cpus".to_string());
    args.push(cpus.to_string());
  }
  if let Some(ref memory) = spec.resources.mem_limit {
    args.push("--memory".to_string());
    args.push(memory.clone());
  }

  // `--entrypoint` only takes the executable; its arguments lead the command.
  let mut trailing: Vec<String> = Vec::new();
  if let Some(entrypoint) = &spec.entrypoint
    && let Some((program, rest)) = entrypoint.split_first()
  {
    args.push("--entrypoint".to_string());
    args.push(program.clone());
    trailing.extend(rest.iter().cloned());
  }
  if let Some(command) = &spec.command {
    trailing.extend(command.iter().cloned());
  }

  args.push(spec.image_id.clone().unwrap_or_else(|| spec.image.clone()));
  args.extend(trailing);
  args
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
  id: String,
  name: String,
  state: InspectState,
  config: InspectConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
  status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
  #[serde(default)]
  labels: Option<HashMap<String, String>>,
}

/// Parse `docker inspect` JSON into container records.
pub fn parse_inspect(json: &str) -> Result<Vec<ContainerRecord>, RuntimeError> {
  let entries: Vec<InspectEntry> =
    serde_json::from_str(json).map_err(|e| RuntimeError::Parse(format!("docker inspect: {}", e)))?;

  entries
    .into_iter()
    .map(|entry| {
      let labels = entry.config.labels.unwrap_or_default();
      let service = labels
        .get(LABEL_SERVICE)
        .cloned()
        .ok_or_else(|| RuntimeError::Parse(format!("container {} has no service label", entry.id)))?;
      let number = labels
        .get(LABEL_CONTAINER_NUMBER)
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| RuntimeError::Parse(format!("container {} has no valid number label", entry.id)))?;

      Ok(ContainerRecord {
        id: entry.id,
        name: entry.name.trim_start_matches('/').to_string(),
        service,
        number,
        status: ContainerStatus::from_state(&entry.state.status),
        fingerprint: labels.get(LABEL_CONFIG_HASH).cloned().map(Fingerprint),
      })
    })
    .collect()
}

impl ContainerRuntime for DockerCli {
  fn create(&self, request: &CreateRequest<'_>) -> Result<ContainerRecord, RuntimeError> {
    let id = self.run(&create_args(request))?;
    info!(service = %request.spec.name, number = request.number, id = %id, "container created");
    self.inspect(&id)
  }

  fn start(&self, id: &str) -> Result<(), RuntimeError> {
    self.run(&["start".to_string(), id.to_string()]).map(|_| ())
  }

  fn stop(&self, id: &str, timeout: Duration) -> Result<(), RuntimeError> {
    self.run(&stop_args(id, timeout)).map(|_| ())
  }

  fn remove(&self, id: &str) -> Result<(), RuntimeError> {
    self.run(&["rm".to_string(), id.to_string()]).map(|_| ())
  }

  fn list(&self, project: &str, service: &str) -> Result<Vec<ContainerRecord>, RuntimeError> {
    let output = self.run(&[
      "ps".to_string(),
      "--all".to_string(),
      "--quiet".to_string(),
      "--no-trunc".to_string(),
      "--filter".to_string(),
      format!("label={}={}", LABEL_PROJECT, project),
      "--filter".to_string(),
      format!("label={}={}", LABEL_SERVICE, service),
    ])?;

    let ids: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if ids.is_empty() {
      return Ok(Vec::new());
    }

    let mut records = self.inspect_many(&ids)?;
    records.sort_by_key(|r| r.number);
    Ok(records)
  }

  fn inspect(&self, id: &str) -> Result<ContainerRecord, RuntimeError> {
    self
      .inspect_many(&[id])?
      .into_iter()
      .next()
      .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
  }

  fn resolve_image_id(&self, reference: &str) -> Result<String, RuntimeError> {
    let inspect = || {
      self.run(&[
        "image".to_string(),
        "inspect".to_string(),
        "--format".to_string(),
        "{{.Id}}".to_string(),
        reference.to_string(),
      ])
    };

    if let Ok(id) = inspect() {
      return Ok(id);
    }

    info!(image = %reference, "image not present locally, pulling");
    self
      .run(&["pull".to_string(), "--quiet".to_string(), reference.to_string()])
      .and_then(|_| inspect())
      .map_err(|e| RuntimeError::ImageNotFound {
        reference: reference.to_string(),
        message: e.to_string(),
      })
  }
}
