//! In-process container runtime.
//!
//! [`MemoryRuntime`] keeps containers in a map and records every mutating call
//! as a [`RuntimeEvent`], which makes it possible to assert exactly how much
//! container churn a convergence run caused. Faults can be injected per
//! operation and service, and a service can be "stalled" so its containers
//! never reach `running`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::runtime::{ContainerRuntime, CreateRequest, Operation, RuntimeError};
use super::types::{ContainerRecord, ContainerStatus, container_name};

/// One mutating call observed by a [`MemoryRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
  pub operation: Operation,
  pub service: String,
  /// Container name the call targeted.
  pub container: String,
}

#[derive(Debug)]
struct StoredContainer {
  project: String,
  record: ContainerRecord,
}

#[derive(Debug, Default)]
struct State {
  containers: BTreeMap<String, StoredContainer>,
  images: HashMap<String, String>,
  next_id: u64,
  faults: HashSet<(Operation, String)>,
  stalled: HashSet<String>,
  events: Vec<RuntimeEvent>,
}

/// A container daemon held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
  state: Mutex<State>,
}

impl MemoryRuntime {
  pub fn new() -> Self {
    Self::default()
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register an image reference and the content id it resolves to.
  pub fn set_image(&self, reference: impl Into<String>, id: impl Into<String>) {
    self.state().images.insert(reference.into(), id.into());
  }

  /// Builder form of [`set_image`](Self::set_image).
  pub fn with_image(self, reference: impl Into<String>, id: impl Into<String>) -> Self {
    self.set_image(reference, id);
    self
  }

  /// Make `operation` fail for `target`.
  ///
  /// `target` is a service name, or an image reference for
  /// [`Operation::ResolveImage`].
  pub fn fail_on(&self, operation: Operation, target: impl Into<String>) {
    self.state().faults.insert((operation, target.into()));
  }

  /// Remove every injected fault.
  pub fn clear_faults(&self) {
    self.state().faults.clear();
  }

  /// Containers of `service` will accept `start` but never report `running`.
  pub fn stall(&self, service: impl Into<String>) {
    self.state().stalled.insert(service.into());
  }

  /// Change the status of an existing container, e.g. to simulate a crash.
  pub fn set_status(&self, id: &str, status: ContainerStatus) -> Result<(), RuntimeError> {
    let mut state = self.state();
    let stored = state
      .containers
      .get_mut(id)
      .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
    stored.record.status = status;
    Ok(())
  }

  /// Insert a container as if it had been created earlier, without an event.
  pub fn seed(&self, project: impl Into<String>, record: ContainerRecord) {
    let mut state = self.state();
    state.containers.insert(
      record.id.clone(),
      StoredContainer {
        project: project.into(),
        record,
      },
    );
  }

  /// All containers of a project, ordered by service then instance number.
  pub fn containers(&self, project: &str) -> Vec<ContainerRecord> {
    let state = self.state();
    let mut records: Vec<ContainerRecord> = state
      .containers
      .values()
      .filter(|c| c.project == project)
      .map(|c| c.record.clone())
      .collect();
    records.sort_by(|a, b| a.service.cmp(&b.service).then(a.number.cmp(&b.number)));
    records
  }

  /// Mutating calls observed so far, in order.
  pub fn events(&self) -> Vec<RuntimeEvent> {
    self.state().events.clone()
  }

  /// Mutating calls that targeted one service.
  pub fn events_for(&self, service: &str) -> Vec<RuntimeEvent> {
    self.state().events.iter().filter(|e| e.service == service).cloned().collect()
  }

  pub fn clear_events(&self) {
    self.state().events.clear();
  }

  fn check_fault(state: &State, operation: Operation, target: &str) -> Result<(), RuntimeError> {
    if state.faults.contains(&(operation, target.to_string())) {
      return Err(RuntimeError::Operation {
        operation,
        message: format!("injected fault for {}", target),
      });
    }
    Ok(())
  }

  /// Apply a mutation to one container, recording the event.
  fn mutate(
    &self,
    id: &str,
    operation: Operation,
    f: impl FnOnce(&mut ContainerRecord, &HashSet<String>) -> Result<(), RuntimeError>,
  ) -> Result<(), RuntimeError> {
    let mut state = self.state();
    let service = state
      .containers
      .get(id)
      .map(|c| c.record.service.clone())
      .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
    Self::check_fault(&state, operation, &service)?;

    let State {
      containers,
      stalled,
      events,
      ..
    } = &mut *state;
    let stored = containers
      .get_mut(id)
      .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
    f(&mut stored.record, stalled)?;

    events.push(RuntimeEvent {
      operation,
      service,
      container: stored.record.name.clone(),
    });
    Ok(())
  }
}

impl ContainerRuntime for MemoryRuntime {
  fn create(&self, request: &CreateRequest<'_>) -> Result<ContainerRecord, RuntimeError> {
    let mut state = self.state();
    let service = request.spec.name.as_str();
    Self::check_fault(&state, Operation::Create, service)?;

    let name = container_name(request.project, service, request.number);
    if state.containers.values().any(|c| c.record.name == name) {
      return Err(RuntimeError::Operation {
        operation: Operation::Create,
        message: format!("container name {} is already in use", name),
      });
    }

    state.next_id += 1;
    let record = ContainerRecord {
      id: format!("{:012x}", state.next_id),
      name: name.clone(),
      service: service.to_string(),
      number: request.number,
      status: ContainerStatus::Stopped,
      fingerprint: Some(request.fingerprint.clone()),
    };

    debug!(container = %name, id = %record.id, "memory runtime: created");

    state.containers.insert(
      record.id.clone(),
      StoredContainer {
        project: request.project.to_string(),
        record: record.clone(),
      },
    );
    state.events.push(RuntimeEvent {
      operation: Operation::Create,
      service: service.to_string(),
      container: name,
    });

    Ok(record)
  }

  fn start(&self, id: &str) -> Result<(), RuntimeError> {
    self.mutate(id, Operation::Start, |record, stalled| {
      record.status = if stalled.contains(&record.service) {
        ContainerStatus::Other("starting".to_string())
      } else {
        ContainerStatus::Running
      };
      Ok(())
    })
  }

  fn stop(&self, id: &str, _timeout: Duration) -> Result<(), RuntimeError> {
    self.mutate(id, Operation::Stop, |record, _| {
      record.status = ContainerStatus::Stopped;
      Ok(())
    })
  }

  fn remove(&self, id: &str) -> Result<(), RuntimeError> {
    self.mutate(id, Operation::Remove, |record, _| {
      if record.status.is_running() {
        return Err(RuntimeError::Operation {
          operation: Operation::Remove,
          message: format!("container {} is running", record.name),
        });
      }
      Ok(())
    })?;
    self.state().containers.remove(id);
    Ok(())
  }

  fn list(&self, project: &str, service: &str) -> Result<Vec<ContainerRecord>, RuntimeError> {
    let state = self.state();
    Self::check_fault(&state, Operation::List, service)?;

    let mut records: Vec<ContainerRecord> = state
      .containers
      .values()
      .filter(|c| c.project == project && c.record.service == service)
      .map(|c| c.record.clone())
      .collect();
    records.sort_by_key(|r| r.number);
    Ok(records)
  }

  fn inspect(&self, id: &str) -> Result<ContainerRecord, RuntimeError> {
    let state = self.state();
    let stored = state
      .containers
      .get(id)
      .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
    Self::check_fault(&state, Operation::Inspect, &stored.record.service)?;
    Ok(stored.record.clone())
  }

  fn resolve_image_id(&self, reference: &str) -> Result<String, RuntimeError> {
    let state = self.state();
    Self::check_fault(&state, Operation::ResolveImage, reference)?;
    state
      .images
      .get(reference)
      .cloned()
      .ok_or_else(|| RuntimeError::ImageNotFound {
        reference: reference.to_string(),
        message: "not present in memory runtime".to_string(),
      })
  }
}
