//! Reconciling per-container decisions with the desired replica count.
//!
//! With `M` existing containers and a desired scale of `N`:
//! - `M < N`: `N - M` creations, numbered upward from the highest existing number
//! - `M > N`: the `M - N` highest-numbered containers are removed; the
//!   low-numbered ones, which fixed aliases are most likely to point at, stay
//! - `M == N`: the per-container decisions stand

use std::collections::HashSet;

use crate::container::ContainerRecord;
use crate::project::ServiceSpec;

use super::types::{ContainerAction, ConvergencePlan};

/// Turn per-container decisions into a full plan for `spec.scale` containers.
///
/// `per_container` holds one decision per entry of `existing`.
pub fn reconcile(spec: &ServiceSpec, existing: &[ContainerRecord], per_container: Vec<ContainerAction>) -> ConvergencePlan {
  let desired = spec.scale as usize;

  let mut by_number: Vec<&ContainerRecord> = existing.iter().collect();
  by_number.sort_by_key(|c| c.number);

  let mut actions = Vec::with_capacity(desired.max(existing.len()));

  // Highest numbers go first, so surplus removal order is deterministic.
  let surplus: Vec<&ContainerRecord> = by_number.iter().skip(desired).rev().copied().collect();
  let removed: HashSet<&str> = surplus.iter().map(|c| c.id.as_str()).collect();
  actions.extend(surplus.into_iter().cloned().map(ContainerAction::Remove));

  actions.extend(
    per_container
      .into_iter()
      .filter(|a| a.container().is_none_or(|c| !removed.contains(c.id.as_str()))),
  );

  if existing.len() < desired {
    let highest = by_number.last().map(|c| c.number).unwrap_or(0);
    let missing = (desired - existing.len()) as u32;
    actions.extend((1..=missing).map(|i| ContainerAction::Create { number: highest + i }));
  }

  ConvergencePlan::new(spec.name.clone(), actions)
}
