//! Configuration fingerprinting.
//!
//! The fingerprint covers everything that makes a container's configuration
//! what it is: the resolved image id, command, entrypoint, environment, user
//! labels, volumes and resource limits. It excludes the instance number,
//! scale, dependency edges, and labels in the engine's own namespace.
//!
//! Maps are iterated in key order and volumes are sorted, so reordering the
//! declaration never changes the result.

use std::collections::BTreeMap;

use crate::consts::LABEL_PREFIX;
use crate::project::ServiceSpec;
use crate::util::hash::{Fingerprint, entry, hash_entries};

/// Compute the fingerprint of a service's declared configuration.
///
/// Uses the resolved image id when present. A spec whose image was never
/// resolved hashes its reference under a distinct tag, so it can never
/// collide with a resolved one.
pub fn fingerprint(spec: &ServiceSpec) -> Fingerprint {
  let mut entries = Vec::new();

  match &spec.image_id {
    Some(id) => entries.push(entry("image-id", &[id.as_str()])),
    None => entries.push(entry("image-ref", &[spec.image.as_str()])),
  }

  if let Some(command) = &spec.command {
    let parts: Vec<&str> = command.iter().map(String::as_str).collect();
    entries.push(entry("command", &parts));
  }

  if let Some(entrypoint) = &spec.entrypoint {
    let parts: Vec<&str> = entrypoint.iter().map(String::as_str).collect();
    entries.push(entry("entrypoint", &parts));
  }

  let environment: BTreeMap<&str, &str> = spec
    .environment
    .iter()
    .map(|(k, v)| (k.as_str(), v.as_str()))
    .collect();
  for (key, value) in environment {
    entries.push(entry("env", &[key, value]));
  }

  let labels: BTreeMap<&str, &str> = spec
    .labels
    .iter()
    .filter(|(k, _)| !k.starts_with(LABEL_PREFIX))
    .map(|(k, v)| (k.as_str(), v.as_str()))
    .collect();
  for (key, value) in labels {
    entries.push(entry("label", &[key, value]));
  }

  let mut volumes: Vec<&str> = spec.volumes.iter().map(String::as_str).collect();
  volumes.sort_unstable();
  volumes.dedup();
  for volume in volumes {
    entries.push(entry("volume", &[volume]));
  }

  if let Some(cpus) = spec.resources.cpus {
    entries.push(entry("cpus", &[cpus.to_string().as_str()]));
  }
  if let Some(memory) = &spec.resources.mem_limit {
    entries.push(entry("mem-limit", &[memory.as_str()]));
  }

  hash_entries(entries)
}
