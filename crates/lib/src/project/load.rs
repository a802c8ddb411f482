//! Loading a [`Project`] from a YAML declaration.
//!
//! The accepted format is a subset of the familiar compose layout:
//!
//! ```yaml
//! services:
//!   db:
//!     image: postgres:16
//!     environment:
//!       POSTGRES_PASSWORD: secret
//!   web:
//!     image: example/web:latest
//!     command: ["serve", "--port", "8080"]
//!     depends_on: [db]
//!     scale: 2
//! ```
//!
//! Service order follows the file. Unknown keys are ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::error::ConfigError;
use super::types::{Project, Resources, ServiceSpec};

#[derive(Debug, Deserialize)]
struct ProjectFile {
  #[serde(default)]
  services: serde_yaml::Mapping,
}

/// A string split on whitespace, or an explicit argument list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Args {
  Line(String),
  List(Vec<String>),
}

impl Args {
  fn into_vec(self) -> Vec<String> {
    match self {
      Args::Line(line) => line.split_whitespace().map(str::to_string).collect(),
      Args::List(list) => list,
    }
  }
}

/// A `KEY: value` mapping, or a `KEY=value` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyValues {
  Map(BTreeMap<String, serde_yaml::Value>),
  List(Vec<String>),
}

impl KeyValues {
  fn into_map(self) -> HashMap<String, String> {
    match self {
      KeyValues::Map(map) => map.into_iter().map(|(k, v)| (k, scalar_to_string(&v))).collect(),
      KeyValues::List(list) => list
        .into_iter()
        .map(|item| match item.split_once('=') {
          Some((k, v)) => (k.to_string(), v.to_string()),
          None => (item, String::new()),
        })
        .collect(),
    }
  }
}

#[derive(Debug, Deserialize)]
struct ServiceFile {
  image: Option<String>,
  command: Option<Args>,
  entrypoint: Option<Args>,
  environment: Option<KeyValues>,
  labels: Option<KeyValues>,
  #[serde(default)]
  volumes: Vec<String>,
  #[serde(default)]
  depends_on: Vec<String>,
  #[serde(default)]
  links: Vec<String>,
  scale: Option<u32>,
  cpus: Option<f64>,
  mem_limit: Option<String>,
}

fn scalar_to_string(value: &serde_yaml::Value) -> String {
  match value {
    serde_yaml::Value::Null => String::new(),
    serde_yaml::Value::Bool(b) => b.to_string(),
    serde_yaml::Value::Number(n) => n.to_string(),
    serde_yaml::Value::String(s) => s.clone(),
    other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
  }
}

/// Normalize a volume spec so equivalent spellings fingerprint the same.
///
/// - trailing slashes are removed from host and container paths
/// - a bind or named mount without a mode gets `:rw`
/// - an anonymous volume (container path only) is kept as is
pub fn normalize_volume(spec: &str) -> String {
  fn trim_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
  }

  let parts: Vec<&str> = spec.trim().split(':').collect();
  match parts.as_slice() {
    [target] => trim_path(target).to_string(),
    [source, target] => format!("{}:{}:rw", trim_path(source), trim_path(target)),
    [source, target, mode] => format!("{}:{}:{}", trim_path(source), trim_path(target), mode),
    _ => spec.trim().to_string(),
  }
}

/// Derive a project name from a directory name.
///
/// Lowercases and keeps only `[a-z0-9_-]`.
pub fn project_name_from_dir(dir: &Path) -> String {
  let raw = dir.file_name().and_then(|n| n.to_str()).unwrap_or("default");
  let name: String = raw
    .to_lowercase()
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
    .collect();
  if name.is_empty() { "default".to_string() } else { name }
}

/// Parse a declaration from a YAML string.
///
/// `origin` is only used in error messages.
pub fn parse_project(content: &str, project_name: &str, origin: &Path) -> Result<Project, ConfigError> {
  let file: ProjectFile = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
    path: origin.to_path_buf(),
    source,
  })?;

  let mut services = Vec::with_capacity(file.services.len());
  for (key, value) in file.services {
    let Some(name) = key.as_str().map(str::to_string) else {
      return Err(ConfigError::InvalidService {
        service: scalar_to_string(&key),
        message: "service name must be a string".to_string(),
      });
    };

    let raw: ServiceFile = serde_yaml::from_value(value).map_err(|source| ConfigError::Parse {
      path: origin.to_path_buf(),
      source,
    })?;

    services.push(service_from_file(name, raw)?);
  }

  debug!(project = %project_name, services = services.len(), "parsed declaration");

  Project::new(project_name, services)
}

fn service_from_file(name: String, raw: ServiceFile) -> Result<ServiceSpec, ConfigError> {
  let Some(image) = raw.image else {
    return Err(ConfigError::InvalidService {
      service: name,
      message: "missing image".to_string(),
    });
  };

  // `links` entries may carry an alias: `service:alias`.
  let links: BTreeSet<String> = raw
    .links
    .into_iter()
    .map(|link| link.split(':').next().unwrap_or_default().to_string())
    .collect();

  let mut volumes: Vec<String> = Vec::new();
  for volume in raw.volumes.iter().map(|v| normalize_volume(v)) {
    if !volumes.contains(&volume) {
      volumes.push(volume);
    }
  }

  Ok(ServiceSpec {
    name,
    image,
    image_id: None,
    command: raw.command.map(Args::into_vec),
    entrypoint: raw.entrypoint.map(Args::into_vec),
    environment: raw.environment.map(KeyValues::into_map).unwrap_or_default(),
    labels: raw.labels.map(KeyValues::into_map).unwrap_or_default(),
    volumes,
    depends_on: raw.depends_on.into_iter().collect(),
    links,
    scale: raw.scale.unwrap_or(1),
    resources: Resources {
      cpus: raw.cpus,
      mem_limit: raw.mem_limit,
    },
  })
}

/// Load a project from a declaration file.
///
/// When `project_name` is `None` the name is derived from the file's directory.
pub fn load_project(path: &Path, project_name: Option<&str>) -> Result<Project, ConfigError> {
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let name = match project_name {
    Some(name) => name.to_string(),
    None => {
      let dir = path
        .canonicalize()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_default();
      project_name_from_dir(&dir)
    }
  };

  parse_project(&content, &name, path)
}
