//! Service and project types.
//!
//! # Ordering
//!
//! A [`Project`] keeps services in declaration order. Graph traversals use that
//! order to break ties, so plans and reports are deterministic for a given
//! declaration.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Declared resource constraints for a service's containers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
  /// CPU quota, in cores.
  pub cpus: Option<f64>,
  /// Memory limit as given in the declaration (e.g. `512m`).
  pub mem_limit: Option<String>,
}

/// The declared description of one service for this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
  /// Unique service name within the project.
  pub name: String,

  /// Image reference as declared (e.g. `postgres:16`).
  pub image: String,

  /// Content id the reference resolved to.
  ///
  /// Filled in by the runtime before planning, never by the declaration.
  pub image_id: Option<String>,

  pub command: Option<Vec<String>>,

  pub entrypoint: Option<Vec<String>>,

  pub environment: HashMap<String, String>,

  pub labels: HashMap<String, String>,

  /// Normalized mount specs (see [`super::load::normalize_volume`]).
  pub volumes: Vec<String>,

  /// Services that must be converged before this one.
  pub depends_on: BTreeSet<String>,

  /// Services this one links to by name. Links are also ordering edges.
  pub links: BTreeSet<String>,

  /// Desired number of containers, at least 1.
  pub scale: u32,

  pub resources: Resources,
}

impl ServiceSpec {
  /// Create a spec with the given name and image and every other field empty.
  pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      image: image.into(),
      image_id: None,
      command: None,
      entrypoint: None,
      environment: HashMap::new(),
      labels: HashMap::new(),
      volumes: Vec::new(),
      depends_on: BTreeSet::new(),
      links: BTreeSet::new(),
      scale: 1,
      resources: Resources::default(),
    }
  }

  pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.environment.insert(key.into(), value.into());
    self
  }

  pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.labels.insert(key.into(), value.into());
    self
  }

  pub fn with_command<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
    self.command = Some(args.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
    self.volumes.push(volume.into());
    self
  }

  pub fn depends_on(mut self, service: impl Into<String>) -> Self {
    self.depends_on.insert(service.into());
    self
  }

  pub fn links_to(mut self, service: impl Into<String>) -> Self {
    self.links.insert(service.into());
    self
  }

  pub fn with_scale(mut self, scale: u32) -> Self {
    self.scale = scale;
    self
  }

  pub fn with_image_id(mut self, image_id: impl Into<String>) -> Self {
    self.image_id = Some(image_id.into());
    self
  }

  /// Every service this one has an ordering edge to (`depends_on` ∪ `links`).
  pub fn dependencies(&self) -> BTreeSet<&str> {
    self.depends_on.iter().chain(self.links.iter()).map(String::as_str).collect()
  }
}

/// An ordered, validated set of services.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
  name: String,
  services: Vec<ServiceSpec>,
  index: HashMap<String, usize>,
}

impl Project {
  /// Build a project from services in declaration order.
  ///
  /// # Errors
  ///
  /// - `DuplicateService` if two services share a name
  /// - `InvalidScale` if any service has scale 0
  /// - `UnknownDependency` if a `depends_on`/`links` entry names a missing service
  pub fn new(name: impl Into<String>, services: Vec<ServiceSpec>) -> Result<Self, ConfigError> {
    let mut index = HashMap::with_capacity(services.len());
    for (i, service) in services.iter().enumerate() {
      if index.insert(service.name.clone(), i).is_some() {
        return Err(ConfigError::DuplicateService(service.name.clone()));
      }
      if service.scale == 0 {
        return Err(ConfigError::InvalidScale {
          service: service.name.clone(),
          scale: 0,
        });
      }
    }

    for service in &services {
      for dep in service.dependencies() {
        if !index.contains_key(dep) {
          return Err(ConfigError::UnknownDependency {
            service: service.name.clone(),
            dependency: dep.to_string(),
          });
        }
      }
    }

    Ok(Self {
      name: name.into(),
      services,
      index,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Services in declaration order.
  pub fn services(&self) -> &[ServiceSpec] {
    &self.services
  }

  pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
    self.index.get(name).map(|&i| &self.services[i])
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.services.len()
  }

  pub fn is_empty(&self) -> bool {
    self.services.is_empty()
  }

  /// Return a copy with desired scales overridden for this run only.
  ///
  /// # Errors
  ///
  /// `UnknownService` for an override naming a missing service, `InvalidScale`
  /// for an override of 0.
  pub fn with_scale_overrides(&self, overrides: &[(String, u32)]) -> Result<Self, ConfigError> {
    let mut project = self.clone();
    for (name, scale) in overrides {
      let Some(&i) = project.index.get(name) else {
        return Err(ConfigError::UnknownService(name.clone()));
      };
      if *scale == 0 {
        return Err(ConfigError::InvalidScale {
          service: name.clone(),
          scale: 0,
        });
      }
      project.services[i].scale = *scale;
    }
    Ok(project)
  }

  /// Return a copy where each service is passed through `f`.
  ///
  /// Used to fill in resolved image ids. Names and edges must not change.
  pub fn map_services(&self, mut f: impl FnMut(&ServiceSpec) -> ServiceSpec) -> Self {
    let services: Vec<ServiceSpec> = self.services.iter().map(&mut f).collect();
    Self {
      name: self.name.clone(),
      services,
      index: self.index.clone(),
    }
  }
}
