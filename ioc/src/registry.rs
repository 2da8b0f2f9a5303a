//! Per-node storage: the singleton cache and the installed mappings.

use crate::core::{Instance, TypeKey};
use crate::descriptor::Upcast;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) type Factory = Arc<dyn Fn() -> Result<Instance> + Send + Sync>;

/// How a node produces an instance of a mapped type.
#[derive(Clone)]
pub(crate) enum Mapping {
  /// A ready-made instance, handed out as-is.
  Instance(Instance),
  /// Called once; the result is cached on the node that owns the mapping.
  Factory(Factory),
  /// Resolve `target`, then convert it with `upcast`.
  Subtype { target: TypeKey, upcast: Upcast },
  /// The owning node itself, seeded on creation and on reset.
  Container,
}

impl Mapping {
  pub(crate) fn kind(&self) -> &'static str {
    match self {
      Mapping::Instance(_) => "instance",
      Mapping::Factory(_) => "factory",
      Mapping::Subtype { .. } => "subtype",
      Mapping::Container => "container",
    }
  }
}

impl fmt::Debug for Mapping {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Mapping::Subtype { target, .. } => write!(f, "Subtype({})", target),
      other => f.write_str(other.kind()),
    }
  }
}

#[derive(Default)]
pub(crate) struct TypeRegistry {
  singletons: HashMap<TypeKey, Instance>,
  mappings: HashMap<TypeKey, Mapping>,
}

impl TypeRegistry {
  pub(crate) fn contains(&self, key: &TypeKey) -> bool {
    self.singletons.contains_key(key) || self.mappings.contains_key(key)
  }

  pub(crate) fn singleton(&self, key: &TypeKey) -> Option<Instance> {
    self.singletons.get(key).cloned()
  }

  pub(crate) fn mapping(&self, key: &TypeKey) -> Option<Mapping> {
    self.mappings.get(key).cloned()
  }

  /// Caller has already checked `contains`.
  pub(crate) fn insert_mapping(&mut self, key: TypeKey, mapping: Mapping) {
    self.mappings.insert(key, mapping);
  }

  pub(crate) fn cache(&mut self, key: TypeKey, instance: Instance) {
    self.singletons.insert(key, instance);
  }

  /// Drops the cached singleton and mapping for `key`. The bootstrap self-mapping stays.
  pub(crate) fn remove(&mut self, key: &TypeKey) -> bool {
    let cached = self.singletons.remove(key).is_some();
    let mapped = match self.mappings.get(key) {
      Some(Mapping::Container) | None => false,
      Some(_) => self.mappings.remove(key).is_some(),
    };
    cached || mapped
  }

  /// Clears everything and reseeds the self-mapping under each of `container_keys`.
  pub(crate) fn reset(&mut self, container_keys: &[TypeKey]) {
    self.singletons.clear();
    self.mappings.clear();
    for key in container_keys {
      self.mappings.insert(*key, Mapping::Container);
    }
  }

  /// Every type this node can answer for locally.
  pub(crate) fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
    self
      .mappings
      .keys()
      .chain(self.singletons.keys().filter(|key| !self.mappings.contains_key(*key)))
      .copied()
  }

  pub(crate) fn singleton_count(&self) -> usize {
    self.singletons.len()
  }

  pub(crate) fn mapping_count(&self) -> usize {
    self.mappings.len()
  }
}
