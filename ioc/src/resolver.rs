//! Resolution: deciding how an instance of a requested type gets produced.
//!
//! For a `get` on node N the order is:
//!
//! 1. N's singleton cache.
//! 2. N's mapping, produced and (for factories and subtypes) cached on N.
//! 3. The same two lookups on each ancestor in turn. A hit there is cached on the
//!    ancestor, never on N.
//! 4. Automatic construction from the type's descriptor, cached on N.
//!
//! Every node involved is locked for the duration, child before parent. The lock is
//! re-entrant, so factories and constructors may call back into the same container on
//! the same thread; a call that comes back around to a type still in progress is
//! reported as a circular dependency.

use crate::container::Node;
use crate::core::{Instance, ResolutionGuard, TypeKey};
use crate::error::{ContainerError, Result};
use crate::registry::Mapping;
use tracing::trace;

impl Node {
  pub(crate) fn get(&self, key: TypeKey) -> Result<Instance> {
    let _guard = ResolutionGuard::enter(key)?;
    let registry = self.registry.lock();

    if let Some(instance) = self.lookup(key)? {
      return Ok(instance);
    }

    trace!(ty = %key, "no mapping in hierarchy, constructing");
    let instance = self.construct(key)?;
    registry.borrow_mut().cache(key, instance.clone());
    Ok(instance)
  }

  pub(crate) fn create(&self, key: TypeKey) -> Result<Instance> {
    let _guard = ResolutionGuard::enter(key)?;
    let _registry = self.registry.lock();
    self.construct(key)
  }

  /// Steps 1 to 3: this node, then each ancestor. `None` means nobody maps `key`.
  fn lookup(&self, key: TypeKey) -> Result<Option<Instance>> {
    let registry = self.registry.lock();
    let (cached, mapping) = {
      let registry = registry.borrow();
      (registry.singleton(&key), registry.mapping(&key))
    };

    if let Some(instance) = cached {
      trace!(ty = %key, "singleton cache hit");
      return Ok(Some(instance));
    }
    if let Some(mapping) = mapping {
      trace!(ty = %key, kind = mapping.kind(), "producing from mapping");
      return self.produce(key, mapping).map(Some);
    }
    drop(registry);

    match self.parent_node() {
      Some(parent) => {
        trace!(ty = %key, "delegating lookup to parent");
        parent.lookup(key)
      }
      None => Ok(None),
    }
  }

  /// Caller holds this node's lock.
  fn produce(&self, key: TypeKey, mapping: Mapping) -> Result<Instance> {
    let instance = match mapping {
      Mapping::Instance(instance) => return Ok(instance),
      Mapping::Container => return self.own_instance(key),
      Mapping::Factory(factory) => factory()?,
      Mapping::Subtype { target, upcast } => {
        let subtype = self.get(target)?;
        upcast.apply(&subtype)?
      }
    };
    ensure_key(key, &instance)?;
    self.registry.lock().borrow_mut().cache(key, instance.clone());
    Ok(instance)
  }

  /// Builds `key` from its descriptor, resolving each parameter through `get` on this
  /// node. The result is not cached here.
  fn construct(&self, key: TypeKey) -> Result<Instance> {
    let descriptor = self
      .source
      .describe(&key)
      .ok_or(ContainerError::TypeNotRegistered(key))?;
    if !descriptor.is_instantiable() {
      return Err(ContainerError::TypeNotInstantiable(key));
    }

    let arguments = descriptor
      .dependencies()
      .iter()
      .map(|dependency| self.get(*dependency))
      .collect::<Result<Vec<_>>>()?;

    let instance = descriptor.construct(arguments)?;
    ensure_key(key, &instance)?;
    Ok(instance)
  }
}

fn ensure_key(key: TypeKey, instance: &Instance) -> Result<()> {
  if instance.key() == key {
    Ok(())
  } else {
    Err(ContainerError::InstanceMismatch {
      expected: key,
      found: instance.key(),
    })
  }
}
