//! Validation and installation of mappings.

use crate::container::Node;
use crate::core::{Instance, TypeKey};
use crate::descriptor::{is_subtype, upcast_path};
use crate::error::{ContainerError, Result};
use crate::registry::{Factory, Mapping};
use tracing::debug;

impl Node {
  pub(crate) fn map_instance(&self, key: TypeKey, instance: Instance) -> Result<()> {
    let instance = if instance.key() == key {
      instance
    } else {
      let upcast = upcast_path(self.source.as_ref(), instance.key(), key).ok_or(
        ContainerError::NotAnInstanceOfType {
          ty: key,
          instance: instance.key(),
        },
      )?;
      upcast.apply(&instance)?
    };
    self.install(key, Mapping::Instance(instance))
  }

  pub(crate) fn map_factory(&self, key: TypeKey, factory: Factory) -> Result<()> {
    self.install(key, Mapping::Factory(factory))
  }

  /// `subtype` must reach `key` through its declared supertypes. Whether it can be
  /// built is checked now, unless this node already maps it in a way that will produce it.
  pub(crate) fn map_type(&self, key: TypeKey, subtype: TypeKey) -> Result<()> {
    let upcast = upcast_path(self.source.as_ref(), subtype, key)
      .ok_or(ContainerError::NotASubtype { ty: key, subtype })?;

    let instantiable = self
      .source
      .describe(&subtype)
      .is_some_and(|descriptor| descriptor.is_instantiable());
    if !instantiable && !self.subtype_is_mapped(key, subtype) {
      return Err(ContainerError::TypeNotInstantiable(subtype));
    }

    self.install(
      key,
      Mapping::Subtype {
        target: subtype,
        upcast,
      },
    )
  }

  // An instance or factory for the subtype always produces it. A further subtype
  // mapping counts only if its own target is also a subtype of `key`.
  fn subtype_is_mapped(&self, key: TypeKey, subtype: TypeKey) -> bool {
    let registry = self.registry.lock();
    let mapping = registry.borrow().mapping(&subtype);
    match mapping {
      Some(Mapping::Subtype { target, .. }) => is_subtype(self.source.as_ref(), target, key),
      Some(_) => true,
      None => false,
    }
  }

  fn install(&self, key: TypeKey, mapping: Mapping) -> Result<()> {
    // Children first, without holding this node's lock: a resolving child locks itself
    // and then this node, so checking them under our lock could deadlock. A child that
    // builds and caches `key` between this check and the insert below is not caught;
    // its own cached instance keeps shadowing the new mapping for that child.
    if self.children_contain(&key) {
      return Err(ContainerError::MappingAlreadyExists(key));
    }

    let registry = self.registry.lock();
    let mut registry = registry.borrow_mut();
    if registry.contains(&key) {
      return Err(ContainerError::MappingAlreadyExists(key));
    }
    debug!(ty = %key, kind = mapping.kind(), "mapping installed");
    registry.insert_mapping(key, mapping);
    Ok(())
  }
}
