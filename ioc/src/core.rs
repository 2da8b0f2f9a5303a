//! Core data structures shared by the resolver and the mapper.

use crate::error::{ContainerError, Result};
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

thread_local! {
  // Types currently being produced on this thread, outermost first. A type that shows
  // up twice means the construction graph loops back on itself.
  static RESOLVING_STACK: RefCell<Vec<TypeKey>> = const { RefCell::new(Vec::new()) };
}

/// An RAII guard that marks a type as "in progress" for the current resolution.
///
/// Entering a type that is already on the thread-local stack fails with
/// [`ContainerError::CircularDependency`] carrying the full chain. Dropping the guard
/// pops the type again, including during unwinding out of a panicking factory.
pub(crate) struct ResolutionGuard {
  key: TypeKey,
}

impl ResolutionGuard {
  pub(crate) fn enter(key: TypeKey) -> Result<Self> {
    RESOLVING_STACK.with(|stack| {
      let mut stack = stack.borrow_mut();
      if stack.contains(&key) {
        let mut chain = stack.clone();
        chain.push(key);
        return Err(ContainerError::CircularDependency { chain });
      }
      stack.push(key);
      Ok(())
    })?;
    Ok(Self { key })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLVING_STACK.with(|stack| {
      let popped = stack.borrow_mut().pop();
      debug_assert_eq!(popped, Some(self.key));
    });
  }
}

/// An opaque identifier for a concrete type or a trait object.
///
/// Two keys are equal when they name the same type. The type name is kept only
/// for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
  id: TypeId,
  name: &'static str,
}

impl TypeKey {
  /// Returns the key for `T`. Works for trait objects, e.g. `TypeKey::of::<dyn Greeter>()`.
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: type_name::<T>(),
    }
  }

  pub fn id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for TypeKey {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeKey({})", self.name)
  }
}

impl fmt::Display for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// A type-erased, shared instance produced or held by a container.
///
/// Internally this is an `Arc<T>` boxed behind `dyn Any`, so trait objects can be
/// stored next to concrete types and handed back out without copying.
#[derive(Clone)]
pub struct Instance {
  key: TypeKey,
  value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
  pub fn new<T: ?Sized + Any + Send + Sync>(value: Arc<T>) -> Self {
    Self {
      key: TypeKey::of::<T>(),
      value: Arc::new(value),
    }
  }

  /// The type this instance was created as.
  pub fn key(&self) -> TypeKey {
    self.key
  }

  /// Recovers the typed `Arc<T>`.
  pub fn downcast<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self
      .value
      .downcast_ref::<Arc<T>>()
      .cloned()
      .ok_or(ContainerError::InstanceMismatch {
        expected: TypeKey::of::<T>(),
        found: self.key,
      })
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Instance({})", self.key.name)
  }
}
