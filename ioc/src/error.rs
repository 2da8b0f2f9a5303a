//! The error type returned by every fallible container operation.

use crate::core::TypeKey;
use std::any::Any;
use std::fmt::Display;

pub type Result<T, E = ContainerError> = std::result::Result<T, E>;

/// Everything that can go wrong while configuring or resolving a container.
///
/// A failed operation never leaves a partial mapping or cache entry behind, so the
/// container stays usable after any of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
  /// The type is already mapped or resolved on this node or one of its children.
  #[error("a mapping for `{0}` already exists")]
  MappingAlreadyExists(TypeKey),

  #[error("an instance of `{instance}` is not an instance of `{ty}`")]
  NotAnInstanceOfType { ty: TypeKey, instance: TypeKey },

  /// The candidate is the type itself, or does not declare the type as a supertype.
  #[error("`{subtype}` is not a subtype of `{ty}`")]
  NotASubtype { ty: TypeKey, subtype: TypeKey },

  /// The type is abstract (a trait object, or described without a constructor).
  #[error("type `{0}` cannot be instantiated")]
  TypeNotInstantiable(TypeKey),

  /// Nothing maps the type and no descriptor says how to build it.
  #[error("type `{0}` is not registered and has no descriptor")]
  TypeNotRegistered(TypeKey),

  #[error("circular dependency detected: {}", format_chain(.chain))]
  CircularDependency { chain: Vec<TypeKey> },

  #[error("adding this child would create a cycle in the container hierarchy")]
  CyclicHierarchy,

  #[error("the default container cannot be added as a child")]
  ChildCannotBeDefault,

  /// A producer handed back an instance of a different type than the one requested.
  #[error("expected an instance of `{expected}`, found `{found}`")]
  InstanceMismatch { expected: TypeKey, found: TypeKey },

  #[error("constructor of `{ty}` asked for argument #{index} but only {declared} were declared")]
  MissingArgument {
    ty: TypeKey,
    index: usize,
    declared: usize,
  },

  #[error("factory for `{ty}` failed: {reason}")]
  FactoryFailed { ty: TypeKey, reason: String },
}

impl ContainerError {
  /// Wraps a foreign error raised inside a factory or constructor for `T`.
  pub fn factory_failed<T: ?Sized + Any>(reason: impl Display) -> Self {
    ContainerError::FactoryFailed {
      ty: TypeKey::of::<T>(),
      reason: reason.to_string(),
    }
  }
}

fn format_chain(chain: &[TypeKey]) -> String {
  chain
    .iter()
    .map(TypeKey::name)
    .collect::<Vec<_>>()
    .join(" -> ")
}
