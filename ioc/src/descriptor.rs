//! Type descriptors: how a container learns what a type needs and what it is.
//!
//! Rust has no runtime reflection, so a type that should be built automatically (or
//! used as the target of a subtype mapping) is described up front. A [`Descriptor`]
//! lists the constructor's parameter types, the constructor itself, and the supertypes
//! the type can be converted into. Containers only ever see descriptors through the
//! [`DescriptorSource`] trait, so any registry can stand in for the default [`Catalog`].

use crate::core::{Instance, TypeKey};
use crate::error::{ContainerError, Result};
use dashmap::DashMap;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type ErasedConstructor = Arc<dyn Fn(&mut Arguments) -> Result<Instance> + Send + Sync>;
type ErasedUpcast = Arc<dyn Fn(&Instance) -> Result<Instance> + Send + Sync>;

/// Converts an instance of a subtype into an instance of one of its declared supertypes.
#[derive(Clone)]
pub struct Upcast {
  target: TypeKey,
  func: ErasedUpcast,
}

impl Upcast {
  pub fn target(&self) -> TypeKey {
    self.target
  }

  pub fn apply(&self, instance: &Instance) -> Result<Instance> {
    (self.func)(instance)
  }
}

impl fmt::Debug for Upcast {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Upcast(-> {})", self.target)
  }
}

/// The type-erased form of a [`Descriptor`], as stored in a [`DescriptorSource`].
pub struct TypeDescriptor {
  key: TypeKey,
  dependencies: Vec<TypeKey>,
  constructor: Option<ErasedConstructor>,
  supertypes: HashMap<TypeKey, Upcast>,
}

impl TypeDescriptor {
  pub fn key(&self) -> TypeKey {
    self.key
  }

  /// Constructor parameter types, in declaration order.
  pub fn dependencies(&self) -> &[TypeKey] {
    &self.dependencies
  }

  /// `false` for abstract types: trait objects or anything described without a constructor.
  pub fn is_instantiable(&self) -> bool {
    self.constructor.is_some()
  }

  pub fn upcast_to(&self, supertype: &TypeKey) -> Option<&Upcast> {
    self.supertypes.get(supertype)
  }

  pub fn supertypes(&self) -> impl Iterator<Item = TypeKey> + '_ {
    self.supertypes.keys().copied()
  }

  /// Runs the constructor with already-resolved arguments.
  pub(crate) fn construct(&self, values: Vec<Instance>) -> Result<Instance> {
    let constructor = self
      .constructor
      .as_ref()
      .ok_or(ContainerError::TypeNotInstantiable(self.key))?;
    let mut arguments = Arguments {
      owner: self.key,
      values,
      cursor: 0,
    };
    constructor(&mut arguments)
  }
}

impl fmt::Debug for TypeDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypeDescriptor")
      .field("key", &self.key)
      .field("dependencies", &self.dependencies)
      .field("instantiable", &self.is_instantiable())
      .field("supertypes", &self.supertypes.keys().collect::<Vec<_>>())
      .finish()
  }
}

/// Resolved constructor arguments, handed out in the order they were declared.
pub struct Arguments {
  owner: TypeKey,
  values: Vec<Instance>,
  cursor: usize,
}

impl Arguments {
  /// Takes the next argument as an `Arc<D>`.
  pub fn take<D: ?Sized + Any + Send + Sync>(&mut self) -> Result<Arc<D>> {
    let index = self.cursor;
    let value = self
      .values
      .get(index)
      .ok_or(ContainerError::MissingArgument {
        ty: self.owner,
        index,
        declared: self.values.len(),
      })?;
    self.cursor += 1;
    value.downcast::<D>()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// A typed builder for a [`TypeDescriptor`].
///
/// # Examples
///
/// ```
/// use fibre_di::{Catalog, Descriptor};
/// use std::sync::Arc;
///
/// trait Store: Send + Sync {}
/// struct Config;
/// struct DiskStore { config: Arc<Config> }
/// impl Store for DiskStore {}
///
/// let catalog = Catalog::new();
/// catalog.register(Descriptor::<Config>::new().constructor(|_| Ok(Config)));
/// catalog.register(
///   Descriptor::<DiskStore>::new()
///     .depends_on::<Config>()
///     .implements::<dyn Store>(|store| store)
///     .constructor(|args| Ok(DiskStore { config: args.take()? })),
/// );
/// ```
pub struct Descriptor<T: ?Sized> {
  inner: TypeDescriptor,
  _marker: PhantomData<fn(Arc<T>)>,
}

impl<T: ?Sized + Any + Send + Sync> Descriptor<T> {
  /// Starts an abstract descriptor: no constructor, no parameters, no supertypes.
  pub fn new() -> Self {
    Self {
      inner: TypeDescriptor {
        key: TypeKey::of::<T>(),
        dependencies: Vec::new(),
        constructor: None,
        supertypes: HashMap::new(),
      },
      _marker: PhantomData,
    }
  }

  /// Appends a constructor parameter of type `D`.
  pub fn depends_on<D: ?Sized + Any + Send + Sync>(mut self) -> Self {
    self.inner.dependencies.push(TypeKey::of::<D>());
    self
  }

  /// Declares `I` as a supertype of `T`. `upcast` is normally an unsizing coercion.
  pub fn implements<I: ?Sized + Any + Send + Sync>(mut self, upcast: fn(Arc<T>) -> Arc<I>) -> Self {
    let target = TypeKey::of::<I>();
    let func: ErasedUpcast = Arc::new(move |instance: &Instance| -> Result<Instance> {
      let value = instance.downcast::<T>()?;
      Ok(Instance::new(upcast(value)))
    });
    self.inner.supertypes.insert(target, Upcast { target, func });
    self
  }

  pub fn into_erased(self) -> TypeDescriptor {
    self.inner
  }
}

impl<T: Any + Send + Sync> Descriptor<T> {
  /// Makes the type concrete. The closure pulls its arguments with [`Arguments::take`].
  pub fn constructor(
    mut self,
    constructor: impl Fn(&mut Arguments) -> Result<T> + Send + Sync + 'static,
  ) -> Self {
    let erased: ErasedConstructor = Arc::new(move |args: &mut Arguments| -> Result<Instance> {
      Ok(Instance::new(Arc::new(constructor(args)?)))
    });
    self.inner.constructor = Some(erased);
    self
  }
}

impl<T: ?Sized + Any + Send + Sync> Default for Descriptor<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// A type that knows how to describe itself.
pub trait Injectable: Any + Send + Sync {
  fn descriptor() -> Descriptor<Self>;
}

/// Anything that can answer "how is this type built, and what is it a subtype of".
pub trait DescriptorSource: Send + Sync {
  fn describe(&self, key: &TypeKey) -> Option<Arc<TypeDescriptor>>;
}

/// Returns `true` if `sub` reaches `sup` through declared supertypes, directly or
/// through intermediate supertypes. A type is not its own subtype.
pub fn is_subtype(source: &dyn DescriptorSource, sub: TypeKey, sup: TypeKey) -> bool {
  upcast_path(source, sub, sup).is_some()
}

/// Finds the shortest chain of declared supertypes leading from `sub` to `sup` and
/// returns a single [`Upcast`] that applies each step in turn.
pub fn upcast_path(source: &dyn DescriptorSource, sub: TypeKey, sup: TypeKey) -> Option<Upcast> {
  if sub == sup {
    return None;
  }

  // Reached type -> (the type it was reached from, the step taken).
  let mut reached: HashMap<TypeKey, (TypeKey, Upcast)> = HashMap::new();
  let mut pending = VecDeque::from([sub]);
  while let Some(current) = pending.pop_front() {
    let Some(descriptor) = source.describe(&current) else {
      continue;
    };
    for supertype in descriptor.supertypes() {
      if supertype == sub || reached.contains_key(&supertype) {
        continue;
      }
      let Some(step) = descriptor.upcast_to(&supertype) else {
        continue;
      };
      reached.insert(supertype, (current, step.clone()));
      if supertype == sup {
        return Some(compose(sub, sup, &reached));
      }
      pending.push_back(supertype);
    }
  }
  None
}

fn compose(sub: TypeKey, sup: TypeKey, reached: &HashMap<TypeKey, (TypeKey, Upcast)>) -> Upcast {
  let mut steps = Vec::new();
  let mut current = sup;
  while current != sub {
    let Some((from, step)) = reached.get(&current) else {
      break;
    };
    steps.push(step.clone());
    current = *from;
  }
  steps.reverse();

  if steps.len() == 1 {
    return steps.remove(0);
  }
  let func: ErasedUpcast = Arc::new(move |instance: &Instance| -> Result<Instance> {
    steps
      .iter()
      .try_fold(instance.clone(), |current, step| step.apply(&current))
  });
  Upcast { target: sup, func }
}

/// A thread-safe registry of descriptors, filled by explicit registration.
///
/// Registering a type again replaces its previous descriptor.
#[derive(Default)]
pub struct Catalog {
  descriptors: DashMap<TypeKey, Arc<TypeDescriptor>>,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<T: ?Sized + Any + Send + Sync>(&self, descriptor: Descriptor<T>) {
    self
      .descriptors
      .insert(TypeKey::of::<T>(), Arc::new(descriptor.into_erased()));
  }

  pub fn register_injectable<T: Injectable>(&self) {
    self.register(T::descriptor());
  }

  pub fn contains<T: ?Sized + Any>(&self) -> bool {
    self.descriptors.contains_key(&TypeKey::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }
}

impl DescriptorSource for Catalog {
  fn describe(&self, key: &TypeKey) -> Option<Arc<TypeDescriptor>> {
    self.descriptors.get(key).map(|entry| entry.value().clone())
  }
}

impl fmt::Debug for Catalog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Catalog")
      .field("descriptors", &self.descriptors.len())
      .finish()
  }
}
