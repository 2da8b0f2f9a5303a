//! The `Container` handle, its node, and the hierarchy operations.

use crate::core::{Instance, TypeKey};
use crate::descriptor::DescriptorSource;
use crate::error::{ContainerError, Result};
use crate::global;
use crate::registry::TypeRegistry;
use parking_lot::{Mutex, ReentrantMutex};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

// Serializes parent/child edits so two concurrent `add_child` calls cannot build a
// cycle between them.
static HIERARCHY: Mutex<()> = parking_lot::const_mutex(());

/// The container-capability interface.
///
/// Every container maps both `Container` and `dyn Resolve` to itself, so a type that
/// needs to resolve things on its own can declare either one as a constructor parameter.
pub trait Resolve: Send + Sync {
  fn resolve_key(&self, key: TypeKey) -> Result<Instance>;
  fn create_key(&self, key: TypeKey) -> Result<Instance>;
  fn contains_key(&self, key: TypeKey) -> bool;
}

impl dyn Resolve {
  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.resolve_key(TypeKey::of::<T>())?.downcast()
  }

  pub fn create<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.create_key(TypeKey::of::<T>())?.downcast()
  }

  pub fn contains<T: ?Sized + Any>(&self) -> bool {
    self.contains_key(TypeKey::of::<T>())
  }
}

/// One scope of the container hierarchy.
pub(crate) struct Node {
  pub(crate) registry: ReentrantMutex<RefCell<TypeRegistry>>,
  pub(crate) source: Arc<dyn DescriptorSource>,
  parent: Mutex<Weak<Node>>,
  children: Mutex<Vec<Weak<Node>>>,
  this: Weak<Node>,
  // The handle given out for the self-mapping while anyone still holds it.
  handle: Mutex<Weak<Container>>,
}

impl Node {
  fn container_keys() -> [TypeKey; 2] {
    [TypeKey::of::<Container>(), TypeKey::of::<dyn Resolve>()]
  }

  pub(crate) fn parent_node(&self) -> Option<Arc<Node>> {
    self.parent.lock().upgrade()
  }

  /// Live children. Children that were dropped are pruned on the way.
  fn child_nodes(&self) -> Vec<Arc<Node>> {
    let mut children = self.children.lock();
    children.retain(|child| child.strong_count() > 0);
    children.iter().filter_map(Weak::upgrade).collect()
  }

  /// The instance behind the bootstrap self-mapping for `key`.
  ///
  /// `Container` and `dyn Resolve` share one allocation, and every resolution returns
  /// it for as long as any caller keeps it alive. The node holds it weakly only.
  pub(crate) fn own_instance(&self, key: TypeKey) -> Result<Instance> {
    let container = {
      let mut handle = self.handle.lock();
      match handle.upgrade() {
        Some(container) => container,
        None => {
          let node = self
            .this
            .upgrade()
            .ok_or(ContainerError::TypeNotRegistered(key))?;
          let container = Arc::new(Container { node });
          *handle = Arc::downgrade(&container);
          container
        }
      }
    };
    if key == TypeKey::of::<dyn Resolve>() {
      Ok(Instance::new(container as Arc<dyn Resolve>))
    } else {
      Ok(Instance::new(container))
    }
  }

  pub(crate) fn contains_locally(&self, key: &TypeKey) -> bool {
    let registry = self.registry.lock();
    let contains = registry.borrow().contains(key);
    contains
  }

  // Each node is checked under its own lock only; no lock is held while descending.
  pub(crate) fn children_contain(&self, key: &TypeKey) -> bool {
    self.child_nodes().iter().any(|child| child.contains(key))
  }

  pub(crate) fn contains(&self, key: &TypeKey) -> bool {
    self.contains_locally(key) || self.children_contain(key)
  }

  fn remove(&self, key: &TypeKey) {
    for child in self.child_nodes() {
      child.remove(key);
    }
    let registry = self.registry.lock();
    if registry.borrow_mut().remove(key) {
      debug!(ty = %key, "removed type");
    }
  }

  fn reset(&self) {
    for child in self.child_nodes() {
      child.reset();
    }
    let registry = self.registry.lock();
    registry.borrow_mut().reset(&Self::container_keys());
    *self.handle.lock() = Weak::new();
    debug!("container reset");
  }

  fn has_ancestor(&self, candidate: &Arc<Node>) -> bool {
    let mut current = self.parent_node();
    while let Some(node) = current {
      if Arc::ptr_eq(&node, candidate) {
        return true;
      }
      current = node.parent_node();
    }
    false
  }
}

/// A thread-safe, hierarchical dependency injection container.
///
/// `Container` is a cheap handle: clones refer to the same node. A container owns its
/// mappings and singletons, may have one parent, and reaches its children in the sense
/// that [`remove`](Container::remove) and [`reset`](Container::reset) cascade to them.
///
/// Resolution walks upward only: local singleton, local mapping, then the ancestors,
/// and finally automatic construction on this node. [`has`](Container::has) looks
/// downward instead, so a parent cannot map a type that one of its children already
/// provides.
#[derive(Clone)]
pub struct Container {
  pub(crate) node: Arc<Node>,
}

impl Container {
  /// Creates a root container that builds types described in the process-wide
  /// [`catalog`](crate::catalog).
  pub fn new() -> Self {
    Self::with_source(global::catalog().clone())
  }

  /// Creates a root container that reads descriptors from `source`.
  pub fn with_source(source: Arc<dyn DescriptorSource>) -> Self {
    let node = Arc::new_cyclic(|this| Node {
      registry: ReentrantMutex::new(RefCell::new(TypeRegistry::default())),
      source,
      parent: Mutex::new(Weak::new()),
      children: Mutex::new(Vec::new()),
      this: this.clone(),
      handle: Mutex::new(Weak::new()),
    });
    node
      .registry
      .lock()
      .borrow_mut()
      .reset(&Node::container_keys());
    Self { node }
  }

  /// Creates a container with the same descriptor source and attaches it as a child.
  ///
  /// The parent refers to its children weakly: a child lives as long as some handle to
  /// it does, and drops out of [`children`](Container::children) afterwards.
  pub fn new_child(&self) -> Container {
    let child = Container::with_source(self.node.source.clone());
    let _hierarchy = HIERARCHY.lock();
    *child.node.parent.lock() = Arc::downgrade(&self.node);
    self.node.children.lock().push(Arc::downgrade(&child.node));
    child
  }

  // --- Resolution ---

  /// Returns the shared instance of `T`, producing and caching it if needed.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.get_key(TypeKey::of::<T>())?.downcast()
  }

  pub fn get_key(&self, key: TypeKey) -> Result<Instance> {
    self.node.get(key)
  }

  /// Builds a fresh `T` every call, ignoring mappings and the cache for `T` itself.
  /// Its dependencies still resolve through [`get`](Container::get).
  pub fn create<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.create_key(TypeKey::of::<T>())?.downcast()
  }

  pub fn create_key(&self, key: TypeKey) -> Result<Instance> {
    self.node.create(key)
  }

  /// `true` if this container or any of its descendants maps or caches `T`.
  pub fn has<T: ?Sized + Any>(&self) -> bool {
    self.has_key(TypeKey::of::<T>())
  }

  pub fn has_key(&self, key: TypeKey) -> bool {
    self.node.contains(&key)
  }

  // --- Mapping ---

  /// Maps `T` to an existing instance.
  pub fn map_instance<T: ?Sized + Any + Send + Sync>(&self, instance: Arc<T>) -> Result<()> {
    self.node.map_instance(TypeKey::of::<T>(), Instance::new(instance))
  }

  /// Maps `T` to an instance of `S`, which must be `T` or a declared subtype of it.
  pub fn map_instance_as<T, S>(&self, instance: Arc<S>) -> Result<()>
  where
    T: ?Sized + Any + Send + Sync,
    S: ?Sized + Any + Send + Sync,
  {
    self.node.map_instance(TypeKey::of::<T>(), Instance::new(instance))
  }

  /// Maps `T` to a factory. The factory runs at most once per container.
  pub fn map_factory<T: Any + Send + Sync>(
    &self,
    factory: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<()> {
    self.node.map_factory(
      TypeKey::of::<T>(),
      Arc::new(move || -> Result<Instance> { Ok(Instance::new(Arc::new(factory()))) }),
    )
  }

  /// Maps a trait object to a factory that returns it already behind an `Arc`.
  pub fn map_factory_trait<I: ?Sized + Any + Send + Sync>(
    &self,
    factory: impl Fn() -> Arc<I> + Send + Sync + 'static,
  ) -> Result<()> {
    self.node.map_factory(
      TypeKey::of::<I>(),
      Arc::new(move || -> Result<Instance> { Ok(Instance::new(factory())) }),
    )
  }

  /// Maps `T` to a factory that can fail. A failure is returned from the `get`
  /// that triggered it and nothing is cached.
  pub fn map_try_factory<T: ?Sized + Any + Send + Sync>(
    &self,
    factory: impl Fn() -> Result<Arc<T>> + Send + Sync + 'static,
  ) -> Result<()> {
    self.node.map_factory(
      TypeKey::of::<T>(),
      Arc::new(move || factory().map(Instance::new)),
    )
  }

  /// Maps `T` to its subtype `S`: resolving `T` resolves `S` and converts it.
  pub fn map_type<T: ?Sized + Any, S: ?Sized + Any>(&self) -> Result<()> {
    self.node.map_type(TypeKey::of::<T>(), TypeKey::of::<S>())
  }

  /// Removes `T` from this container and every descendant.
  pub fn remove<T: ?Sized + Any>(&self) {
    self.remove_key(TypeKey::of::<T>());
  }

  pub fn remove_key(&self, key: TypeKey) {
    self.node.remove(&key);
  }

  /// Clears mappings and singletons here and in every descendant, children first.
  /// The container stays usable and maps itself again.
  pub fn reset(&self) {
    self.node.reset();
  }

  // --- Hierarchy ---

  /// Attaches `child` below this container.
  ///
  /// Fails with [`ContainerError::ChildCannotBeDefault`] for the [`global`](crate::global)
  /// container and with [`ContainerError::CyclicHierarchy`] if `child` is this container
  /// or one of its ancestors. A child that already has another parent is moved here.
  pub fn add_child(&self, child: &Container) -> Result<()> {
    if global::default_if_initialized().is_some_and(|default| default.ptr_eq(child)) {
      return Err(ContainerError::ChildCannotBeDefault);
    }

    let _hierarchy = HIERARCHY.lock();
    if self.ptr_eq(child) || self.node.has_ancestor(&child.node) {
      return Err(ContainerError::CyclicHierarchy);
    }

    let previous = std::mem::replace(
      &mut *child.node.parent.lock(),
      Arc::downgrade(&self.node),
    );
    if let Some(previous) = previous.upgrade() {
      if !Arc::ptr_eq(&previous, &self.node) {
        previous
          .children
          .lock()
          .retain(|node| !std::ptr::eq(node.as_ptr(), Arc::as_ptr(&child.node)));
      }
    }

    let mut children = self.node.children.lock();
    children.retain(|node| node.strong_count() > 0);
    if !children
      .iter()
      .any(|node| std::ptr::eq(node.as_ptr(), Arc::as_ptr(&child.node)))
    {
      children.push(Arc::downgrade(&child.node));
      debug!(children = children.len(), "child container attached");
    }
    Ok(())
  }

  pub fn parent(&self) -> Option<Container> {
    self.node.parent_node().map(|node| Container { node })
  }

  pub fn children(&self) -> Vec<Container> {
    self
      .node
      .child_nodes()
      .into_iter()
      .map(|node| Container { node })
      .collect()
  }

  /// `true` if both handles refer to the same container.
  pub fn ptr_eq(&self, other: &Container) -> bool {
    Arc::ptr_eq(&self.node, &other.node)
  }

  /// Types this container maps or caches itself, excluding descendants.
  pub fn registered_types(&self) -> Vec<TypeKey> {
    let registry = self.node.registry.lock();
    let keys = registry.borrow().keys().collect();
    keys
  }
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

impl Resolve for Container {
  fn resolve_key(&self, key: TypeKey) -> Result<Instance> {
    self.get_key(key)
  }

  fn create_key(&self, key: TypeKey) -> Result<Instance> {
    Container::create_key(self, key)
  }

  fn contains_key(&self, key: TypeKey) -> bool {
    self.has_key(key)
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let registry = self.node.registry.lock();
    let registry = registry.borrow();
    f.debug_struct("Container")
      .field("mappings", &registry.mapping_count())
      .field("singletons", &registry.singleton_count())
      .field("children", &self.node.child_nodes().len())
      .finish()
  }
}
