use fibre_di::{Catalog, Container, ContainerError, Descriptor, Resolve, TypeKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

trait Greeter: Send + Sync {
  fn greet(&self) -> String;
}

struct EnglishGreeter;
impl Greeter for EnglishGreeter {
  fn greet(&self) -> String {
    "Hello!".to_string()
  }
}

struct GermanGreeter;
impl Greeter for GermanGreeter {
  fn greet(&self) -> String {
    "Hallo!".to_string()
  }
}

#[derive(Debug, PartialEq, Eq)]
struct SimpleService {
  id: u32,
}

struct Unrelated;

// Every test builds its own catalog and container so nothing leaks between them.
fn setup() -> (Arc<Catalog>, Container) {
  let catalog = Arc::new(Catalog::new());
  catalog.register(Descriptor::<SimpleService>::new().constructor(|_| Ok(SimpleService { id: 7 })));
  catalog.register(
    Descriptor::<EnglishGreeter>::new()
      .implements::<dyn Greeter>(|greeter| greeter)
      .constructor(|_| Ok(EnglishGreeter)),
  );
  catalog.register(
    Descriptor::<GermanGreeter>::new()
      .implements::<dyn Greeter>(|greeter| greeter)
      .constructor(|_| Ok(GermanGreeter)),
  );
  catalog.register(Descriptor::<dyn Greeter>::new());
  let container = Container::with_source(catalog.clone());
  (catalog, container)
}

// --- Basic Tests ---

#[test]
fn test_automatic_construction_is_a_singleton() {
  let (_catalog, container) = setup();

  let r1 = container.get::<SimpleService>().unwrap();
  let r2 = container.get::<SimpleService>().unwrap();

  assert_eq!(r1.id, 7);
  assert!(Arc::ptr_eq(&r1, &r2));
}

#[test]
fn test_create_returns_fresh_instances() {
  let (_catalog, container) = setup();

  let c1 = container.create::<SimpleService>().unwrap();
  let c2 = container.create::<SimpleService>().unwrap();
  let shared = container.get::<SimpleService>().unwrap();

  assert!(!Arc::ptr_eq(&c1, &c2));
  assert!(!Arc::ptr_eq(&c1, &shared));
}

#[test]
fn test_create_ignores_mappings_for_the_requested_type() {
  let (_catalog, container) = setup();
  container
    .map_instance(Arc::new(SimpleService { id: 99 }))
    .unwrap();

  assert_eq!(container.get::<SimpleService>().unwrap().id, 99);
  assert_eq!(container.create::<SimpleService>().unwrap().id, 7);
}

#[test]
fn test_mapped_instance_is_returned_as_is() {
  let (_catalog, container) = setup();
  let instance = Arc::new(SimpleService { id: 202 });

  container.map_instance(instance.clone()).unwrap();

  assert!(Arc::ptr_eq(&container.get::<SimpleService>().unwrap(), &instance));
  assert!(Arc::ptr_eq(&container.get::<SimpleService>().unwrap(), &instance));
}

#[test]
fn test_factory_runs_once() {
  let (_catalog, container) = setup();
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();

  container
    .map_factory(move || SimpleService {
      id: counter.fetch_add(1, Ordering::SeqCst) as u32 + 100,
    })
    .unwrap();

  let r1 = container.get::<SimpleService>().unwrap();
  let r2 = container.get::<SimpleService>().unwrap();

  assert_eq!(r1.id, 100);
  assert!(Arc::ptr_eq(&r1, &r2));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_trait_factory_resolution() {
  let (_catalog, container) = setup();
  container
    .map_factory_trait::<dyn Greeter>(|| Arc::new(GermanGreeter))
    .unwrap();

  assert_eq!(container.get::<dyn Greeter>().unwrap().greet(), "Hallo!");
}

#[test]
fn test_failed_factory_caches_nothing() {
  let (_catalog, container) = setup();
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();

  container
    .map_try_factory::<SimpleService>(move || {
      if counter.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(ContainerError::factory_failed::<SimpleService>("not ready"))
      } else {
        Ok(Arc::new(SimpleService { id: 5 }))
      }
    })
    .unwrap();

  let err = container.get::<SimpleService>().unwrap_err();
  assert!(matches!(err, ContainerError::FactoryFailed { .. }));
  assert!(err.to_string().contains("not ready"));

  assert_eq!(container.get::<SimpleService>().unwrap().id, 5);
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_mapping_twice_fails() {
  let (_catalog, container) = setup();
  let key = TypeKey::of::<dyn Greeter>();

  container
    .map_factory_trait::<dyn Greeter>(|| Arc::new(EnglishGreeter))
    .unwrap();

  assert_eq!(
    container.map_instance::<dyn Greeter>(Arc::new(GermanGreeter)),
    Err(ContainerError::MappingAlreadyExists(key))
  );
  assert_eq!(
    container.map_factory_trait::<dyn Greeter>(|| Arc::new(GermanGreeter)),
    Err(ContainerError::MappingAlreadyExists(key))
  );
  assert_eq!(
    container.map_type::<dyn Greeter, GermanGreeter>(),
    Err(ContainerError::MappingAlreadyExists(key))
  );

  // The original mapping is untouched.
  assert_eq!(container.get::<dyn Greeter>().unwrap().greet(), "Hello!");
}

#[test]
fn test_mapping_a_resolved_type_fails() {
  let (_catalog, container) = setup();
  container.get::<SimpleService>().unwrap();

  assert_eq!(
    container.map_factory(|| SimpleService { id: 1 }),
    Err(ContainerError::MappingAlreadyExists(TypeKey::of::<SimpleService>()))
  );
}

#[test]
fn test_map_type_resolves_through_the_subtype() {
  let (_catalog, container) = setup();
  container.map_type::<dyn Greeter, GermanGreeter>().unwrap();

  let greeter = container.get::<dyn Greeter>().unwrap();
  assert_eq!(greeter.greet(), "Hallo!");
  assert!(Arc::ptr_eq(&greeter, &container.get::<dyn Greeter>().unwrap()));
  // The concrete subtype was resolved, and cached, along the way.
  assert!(container.has::<GermanGreeter>());
}

#[test]
fn test_map_type_rejects_non_subtypes() {
  let (catalog, container) = setup();
  catalog.register(Descriptor::<Unrelated>::new().constructor(|_| Ok(Unrelated)));

  assert_eq!(
    container.map_type::<EnglishGreeter, EnglishGreeter>(),
    Err(ContainerError::NotASubtype {
      ty: TypeKey::of::<EnglishGreeter>(),
      subtype: TypeKey::of::<EnglishGreeter>(),
    })
  );
  assert_eq!(
    container.map_type::<dyn Greeter, Unrelated>(),
    Err(ContainerError::NotASubtype {
      ty: TypeKey::of::<dyn Greeter>(),
      subtype: TypeKey::of::<Unrelated>(),
    })
  );
  assert!(!container.has::<dyn Greeter>());
}

#[test]
fn test_map_type_rejects_abstract_subtype_eagerly() {
  trait Animal: Send + Sync {
    fn sound(&self) -> &'static str;
  }
  trait Pet: Send + Sync {
    fn into_animal(self: Arc<Self>) -> Arc<dyn Animal>;
  }
  struct Dog;
  impl Animal for Dog {
    fn sound(&self) -> &'static str {
      "woof"
    }
  }
  impl Pet for Dog {
    fn into_animal(self: Arc<Self>) -> Arc<dyn Animal> {
      self
    }
  }

  let (catalog, container) = setup();
  catalog.register(Descriptor::<dyn Pet>::new().implements::<dyn Animal>(|pet| pet.into_animal()));
  catalog.register(
    Descriptor::<Dog>::new()
      .implements::<dyn Pet>(|dog| dog)
      .constructor(|_| Ok(Dog)),
  );

  assert_eq!(
    container.map_type::<dyn Animal, dyn Pet>(),
    Err(ContainerError::TypeNotInstantiable(TypeKey::of::<dyn Pet>()))
  );

  // Once the abstract subtype is itself mapped to something that is also an
  // `Animal`, the same call is accepted and the chain is followed to its end.
  container.map_type::<dyn Pet, Dog>().unwrap();
  container.map_type::<dyn Animal, dyn Pet>().unwrap();
  assert_eq!(container.get::<dyn Animal>().unwrap().sound(), "woof");
}

#[test]
fn test_map_type_follows_a_chain_of_supertypes() {
  trait Animal: Send + Sync {
    fn sound(&self) -> &'static str;
  }
  trait Pet: Send + Sync {
    fn into_animal(self: Arc<Self>) -> Arc<dyn Animal>;
  }
  struct Dog;
  impl Animal for Dog {
    fn sound(&self) -> &'static str {
      "woof"
    }
  }
  impl Pet for Dog {
    fn into_animal(self: Arc<Self>) -> Arc<dyn Animal> {
      self
    }
  }

  let (catalog, container) = setup();
  catalog.register(Descriptor::<dyn Pet>::new().implements::<dyn Animal>(|pet| pet.into_animal()));
  // `Dog` only declares `Pet`; it reaches `Animal` through `Pet`.
  catalog.register(
    Descriptor::<Dog>::new()
      .implements::<dyn Pet>(|dog| dog)
      .constructor(|_| Ok(Dog)),
  );

  container.map_type::<dyn Animal, Dog>().unwrap();
  assert_eq!(container.get::<dyn Animal>().unwrap().sound(), "woof");

  let other = Container::with_source(catalog.clone());
  let dog = Arc::new(Dog);
  other.map_instance_as::<dyn Animal, _>(dog.clone()).unwrap();
  let animal = other.get::<dyn Animal>().unwrap();
  assert_eq!(animal.sound(), "woof");
  assert!(std::ptr::eq(
    Arc::as_ptr(&animal) as *const u8,
    Arc::as_ptr(&dog) as *const u8
  ));

  // The chain only runs upward.
  assert_eq!(
    other.map_type::<Dog, dyn Animal>(),
    Err(ContainerError::NotASubtype {
      ty: TypeKey::of::<Dog>(),
      subtype: TypeKey::of::<dyn Animal>(),
    })
  );
}

#[test]
fn test_map_instance_as_checks_is_a() {
  let (_catalog, container) = setup();

  assert_eq!(
    container.map_instance_as::<dyn Greeter, _>(Arc::new(Unrelated)),
    Err(ContainerError::NotAnInstanceOfType {
      ty: TypeKey::of::<dyn Greeter>(),
      instance: TypeKey::of::<Unrelated>(),
    })
  );

  let english = Arc::new(EnglishGreeter);
  container
    .map_instance_as::<dyn Greeter, _>(english.clone())
    .unwrap();
  let greeter = container.get::<dyn Greeter>().unwrap();
  assert_eq!(greeter.greet(), "Hello!");
  assert!(std::ptr::eq(
    Arc::as_ptr(&greeter) as *const u8,
    Arc::as_ptr(&english) as *const u8
  ));
}

#[test]
fn test_unknown_and_abstract_types_fail() {
  let (_catalog, container) = setup();

  assert_eq!(
    container.get::<Unrelated>().err(),
    Some(ContainerError::TypeNotRegistered(TypeKey::of::<Unrelated>()))
  );
  assert_eq!(
    container.get::<dyn Greeter>().err(),
    Some(ContainerError::TypeNotInstantiable(TypeKey::of::<dyn Greeter>()))
  );
  assert_eq!(
    container.create::<dyn Greeter>().err(),
    Some(ContainerError::TypeNotInstantiable(TypeKey::of::<dyn Greeter>()))
  );
  assert!(!container.has::<Unrelated>());
}

#[test]
fn test_remove_forgets_mapping_and_singleton() {
  let (_catalog, container) = setup();
  container
    .map_instance(Arc::new(SimpleService { id: 1 }))
    .unwrap();
  assert!(container.has::<SimpleService>());

  container.remove::<SimpleService>();

  assert!(!container.has::<SimpleService>());
  // Falls back to automatic construction.
  assert_eq!(container.get::<SimpleService>().unwrap().id, 7);
}

#[test]
fn test_container_injects_itself() {
  struct NeedsContainer {
    container: Arc<Container>,
    resolver: Arc<dyn Resolve>,
  }

  let (catalog, container) = setup();
  catalog.register(
    Descriptor::<NeedsContainer>::new()
      .depends_on::<Container>()
      .depends_on::<dyn Resolve>()
      .constructor(|args| {
        Ok(NeedsContainer {
          container: args.take()?,
          resolver: args.take()?,
        })
      }),
  );

  assert!(container.has::<Container>());
  assert!(container.has::<dyn Resolve>());

  let service = container.get::<NeedsContainer>().unwrap();
  assert!(service.container.ptr_eq(&container));
  assert_eq!(service.resolver.resolve::<SimpleService>().unwrap().id, 7);
  assert!(service.resolver.contains::<SimpleService>());
}

#[test]
fn test_self_mapping_hands_out_one_handle() {
  struct NeedsContainer {
    container: Arc<Container>,
  }

  let (catalog, container) = setup();
  catalog.register(
    Descriptor::<NeedsContainer>::new()
      .depends_on::<Container>()
      .constructor(|args| Ok(NeedsContainer { container: args.take()? })),
  );

  let first = container.get::<Container>().unwrap();
  let second = container.get::<Container>().unwrap();
  assert!(Arc::ptr_eq(&first, &second));

  let resolver = container.get::<dyn Resolve>().unwrap();
  assert!(std::ptr::eq(
    Arc::as_ptr(&resolver) as *const u8,
    Arc::as_ptr(&first) as *const u8
  ));

  // Injected into a cached service, it is the same handle the caller sees.
  let service = container.get::<NeedsContainer>().unwrap();
  assert!(Arc::ptr_eq(&service.container, &first));
}

#[test]
fn test_bootstrap_mapping_cannot_be_replaced_or_removed() {
  let (_catalog, container) = setup();

  assert_eq!(
    container.map_instance(Arc::new(Container::new())),
    Err(ContainerError::MappingAlreadyExists(TypeKey::of::<Container>()))
  );

  container.remove::<Container>();
  assert!(container.get::<Container>().unwrap().ptr_eq(&container));
  assert!(container.registered_types().contains(&TypeKey::of::<Container>()));
}

#[test]
fn test_error_messages_name_the_types() {
  let err = ContainerError::NotASubtype {
    ty: TypeKey::of::<dyn Greeter>(),
    subtype: TypeKey::of::<Unrelated>(),
  };
  let message = err.to_string();
  assert!(message.contains("Unrelated"));
  assert!(message.contains("Greeter"));
}
