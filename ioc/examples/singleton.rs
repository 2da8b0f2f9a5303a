use fibre_di::{catalog, global, resolve, Descriptor};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// A simple service that gets a unique ID upon creation.
struct RequestTracker {
  id: usize,
}

static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn main() {
  // Describe how to build a RequestTracker; nothing is mapped.
  catalog().register(Descriptor::<RequestTracker>::new().constructor(|_| {
    println!("Building RequestTracker...");
    Ok(RequestTracker {
      id: ID_COUNTER.fetch_add(1, Ordering::SeqCst),
    })
  }));

  println!("--- Resolving with get ---");
  let s1 = resolve!(RequestTracker);
  let s2 = resolve!(RequestTracker);
  println!("Shared 1 ID: {}, Shared 2 ID: {}", s1.id, s2.id);
  assert!(Arc::ptr_eq(&s1, &s2), "get should return the same instance");
  println!("get returned the same pointer twice, as expected.\n");

  println!("--- Building with create ---");
  let t1 = global().create::<RequestTracker>().unwrap();
  let t2 = global().create::<RequestTracker>().unwrap();
  println!("Fresh 1 ID: {}, Fresh 2 ID: {}", t1.id, t2.id);
  assert_eq!(t1.id, 1);
  assert_eq!(t2.id, 2);
  assert!(!Arc::ptr_eq(&t1, &t2), "create should build a new instance");
  println!("create returned different pointers, as expected.");
}
