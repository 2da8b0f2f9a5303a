use fibre_di::{Catalog, Container, Descriptor};
use std::sync::Arc;

struct DataSource(String);

struct Processor {
  source: Arc<DataSource>,
}

impl Processor {
  fn run(&self) -> String {
    format!("Processed: {}", self.source.0.to_uppercase())
  }
}

fn main() {
  let catalog = Arc::new(Catalog::new());
  catalog.register(
    Descriptor::<Processor>::new()
      .depends_on::<DataSource>()
      .constructor(|args| Ok(Processor { source: args.take()? })),
  );

  // --- Shared configuration lives on the root ---
  let root = Container::with_source(catalog);
  root
    .map_instance(Arc::new(DataSource("shared data".to_string())))
    .unwrap();

  // --- Each subsystem gets its own child ---
  let reporting = root.new_child();
  let testing = root.new_child();
  testing
    .map_instance(Arc::new(DataSource("test data".to_string())))
    .unwrap();

  let from_reporting = reporting.get::<Processor>().unwrap().run();
  let from_testing = testing.get::<Processor>().unwrap().run();
  println!("reporting: {}", from_reporting);
  println!("testing:   {}", from_testing);
  assert_eq!(from_reporting, "Processed: SHARED DATA");
  assert_eq!(from_testing, "Processed: TEST DATA");

  // `has` sees into children, `get` does not.
  assert!(root.has::<Processor>());

  // --- Resetting the root clears every subsystem ---
  root.reset();
  assert!(!root.has::<Processor>());
  assert!(reporting.get::<Processor>().is_err());
  println!("\nReset cleared the whole hierarchy.");
}
