use fibre_di::{catalog, global, resolve, Descriptor};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define a concrete implementation
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

// 3. Define a service that depends on the abstraction
struct ReportService {
  logger: Arc<dyn Logger>,
}

impl ReportService {
  fn generate_report(&self) {
    self.logger.log("Starting report generation.");
    self.logger.log("Finished report generation.");
  }
}

fn main() {
  // --- Description ---
  catalog().register(
    Descriptor::<ConsoleLogger>::new()
      .implements::<dyn Logger>(|logger| logger)
      .constructor(|_| Ok(ConsoleLogger)),
  );
  catalog().register(
    Descriptor::<ReportService>::new()
      .depends_on::<dyn Logger>()
      .constructor(|args| Ok(ReportService { logger: args.take()? })),
  );

  // --- Mapping ---
  // Any request for `dyn Logger` is served by a ConsoleLogger.
  global().map_type::<dyn Logger, ConsoleLogger>().unwrap();

  // --- Resolution and Usage ---
  println!("Resolving the high-level service...");
  let report_service = resolve!(ReportService);

  println!("Using the service...");
  report_service.generate_report();
}
