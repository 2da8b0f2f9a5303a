use fibre_di::{global, resolve};
use std::panic;

struct UnregisteredService;

fn main() {
  // --- Using the panicking `resolve!` macro ---
  println!("Attempting to resolve a service that was never registered...");

  let result = panic::catch_unwind(|| {
    let _service = resolve!(UnregisteredService);
  });

  assert!(result.is_err(), "resolve! should have panicked.");
  println!("Successfully caught the expected panic from resolve!.");

  // --- Using the fallible `get()` method ---
  println!("\nNow, attempting to resolve using `get()`...");

  match global().get::<UnregisteredService>() {
    Ok(_) => panic!("Should not have found the service!"),
    Err(err) => println!("Correctly received an error: {}", err),
  }
}
