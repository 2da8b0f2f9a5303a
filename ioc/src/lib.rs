//! # Fibre DI
//!
//! A thread-safe, hierarchical dependency injection container for Rust.
//!
//! Types are mapped to instances, factories, or subtypes, and anything left unmapped is
//! built automatically from a [`Descriptor`] that lists its constructor parameters.
//! Every resolved instance is a singleton within the container that produced it.
//!
//! ## Core Concepts
//!
//! - **Container**: a registry of mappings plus a singleton cache. Containers form a
//!   tree: `get` falls back to the parent chain, `has` also looks into children, and
//!   `remove`/`reset` cascade downward.
//! - **Descriptors**: Rust has no runtime reflection, so constructors and supertypes
//!   are declared in a [`Catalog`] (or any other [`DescriptorSource`]).
//! - **Cycle detection**: a type that depends on itself, directly or through a chain,
//!   fails with [`ContainerError::CircularDependency`] naming the whole chain.
//! - **Default container**: a lazily created, process-wide instance from [`global()`].
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{Catalog, Container, Descriptor};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Message(String);
//!
//! struct EnglishGreeter {
//!     message: Arc<Message>,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         self.message.0.clone()
//!     }
//! }
//!
//! let catalog = Arc::new(Catalog::new());
//! catalog.register(
//!     Descriptor::<EnglishGreeter>::new()
//!         .depends_on::<Message>()
//!         .implements::<dyn Greeter>(|greeter| greeter)
//!         .constructor(|args| Ok(EnglishGreeter { message: args.take()? })),
//! );
//!
//! let container = Container::with_source(catalog);
//! container.map_instance(Arc::new(Message(String::from("Hello, World!")))).unwrap();
//! container.map_type::<dyn Greeter, EnglishGreeter>().unwrap();
//!
//! let greeter = container.get::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "Hello, World!");
//!
//! // A child sees the parent's mappings but can override them locally.
//! let child = container.new_child();
//! assert!(Arc::ptr_eq(&child.get::<dyn Greeter>().unwrap(), &greeter));
//! ```

mod container;
mod core;
mod descriptor;
mod error;
mod global;
mod macros;
mod mapper;
mod registry;
mod resolver;

pub use crate::core::{Instance, TypeKey};
pub use container::{Container, Resolve};
pub use descriptor::{
  is_subtype, upcast_path, Arguments, Catalog, Descriptor, DescriptorSource, Injectable,
  TypeDescriptor, Upcast,
};
pub use error::{ContainerError, Result};
pub use global::{catalog, global};
