//! Process-wide state: the default container and the default descriptor catalog.

use crate::container::Container;
use crate::descriptor::Catalog;
use once_cell::sync::{Lazy, OnceCell};
use std::sync::Arc;

// Created on first access, exactly once, even if many threads race for it.
static DEFAULT_CONTAINER: OnceCell<Container> = OnceCell::new();

static CATALOG: Lazy<Arc<Catalog>> = Lazy::new(|| Arc::new(Catalog::new()));

/// Returns the process-wide default container, creating it on first use.
///
/// The default container can have children, but can never be added as a child of
/// another container. Tests that must not share state should build their own
/// [`Container`] instead.
///
/// # Examples
///
/// ```
/// use fibre_di::global;
/// use std::sync::Arc;
///
/// struct Motd(&'static str);
///
/// global().map_instance(Arc::new(Motd("Hello from global!"))).unwrap();
/// assert_eq!(global().get::<Motd>().unwrap().0, "Hello from global!");
/// ```
pub fn global() -> &'static Container {
  DEFAULT_CONTAINER.get_or_init(Container::new)
}

pub(crate) fn default_if_initialized() -> Option<&'static Container> {
  DEFAULT_CONTAINER.get()
}

/// The descriptor catalog used by containers made with [`Container::new`].
pub fn catalog() -> &'static Arc<Catalog> {
  &CATALOG
}
