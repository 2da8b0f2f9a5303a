//! Public macros for ergonomic resolution from the default container.

/// Resolves a service from the [`global`](crate::global) container.
///
/// # Panics
///
/// Panics if the service cannot be resolved, with the underlying
/// [`ContainerError`](crate::ContainerError) in the message. For a non-panicking
/// version, use `global().get::<T>()` directly.
///
/// # Examples
///
/// ```
/// use fibre_di::{global, resolve};
///
/// struct Banner(String);
/// global().map_factory(|| Banner(String::from("hello"))).unwrap();
///
/// let banner = resolve!(Banner);
/// assert_eq!(banner.0, "hello");
/// ```
///
/// ```
/// use fibre_di::{global, resolve};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// global().map_factory_trait::<dyn Greeter>(|| Arc::new(EnglishGreeter)).unwrap();
///
/// let greeter = resolve!(trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // Trait objects first: `trait Foo` is not a type, so it would never reach the `ty` arm.
    (trait $trait_ident:ident) => {
        $crate::global()
            .get::<dyn $trait_ident>()
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required trait service {}: {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    err
                )
            })
    };

    ($type:ty) => {
        $crate::global()
            .get::<$type>()
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required service {}: {}",
                    std::any::type_name::<$type>(),
                    err
                )
            })
    };
}
