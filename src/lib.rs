//! Scope-keyed service locator.
//!
//! A [`Scope`] is an opaque lifetime boundary, usually one application or one
//! request. A [`ServiceFactory`] describes how to create a service. Looking up
//! a factory in a scope creates the service the first time and returns that
//! same instance on every later lookup in that scope:
//!
//! ```
//! use polaris_service::{factory, lookup, Scope, Svc};
//!
//! struct Counter(u32);
//!
//! let counter = factory(|_: &Scope| Counter(0));
//!
//! let app = Scope::new();
//! let first = lookup(&app, &counter).unwrap();
//! assert!(Svc::ptr_eq(&first, &lookup(&app, &counter).unwrap()));
//!
//! let other = Scope::new();
//! assert!(!Svc::ptr_eq(&first, &lookup(&other, &counter).unwrap()));
//! ```
//!
//! By default, services are not thread-safe. This is because `Rc<T>` is used
//! to hold instances of the services, which is not a thread-safe pointer
//! type. This can be changed by disabling default features and enabling the
//! "arc" feature:
//!
//! ```text
//! polaris_service = {
//!     version = "*",
//!     default_features = false,
//!     features = ["arc"]
//! }
//! ```
//!
//! # Factories and managers
//!
//! A factory is a [`Definition`] with a [`ServiceManager`] attached to it
//! through [`set_service_manager`]. The manager turns the definition into a
//! service; one manager of each [`ManagerKind`] exists per scope. The
//! built-in adapters cover the usual cases:
//!
//! - [`factory`]: calls a function with the scope.
//! - [`try_factory`]: calls a function that may fail.
//! - [`singleton`]: hands out one existing instance in every scope.
//! - [`service_class`]: constructs a [`ServiceClass`] from the scope.
//!
//! # Test doubles
//!
//! [`override_service`] swaps a factory for another one within a single
//! scope, as long as the factory has not been resolved there yet.
//! [`provide`] registers a replacement for every scope.
//!
//! ```
//! use polaris_service::{
//!     factory, lookup, override_service, InjectError, Scope,
//! };
//!
//! let random = factory(|scope: &Scope| scope.id() * 7919 % 1000);
//! let fixed = factory(|_: &Scope| 4);
//!
//! let scope = Scope::new();
//! override_service(&scope, &random, &fixed).unwrap();
//! assert_eq!(4, *lookup(&scope, &random).unwrap());
//!
//! match override_service(&scope, &random, &fixed) {
//!     Err(InjectError::OverrideTooLate { .. }) => {}
//!     Err(error) => Err(error).unwrap(),
//!     Ok(()) => unreachable!("the service was already resolved"),
//! }
//! ```
//!
//! # Objects with a scope
//!
//! Objects carry a scope either through an embedded [`ScopeSlot`] filled by
//! [`set_scope`], or through their owner (see [`Scopable`]). [`service`]
//! looks a factory up in the scope of an object, and [`service_decorator`]
//! builds lazily resolved, read-only service members on top of it.

#![forbid(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value
)]

#[cfg(not(any(feature = "arc", feature = "rc")))]
compile_error!(
    "Either the 'arc' or 'rc' feature must be enabled (but not both)."
);

#[cfg(all(feature = "arc", feature = "rc"))]
compile_error!(
    "The 'arc' and 'rc' features are mutually exclusive and cannot be enabled together."
);

mod container;
mod decorator;
mod manager;
mod primitives;
mod scope;
mod services;

pub use decorator::*;
pub use manager::*;
pub use primitives::*;
pub use scope::*;
pub use services::*;
