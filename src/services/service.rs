use derive_more::Display;
use std::{
    any::{Any, TypeId},
    error::Error,
};

#[cfg(feature = "arc")]
mod types {
    use std::{
        any::Any,
        sync::{Arc, Weak},
    };

    /// A reference-counted pointer holding a service. The pointer type is
    /// determined by the feature flags passed to this crate.
    pub type Svc<T> = Arc<T>;

    /// A weak counterpart of [`Svc<T>`].
    pub type WeakSvc<T> = Weak<T>;

    /// A reference-counted service pointer holding an instance of `dyn Any`.
    pub type DynSvc = Arc<dyn Any + Send + Sync>;

    /// Implemented automatically on types that are capable of being a service.
    pub trait Service: Any + Send + Sync {}
    impl<T: ?Sized + Any + Send + Sync> Service for T {}

    /// An error raised by a fallible service factory.
    pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
}

#[cfg(feature = "rc")]
mod types {
    use std::{
        any::Any,
        rc::{Rc, Weak},
    };

    /// A reference-counted pointer holding a service. The pointer type is
    /// determined by the feature flags passed to this crate.
    pub type Svc<T> = Rc<T>;

    /// A weak counterpart of [`Svc<T>`].
    pub type WeakSvc<T> = Weak<T>;

    /// A reference-counted service pointer holding an instance of `dyn Any`.
    pub type DynSvc = Rc<dyn Any>;

    /// Implemented automatically on types that are capable of being a service.
    pub trait Service: Any {}
    impl<T: ?Sized + Any> Service for T {}

    /// An error raised by a fallible service factory.
    pub type DynError = Box<dyn std::error::Error + 'static>;
}

pub use types::*;

/// A result from attempting to resolve a service in a scope.
pub type InjectResult<T> = Result<T, InjectError>;

/// Type information about a service.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ServiceInfo {
    id: TypeId,
    name: &'static str,
}

impl ServiceInfo {
    /// Creates a [`ServiceInfo`] for the given type.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Gets the [`TypeId`] for this service.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the type name of this service.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Which argument of a call was expected to be a service factory.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum FactoryArgument {
    /// The factory being looked up or overridden.
    #[display(fmt = "factory")]
    Factory,

    /// The replacement passed to an override, or the provider passed to
    /// [`provide`](crate::provide).
    #[display(fmt = "replacement")]
    Replacement,
}

/// An error that has occurred while resolving a service.
#[derive(Debug, Display)]
#[non_exhaustive]
pub enum InjectError {
    /// A value expected to be a service factory has no service manager.
    #[display(
        fmt = "the {} passed in ({}) is not a valid service factory (did you forget to call `set_service_manager()`?)",
        argument,
        label
    )]
    InvalidFactory {
        /// Which argument was invalid.
        argument: FactoryArgument,
        /// Best-effort name of the offending value.
        label: String,
    },

    /// An override was installed after the factory was already resolved.
    #[display(
        fmt = "cannot override {} after it has already been instantiated",
        label
    )]
    OverrideTooLate {
        /// Best-effort name of the factory.
        label: String,
    },

    /// `set_scope()` was called twice on the same object.
    #[display(
        fmt = "`set_scope()` has already been called on this object previously"
    )]
    AlreadyScoped,

    /// The object has no slot a scope can be attached to.
    #[display(fmt = "this object cannot hold a scope")]
    Unscopable,

    /// The object has neither an attached scope nor an owner.
    #[display(
        fmt = "the object does not have a valid scope (did you forget to call `set_scope()`?)"
    )]
    MissingScope,

    /// The scope was disposed and can no longer resolve services.
    #[display(fmt = "{} has been disposed", scope)]
    ScopeDisposed {
        /// Display name of the disposed scope.
        scope: String,
    },

    /// A service decorator was applied to something other than an instance
    /// field or auto-accessor.
    #[display(fmt = "{}", message)]
    InvalidDecoratorUsage {
        /// The kind of construct the decorator was applied to.
        construct: String,
        /// A description of the misuse.
        message: String,
    },

    /// A service field was written to.
    #[display(
        fmt = "the `{}` field is readonly; a field resolved by the @service decorator cannot be set",
        name
    )]
    ReadOnlyService {
        /// The field name.
        name: String,
    },

    /// The manager of a factory produced a service of a different type than
    /// the one requested.
    #[display(
        fmt = "the service manager for {} did not produce a {}",
        label,
        "service_info.name()"
    )]
    InvalidService {
        /// Best-effort name of the factory.
        label: String,
        /// The type that was requested.
        service_info: ServiceInfo,
    },

    /// A fallible service factory returned an error.
    #[display(fmt = "an error occurred during activation of {}", label)]
    ActivationFailed {
        /// Best-effort name of the factory.
        label: String,
        /// The error returned by the factory.
        inner: DynError,
    },

    /// An unexpected error has occurred. This is usually caused by a bug in
    /// the library itself.
    #[display(fmt = "an unexpected error occurred (please report this): {}", _0)]
    InternalError(String),
}

impl Error for InjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InjectError::ActivationFailed { inner, .. } => Some(inner.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FactoryArgument, InjectError};
    use std::{error::Error, fmt};

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl Error for Boom {}

    #[test]
    fn invalid_factory_names_argument_and_label() {
        let error = InjectError::InvalidFactory {
            argument: FactoryArgument::Replacement,
            label: "Clock".to_owned(),
        };

        let message = error.to_string();
        assert!(message.starts_with("the replacement passed in (Clock)"));
    }

    #[test]
    fn activation_failure_exposes_source() {
        let error = InjectError::ActivationFailed {
            label: "Foo".to_owned(),
            inner: Box::new(Boom),
        };

        assert_eq!("boom", error.source().unwrap().to_string());
        assert!(InjectError::AlreadyScoped.source().is_none());
    }
}
