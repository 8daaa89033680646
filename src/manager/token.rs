use crate::{
    container::{next_id, Lock, MapContainerEx},
    DynSvc, InjectResult, Scope, Service, Svc,
};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// Placeholder used when no readable name can be derived for a factory.
pub(crate) const UNKNOWN_SERVICE: &str = "(unknown service)";

/// The type-erased "instantiate" capability attached to a token by
/// [`set_service_manager`](crate::set_service_manager).
pub(crate) trait Instantiate: Service {
    fn instantiate(
        &self,
        scope: &Scope,
        definition: &DynSvc,
    ) -> InjectResult<DynSvc>;
}

#[derive(Clone)]
pub(crate) struct Capability {
    pub(crate) kind: u64,
    pub(crate) kind_label: &'static str,
    pub(crate) instantiate: Svc<dyn Instantiate>,
}

/// The identity of a service factory. Identifiers are never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FactoryId(u64);

impl Display for FactoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "factory-{}", self.0)
    }
}

struct TokenInner {
    id: FactoryId,
    label: Option<Cow<'static, str>>,
    type_name: &'static str,
    definition: DynSvc,
    capability: Lock<Option<Capability>>,
    provider: Lock<Option<FactoryToken>>,
}

/// An untyped handle to a definition, and the key every per-scope cache uses
/// for it. Two tokens are the same factory only if one is a clone of the
/// other, no matter what their definitions contain.
#[derive(Clone)]
pub struct FactoryToken {
    inner: Svc<TokenInner>,
}

impl FactoryToken {
    fn new<D: Service>(
        value: Svc<D>,
        label: Option<Cow<'static, str>>,
    ) -> Self {
        FactoryToken {
            inner: Svc::new(TokenInner {
                id: FactoryId(next_id()),
                label,
                type_name: std::any::type_name::<D>(),
                definition: value as DynSvc,
                capability: Lock::new(None),
                provider: Lock::new(None),
            }),
        }
    }

    /// Gets the identity of this factory.
    #[must_use]
    pub fn id(&self) -> FactoryId {
        self.inner.id
    }

    /// Gets a human-readable name for this factory: its explicit label if it
    /// has one, otherwise the type name of its definition.
    #[must_use]
    pub fn label(&self) -> String {
        let label = match &self.inner.label {
            Some(label) => label.as_ref(),
            None => self.inner.type_name,
        };

        if label.trim().is_empty() {
            UNKNOWN_SERVICE.to_owned()
        } else {
            label.to_owned()
        }
    }

    /// Whether a service manager has been attached to this token.
    #[must_use]
    pub fn is_tagged(&self) -> bool {
        self.inner.capability.with_inner(Option::is_some)
    }

    /// Gets the label of the manager kind attached to this token, if any.
    #[must_use]
    pub fn manager_label(&self) -> Option<&'static str> {
        self.inner
            .capability
            .with_inner(|capability| capability.as_ref().map(|c| c.kind_label))
    }

    pub(crate) fn definition(&self) -> &DynSvc {
        &self.inner.definition
    }

    pub(crate) fn capability(&self) -> Option<Capability> {
        self.inner.capability.with_inner(Option::clone)
    }

    /// Attaches a capability. Returns the kind it replaced, if the token was
    /// already tagged by a different manager kind. Tagging again with the
    /// same kind keeps the original capability.
    pub(crate) fn tag<F>(
        &self,
        kind: u64,
        capability: F,
    ) -> Option<&'static str>
    where
        F: FnOnce() -> Capability,
    {
        self.inner.capability.with_inner_mut(|current| {
            if current.as_ref().map_or(false, |existing| existing.kind == kind)
            {
                return None;
            }

            current.replace(capability()).map(|old| old.kind_label)
        })
    }

    /// Gets the default replacement registered for this factory.
    pub(crate) fn provider(&self) -> Option<FactoryToken> {
        self.inner.provider.with_inner(Option::clone)
    }

    /// Registers a default replacement, returning the previous one. The
    /// replacement lives exactly as long as this token. Providing a factory
    /// with itself clears the registration.
    pub(crate) fn set_provider(
        &self,
        provider: &FactoryToken,
    ) -> Option<FactoryToken> {
        let provider = Some(provider.clone()).filter(|p| p != self);
        self.inner
            .provider
            .with_inner_mut(|current| std::mem::replace(current, provider))
    }
}

impl PartialEq for FactoryToken {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for FactoryToken {}

impl Hash for FactoryToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Debug for FactoryToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryToken")
            .field("id", &self.id())
            .field("label", &self.label())
            .field("manager", &self.manager_label())
            .finish()
    }
}

/// A definition value together with the token that identifies it. A
/// definition becomes a service factory once a service manager is attached
/// to it with [`set_service_manager`](crate::set_service_manager).
pub struct Definition<D> {
    token: FactoryToken,
    value: Svc<D>,
}

impl<D: Service> Definition<D> {
    /// Creates a new definition. Its label is the name of `D`.
    #[must_use]
    pub fn new(value: D) -> Self {
        Definition::from_svc(Svc::new(value), None)
    }

    /// Creates a new definition with an explicit label, used in error
    /// messages and logs.
    #[must_use]
    pub fn with_label<L>(label: L, value: D) -> Self
    where
        L: Into<Cow<'static, str>>,
    {
        Definition::from_svc(Svc::new(value), Some(label.into()))
    }

    pub(crate) fn from_svc(
        value: Svc<D>,
        label: Option<Cow<'static, str>>,
    ) -> Self {
        Definition {
            token: FactoryToken::new(value.clone(), label),
            value,
        }
    }

    /// Gets the definition value.
    #[must_use]
    pub fn value(&self) -> &Svc<D> {
        &self.value
    }

    /// Gets the token identifying this definition.
    #[must_use]
    pub fn token(&self) -> &FactoryToken {
        &self.token
    }
}

impl<D> Clone for Definition<D> {
    fn clone(&self) -> Self {
        Definition {
            token: self.token.clone(),
            value: self.value.clone(),
        }
    }
}

impl<D> Debug for Definition<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Definition").field(&self.token).finish()
    }
}

/// A typed view of a [`FactoryToken`] whose service manager produces
/// services of type `T`.
///
/// Service factories are normally created by
/// [`set_service_manager`](crate::set_service_manager) or one of the
/// adapters built on it ([`factory`](crate::factory),
/// [`singleton`](crate::singleton),
/// [`service_class`](crate::service_class)).
pub struct ServiceFactory<T: ?Sized> {
    token: FactoryToken,
    marker: PhantomData<fn() -> Svc<T>>,
}

impl<T: ?Sized> ServiceFactory<T> {
    /// Views a token as a factory of `T` without checking that it is one.
    /// Resolving the factory fails with
    /// [`InjectError::InvalidFactory`](crate::InjectError::InvalidFactory)
    /// if no service manager was ever attached to the token, and with
    /// [`InjectError::InvalidService`](crate::InjectError::InvalidService)
    /// if its manager produces something other than `T`.
    #[must_use]
    pub fn from_token(token: FactoryToken) -> Self {
        ServiceFactory {
            token,
            marker: PhantomData,
        }
    }

    /// Gets the token identifying this factory.
    #[must_use]
    pub fn token(&self) -> &FactoryToken {
        &self.token
    }

    /// Gets the identity of this factory.
    #[must_use]
    pub fn id(&self) -> FactoryId {
        self.token.id()
    }

    /// Gets a human-readable name for this factory.
    #[must_use]
    pub fn label(&self) -> String {
        self.token.label()
    }
}

impl<T: ?Sized> Clone for ServiceFactory<T> {
    fn clone(&self) -> Self {
        ServiceFactory::from_token(self.token.clone())
    }
}

impl<T: ?Sized> PartialEq for ServiceFactory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl<T: ?Sized> Eq for ServiceFactory<T> {}

impl<T: ?Sized> Debug for ServiceFactory<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceFactory").field(&self.token).finish()
    }
}

/// Anything that may hold a [`FactoryToken`]. This is what
/// [`is_service_factory`](crate::is_service_factory) inspects.
pub trait AsFactoryToken {
    /// Gets the token, if this value has one.
    fn factory_token(&self) -> Option<&FactoryToken>;
}

impl AsFactoryToken for FactoryToken {
    fn factory_token(&self) -> Option<&FactoryToken> {
        Some(self)
    }
}

impl<D> AsFactoryToken for Definition<D> {
    fn factory_token(&self) -> Option<&FactoryToken> {
        Some(&self.token)
    }
}

impl<T: ?Sized> AsFactoryToken for ServiceFactory<T> {
    fn factory_token(&self) -> Option<&FactoryToken> {
        Some(&self.token)
    }
}

impl<F: AsFactoryToken> AsFactoryToken for Option<F> {
    fn factory_token(&self) -> Option<&FactoryToken> {
        self.as_ref().and_then(AsFactoryToken::factory_token)
    }
}

impl<F: ?Sized + AsFactoryToken> AsFactoryToken for &F {
    fn factory_token(&self) -> Option<&FactoryToken> {
        (**self).factory_token()
    }
}
