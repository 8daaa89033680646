use crate::{
    container::OnceSlot, DecoratorArg, InjectError, InjectResult, MemberKind,
    Scopable, Service, Svc,
};
use std::fmt::{self, Debug, Formatter};

/// Resolves the service behind a decorated member, given the object the
/// member belongs to and the member's name. Implemented for every matching
/// closure.
pub trait ServiceResolver<T>: Service {
    /// Resolves the service for `receiver`.
    fn resolve(
        &self,
        receiver: &dyn Scopable,
        name: &str,
    ) -> InjectResult<Svc<T>>;
}

impl<T, F> ServiceResolver<T> for F
where
    T: Service,
    F: Fn(&dyn Scopable, &str) -> InjectResult<Svc<T>> + Service,
{
    fn resolve(
        &self,
        receiver: &dyn Scopable,
        name: &str,
    ) -> InjectResult<Svc<T>> {
        self(receiver, name)
    }
}

/// A field or auto-accessor a service decorator was successfully applied to.
pub struct ServiceMember<T> {
    kind: MemberKind,
    name: String,
    resolver: Svc<dyn ServiceResolver<T>>,
}

impl<T: Service> ServiceMember<T> {
    pub(crate) fn new(
        kind: MemberKind,
        name: String,
        resolver: Svc<dyn ServiceResolver<T>>,
    ) -> Self {
        ServiceMember {
            kind,
            name,
            resolver,
        }
    }

    /// Gets the kind of member, either [`MemberKind::Field`] or
    /// [`MemberKind::Accessor`].
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Gets the name of the decorated member.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates the slot of this member for a new receiver. `initial_value` is
    /// the value the member was declared with; service members cannot have
    /// one, so anything but [`DecoratorArg::Undefined`] fails.
    pub fn init(
        &self,
        initial_value: &DecoratorArg,
    ) -> InjectResult<LazyService<T>> {
        if *initial_value != DecoratorArg::Undefined {
            let (article, construct) = match self.kind {
                MemberKind::Accessor => {
                    ("an", "accessor field with an initializer")
                }
                _ => ("a", "field with an initializer"),
            };

            return Err(InjectError::InvalidDecoratorUsage {
                construct: construct.to_owned(),
                message: format!(
                    concat!(
                        "The @service decorator cannot be used on {} {}.\n",
                        "\n",
                        "  class MyClass {{\n",
                        "    @service(...) {} = ...;\n",
                        "  }}\n",
                        "\n",
                        "Please remove the initializer from this field."
                    ),
                    article,
                    construct,
                    self.declaration()
                ),
            });
        }

        Ok(LazyService {
            kind: self.kind,
            name: self.name.clone(),
            resolver: self.resolver.clone(),
            value: OnceSlot::new(),
        })
    }

    fn declaration(&self) -> String {
        match self.kind {
            MemberKind::Accessor => format!("accessor {}", self.name),
            _ => self.name.clone(),
        }
    }
}

impl<T> Debug for ServiceMember<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMember")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// The per-receiver slot of a service member. The service is resolved on
/// the first read and kept for as long as the slot lives; the slot cannot be
/// written to.
pub struct LazyService<T> {
    kind: MemberKind,
    name: String,
    resolver: Svc<dyn ServiceResolver<T>>,
    value: OnceSlot<Svc<T>>,
}

impl<T: Service> LazyService<T> {
    /// Reads the member, resolving the service for `receiver` if this is the
    /// first read.
    pub fn get<R: Scopable>(&self, receiver: &R) -> InjectResult<Svc<T>> {
        self.value
            .get_or_try_init(|| self.resolver.resolve(receiver, &self.name))
            .map(Svc::clone)
    }

    /// Whether the service was already resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// Writing to a service member always fails with
    /// [`InjectError::ReadOnlyService`].
    pub fn set(&self, _value: Svc<T>) -> InjectResult<()> {
        Err(InjectError::ReadOnlyService {
            name: self.name.clone(),
        })
    }
}

impl<T> Debug for LazyService<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyService")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("resolved", &self.value.get().is_some())
            .finish()
    }
}
