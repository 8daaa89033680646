use crate::{
    set_service_manager, Definition, DynError, InjectError, InjectResult,
    ManagerKind, Scope, Service, ServiceFactory, ServiceManager, Svc,
    WeakScope,
};
use std::fmt::{self, Debug, Formatter};

/// Something that can create a `T` from the scope it is resolved in.
pub(crate) trait ScopeFn<T>: Service {
    fn call(&self, scope: &Scope) -> Result<T, DynError>;
}

struct Infallible<F>(F);

impl<T, F> ScopeFn<T> for Infallible<F>
where
    T: Service,
    F: Fn(&Scope) -> T + Service,
{
    fn call(&self, scope: &Scope) -> Result<T, DynError> {
        Ok((self.0)(scope))
    }
}

/// The definition behind a function-based service factory: a function which
/// receives the scope the service is resolved in.
pub struct FactoryFn<T> {
    label: &'static str,
    create: Box<dyn ScopeFn<T>>,
}

impl<T: Service> FactoryFn<T> {
    /// Wraps a function creating a service from its scope.
    #[must_use]
    pub fn new<F>(create: F) -> Self
    where
        F: Fn(&Scope) -> T + Service,
    {
        FactoryFn {
            label: std::any::type_name::<F>(),
            create: Box::new(Infallible(create)),
        }
    }

    pub(crate) fn from_scope_fn<F>(label: &'static str, create: F) -> Self
    where
        F: ScopeFn<T>,
    {
        FactoryFn {
            label,
            create: Box::new(create),
        }
    }

    /// Gets the name of the wrapped function.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> Debug for FactoryFn<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FactoryFn").field(&self.label).finish()
    }
}

/// The service manager shared by every function-based factory. It calls the
/// function with the scope it manages.
#[derive(Debug)]
pub struct FactoryServiceManager {
    scope: WeakScope,
}

impl<T: Service> ServiceManager<FactoryFn<T>> for FactoryServiceManager {
    type Output = T;

    fn create_service(
        &self,
        definition: &FactoryFn<T>,
    ) -> InjectResult<Svc<T>> {
        let scope = self.scope.upgrade().ok_or_else(|| {
            InjectError::InternalError(format!(
                "the scope managing {} no longer exists",
                definition.label
            ))
        })?;

        match definition.create.call(&scope) {
            Ok(service) => Ok(Svc::new(service)),
            Err(inner) => Err(InjectError::ActivationFailed {
                label: definition.label.to_owned(),
                inner,
            }),
        }
    }
}

fn factory_service_manager(scope: &Scope) -> FactoryServiceManager {
    FactoryServiceManager {
        scope: scope.downgrade(),
    }
}

/// The manager kind of every function-based factory.
pub static FACTORY_SERVICE_MANAGER: ManagerKind<FactoryServiceManager> =
    ManagerKind::new("factory", factory_service_manager);

/// Defines a conversion into a function-based [`ServiceFactory`]. Converting
/// something that already is a factory returns the same factory.
///
/// ```
/// use polaris_service::{factory, Definition, FactoryFn, IntoFactory, Scope};
///
/// let answer = factory(|_: &Scope| 42);
/// assert_eq!(answer, answer.clone().into_factory());
///
/// let definition = Definition::new(FactoryFn::new(|_: &Scope| 42));
/// let first = definition.clone().into_factory();
/// assert_eq!(first, definition.into_factory());
/// ```
pub trait IntoFactory<T: ?Sized> {
    /// Performs the conversion.
    #[must_use]
    fn into_factory(self) -> ServiceFactory<T>;
}

impl<T: ?Sized> IntoFactory<T> for ServiceFactory<T> {
    fn into_factory(self) -> ServiceFactory<T> {
        self
    }
}

impl<T: Service> IntoFactory<T> for Definition<FactoryFn<T>> {
    fn into_factory(self) -> ServiceFactory<T> {
        if self.token().is_tagged() {
            ServiceFactory::from_token(self.token().clone())
        } else {
            set_service_manager(&FACTORY_SERVICE_MANAGER, &self)
        }
    }
}

/// Creates a service factory from a function. The function is called at most
/// once per scope, with that scope, the first time the factory is looked up
/// there.
///
/// ```
/// use polaris_service::{factory, lookup, Scope, Svc};
///
/// struct Config {
///     retries: u32,
/// }
///
/// struct Client {
///     config: Svc<Config>,
/// }
///
/// let config = factory(|_: &Scope| Config { retries: 3 });
/// let client = factory(move |scope: &Scope| Client {
///     config: lookup(scope, &config).unwrap(),
/// });
///
/// let client = lookup(&Scope::new(), &client).unwrap();
/// assert_eq!(3, client.config.retries);
/// ```
#[must_use]
pub fn factory<T, F>(create: F) -> ServiceFactory<T>
where
    T: Service,
    F: Fn(&Scope) -> T + Service,
{
    Definition::with_label(std::any::type_name::<F>(), FactoryFn::new(create))
        .into_factory()
}

#[cfg(test)]
mod tests {
    use crate::{
        factory, lookup, set_service_manager, Definition, FactoryFn,
        IntoFactory, ManagerKind, Scope, ServiceManager,
        FACTORY_SERVICE_MANAGER,
    };

    #[test]
    fn factory_receives_its_scope() {
        let own_id = factory(|scope: &Scope| scope.id());
        let scope = Scope::new();

        assert_eq!(scope.id(), *lookup(&scope, &own_id).unwrap());
    }

    #[test]
    fn factory_is_tagged_with_the_factory_manager() {
        let answer = factory(|_: &Scope| 42);
        assert_eq!(
            Some(FACTORY_SERVICE_MANAGER.label()),
            answer.token().manager_label()
        );
    }

    #[test]
    fn into_factory_keeps_a_retagged_definition() {
        struct Doubled;

        impl ServiceManager<FactoryFn<u32>> for Doubled {
            type Output = u32;

            fn create_service(
                &self,
                _definition: &FactoryFn<u32>,
            ) -> crate::InjectResult<crate::Svc<u32>> {
                Ok(crate::Svc::new(2))
            }
        }

        static DOUBLED: ManagerKind<Doubled> =
            ManagerKind::new("doubled", |_: &Scope| Doubled);

        let definition = Definition::new(FactoryFn::new(|_: &Scope| 1_u32));
        set_service_manager(&DOUBLED, &definition);

        let converted = definition.into_factory();
        assert_eq!(Some("doubled"), converted.token().manager_label());
        assert_eq!(2, *lookup(&Scope::new(), &converted).unwrap());
    }
}
