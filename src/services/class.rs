use crate::{
    container::{process_wide, ProcessWide},
    set_service_manager, Definition, FactoryToken, InjectError, InjectResult,
    ManagerKind, Scope, Service, ServiceFactory, ServiceManager, Svc,
    WeakScope,
};
use std::{any::TypeId, collections::HashMap, marker::PhantomData};

/// A service type that knows how to construct itself from a scope. The type
/// itself acts as the factory; see [`service_class`].
///
/// ```
/// use polaris_service::{lookup, service_class, Scope, ServiceClass, Svc};
///
/// struct Clock {
///     scope_id: u64,
/// }
///
/// impl ServiceClass for Clock {
///     fn create(scope: &Scope) -> Self {
///         Clock { scope_id: scope.id() }
///     }
/// }
///
/// let scope = Scope::new();
/// let clock = lookup(&scope, &service_class::<Clock>()).unwrap();
/// assert_eq!(scope.id(), clock.scope_id);
/// let again = lookup(&scope, &service_class::<Clock>()).unwrap();
/// assert!(Svc::ptr_eq(&clock, &again));
/// ```
pub trait ServiceClass: Service + Sized {
    /// Creates the instance for a scope.
    fn create(scope: &Scope) -> Self;
}

/// The definition behind a [`service_class`]. It carries nothing but the type.
pub struct ClassDefinition<S> {
    marker: PhantomData<fn() -> S>,
}

/// Constructs class-style services for one scope.
#[derive(Debug)]
pub struct ClassServiceManager {
    scope: WeakScope,
}

impl<S: ServiceClass> ServiceManager<ClassDefinition<S>>
    for ClassServiceManager
{
    type Output = S;

    fn create_service(
        &self,
        _definition: &ClassDefinition<S>,
    ) -> InjectResult<Svc<S>> {
        let scope = self.scope.upgrade().ok_or_else(|| {
            InjectError::InternalError(format!(
                "the scope managing {} no longer exists",
                std::any::type_name::<S>()
            ))
        })?;

        Ok(Svc::new(S::create(&scope)))
    }
}

fn class_service_manager(scope: &Scope) -> ClassServiceManager {
    ClassServiceManager {
        scope: scope.downgrade(),
    }
}

/// The manager kind of every [`ServiceClass`].
pub static CLASS_SERVICE_MANAGER: ManagerKind<ClassServiceManager> =
    ManagerKind::new("class", class_service_manager);

process_wide! {
    static CLASSES: HashMap<TypeId, FactoryToken> = HashMap::new();
}

/// Gets the factory of a [`ServiceClass`]. Every call for the same type
/// returns the same factory.
#[must_use]
pub fn service_class<S: ServiceClass>() -> ServiceFactory<S> {
    CLASSES.with_mut(|classes| {
        let token = classes
            .entry(TypeId::of::<S>())
            .or_insert_with(|| {
                let definition = Definition::with_label(
                    std::any::type_name::<S>(),
                    ClassDefinition::<S> {
                        marker: PhantomData,
                    },
                );
                set_service_manager(&CLASS_SERVICE_MANAGER, &definition);
                definition.token().clone()
            })
            .clone();

        ServiceFactory::from_token(token)
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        factory, lookup, override_service, service_class, Scope, ServiceClass,
        Svc,
    };

    struct Greeter {
        greeting: &'static str,
    }

    impl ServiceClass for Greeter {
        fn create(_scope: &Scope) -> Self {
            Greeter { greeting: "hello" }
        }
    }

    struct Doorman {
        greeter: Svc<Greeter>,
    }

    impl ServiceClass for Doorman {
        fn create(scope: &Scope) -> Self {
            Doorman {
                greeter: lookup(scope, &service_class::<Greeter>()).unwrap(),
            }
        }
    }

    #[test]
    fn class_factory_is_memoized_per_type() {
        assert_eq!(service_class::<Greeter>(), service_class::<Greeter>());
        assert_ne!(
            service_class::<Greeter>().token(),
            service_class::<Doorman>().token()
        );
    }

    #[test]
    fn classes_resolve_dependencies_from_their_scope() {
        let scope = Scope::new();
        let doorman = lookup(&scope, &service_class::<Doorman>()).unwrap();
        let greeter = lookup(&scope, &service_class::<Greeter>()).unwrap();

        assert!(Svc::ptr_eq(&doorman.greeter, &greeter));
    }

    #[test]
    fn class_can_be_overridden() {
        let scope = Scope::new();
        let quiet = factory(|_: &Scope| Greeter { greeting: "..." });
        override_service(&scope, &service_class::<Greeter>(), &quiet).unwrap();

        let doorman = lookup(&scope, &service_class::<Doorman>()).unwrap();
        assert_eq!("...", doorman.greeter.greeting);
    }
}
