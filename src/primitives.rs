use crate::{
    container::{MapContainerEx, OnceSlot},
    get_scope, instantiate, map_for, DynSvc, FactoryArgument, FactoryId,
    FactoryToken, InjectError, InjectResult, Scopable, Scope, ScopeTable,
    Service, ServiceFactory, ServiceInfo, Svc,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// The cache entry of one factory in one scope. The token is kept alive
/// alongside the instance so that the factory's identity outlives every
/// caller that dropped it, for as long as the scope remembers it.
struct ServiceEntry {
    _token: FactoryToken,
    slot: Svc<ServiceSlot>,
}

#[derive(Default)]
struct ServiceSlot {
    instance: OnceSlot<DynSvc>,
    creating: AtomicBool,
}

impl ServiceSlot {
    /// Whether the service was created, or is being created right now.
    fn is_claimed(&self) -> bool {
        self.instance.get().is_some() || self.creating.load(Ordering::Acquire)
    }
}

/// Marks a slot as being created until dropped.
struct Creating<'a>(&'a AtomicBool);

impl<'a> Creating<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Creating(flag)
    }
}

impl Drop for Creating<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct OverrideEntry {
    original: FactoryToken,
    replacement: FactoryToken,
}

static SERVICES: ScopeTable<FactoryId, ServiceEntry> = ScopeTable::new();
static OVERRIDES: ScopeTable<FactoryId, OverrideEntry> = ScopeTable::new();

fn ensure_factory(
    token: &FactoryToken,
    argument: FactoryArgument,
) -> InjectResult<()> {
    if token.is_tagged() {
        Ok(())
    } else {
        Err(InjectError::InvalidFactory {
            argument,
            label: token.label(),
        })
    }
}

/// Gets the service a factory produces in a scope, creating it the first
/// time it is requested there. Every later lookup of the same factory in the
/// same scope returns the same instance.
///
/// If an override was installed for the factory in this scope (see
/// [`override_service`]), or a provider registered for it (see [`provide`]),
/// the instance is created from that factory instead. It is still cached
/// under the original factory.
///
/// Managers and factory functions may look up other services in the same
/// scope while they run. A factory that (indirectly) requires itself is not
/// detected and never completes.
///
/// ```
/// use polaris_service::{factory, lookup, Scope, Svc};
/// use std::cell::Cell;
///
/// #[derive(Default)]
/// struct Counter {
///     n: Cell<u32>,
/// }
///
/// let counter = factory(|_: &Scope| Counter::default());
/// let scope = Scope::new();
///
/// let a = lookup(&scope, &counter).unwrap();
/// let b = lookup(&scope, &counter).unwrap();
/// assert!(Svc::ptr_eq(&a, &b));
/// assert_eq!(0, a.n.get());
/// ```
pub fn lookup<T: Service>(
    scope: &Scope,
    factory: &ServiceFactory<T>,
) -> InjectResult<Svc<T>> {
    let token = factory.token();
    ensure_factory(token, FactoryArgument::Factory)?;

    let services = map_for(scope, &SERVICES)?;
    let slot = services.with_inner_mut(|services| {
        services
            .entry(token.id())
            .or_insert_with(|| ServiceEntry {
                _token: token.clone(),
                slot: Svc::default(),
            })
            .slot
            .clone()
    });

    let instance = match slot.instance.get() {
        Some(instance) => {
            trace!(
                scope = %scope,
                factory = %token.label(),
                "service cache hit"
            );
            instance.clone()
        }
        None => slot
            .instance
            .get_or_try_init(|| {
                let _creating = Creating::start(&slot.creating);
                let effective = factory_for(scope, token)?;
                debug!(
                    scope = %scope,
                    factory = %token.label(),
                    effective = %effective.label(),
                    "instantiating service"
                );
                instantiate(scope, &effective)
            })?
            .clone(),
    };

    instance
        .downcast::<T>()
        .map_err(|_| InjectError::InvalidService {
            label: token.label(),
            service_info: ServiceInfo::of::<T>(),
        })
}

/// Replaces a factory with another one within a single scope. The override
/// only takes effect if the factory has not been resolved in that scope yet;
/// otherwise this fails with [`InjectError::OverrideTooLate`]. Overriding
/// the same factory again before it is resolved replaces the previous
/// override. Other scopes are never affected.
///
/// A factory counts as resolved from the moment its creation starts, so an
/// override issued while the service is being created (for example from one
/// of its dependencies) fails with [`InjectError::OverrideTooLate`] as well.
///
/// ```
/// use polaris_service::{
///     factory, lookup, override_service, InjectError, Scope,
/// };
///
/// let real = factory(|_: &Scope| "real");
/// let mocked = factory(|_: &Scope| "mocked");
/// let scope = Scope::new();
///
/// override_service(&scope, &real, &mocked).unwrap();
/// assert_eq!("mocked", *lookup(&scope, &real).unwrap());
/// assert_eq!("real", *lookup(&Scope::new(), &real).unwrap());
///
/// assert!(matches!(
///     override_service(&scope, &real, &mocked),
///     Err(InjectError::OverrideTooLate { .. })
/// ));
/// ```
pub fn override_service<T: Service>(
    scope: &Scope,
    factory: &ServiceFactory<T>,
    replacement: &ServiceFactory<T>,
) -> InjectResult<()> {
    let token = factory.token();
    ensure_factory(token, FactoryArgument::Factory)?;
    ensure_factory(replacement.token(), FactoryArgument::Replacement)?;

    let services = map_for(scope, &SERVICES)?;
    let resolved = services.with_inner(|services| {
        services
            .get(&token.id())
            .map_or(false, |entry| entry.slot.is_claimed())
    });
    if resolved {
        return Err(InjectError::OverrideTooLate {
            label: token.label(),
        });
    }

    debug!(
        scope = %scope,
        factory = %token.label(),
        replacement = %replacement.label(),
        "overriding service"
    );

    let overrides = map_for(scope, &OVERRIDES)?;
    overrides.with_inner_mut(|overrides| {
        overrides.insert(
            token.id(),
            OverrideEntry {
                original: token.clone(),
                replacement: replacement.token().clone(),
            },
        );
    });

    Ok(())
}

/// Registers a default replacement for a factory in every scope. A
/// scope-level override still takes precedence over the provider.
///
/// The provider is attached to the factory itself and is released together
/// with it. Registering again replaces the previous provider, and providing
/// a factory with itself removes it.
pub fn provide<T: Service>(
    factory: &ServiceFactory<T>,
    provider: &ServiceFactory<T>,
) -> InjectResult<ServiceFactory<T>> {
    ensure_factory(factory.token(), FactoryArgument::Factory)?;
    ensure_factory(provider.token(), FactoryArgument::Replacement)?;

    debug!(
        factory = %factory.label(),
        provider = %provider.label(),
        "registering service provider"
    );

    let previous = factory.token().set_provider(provider.token());
    if let Some(previous) = previous {
        trace!(previous = %previous.label(), "replaced service provider");
    }

    Ok(factory.clone())
}

/// Resolves which factory actually creates the service for `token`.
fn factory_for(
    scope: &Scope,
    token: &FactoryToken,
) -> InjectResult<FactoryToken> {
    let overrides = map_for(scope, &OVERRIDES)?;
    let overridden = overrides.with_inner(|overrides| {
        overrides.get(&token.id()).map(|entry| {
            debug_assert_eq!(&entry.original, token);
            entry.replacement.clone()
        })
    });

    if let Some(replacement) = overridden {
        return Ok(replacement);
    }

    Ok(token.provider().unwrap_or_else(|| token.clone()))
}

/// Looks up a service in the scope of an object. This is the function form
/// of the [`service_decorator`](crate::service_decorator).
///
/// Fails with [`InjectError::MissingScope`] if the object has neither an
/// attached scope nor an owner.
pub fn service<T, O>(
    scopable: &O,
    factory: &ServiceFactory<T>,
) -> InjectResult<Svc<T>>
where
    T: Service,
    O: ?Sized + Scopable,
{
    let scope = get_scope(scopable).ok_or(InjectError::MissingScope)?;
    lookup(&scope, factory)
}

#[cfg(test)]
mod tests {
    use crate::{
        factory, lookup, override_service, provide, service, set_scope,
        Definition, FactoryArgument, InjectError, Scope, ScopeSlot,
        ServiceFactory, Svc,
    };
    use once_cell::sync::OnceCell;
    use std::{
        cell::Cell,
        sync::atomic::{AtomicBool, Ordering},
    };

    #[test]
    fn lookup_rejects_untagged_token() {
        let untagged: ServiceFactory<u8> =
            ServiceFactory::from_token(Definition::new(0_u8).token().clone());

        match lookup(&Scope::new(), &untagged) {
            Err(InjectError::InvalidFactory {
                argument: FactoryArgument::Factory,
                ..
            }) => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => panic!("looked up an untagged token"),
        }
    }

    #[test]
    fn override_rejects_untagged_replacement() {
        let real = factory(|_: &Scope| 1_u8);
        let untagged: ServiceFactory<u8> =
            ServiceFactory::from_token(Definition::new(2_u8).token().clone());

        match override_service(&Scope::new(), &real, &untagged) {
            Err(InjectError::InvalidFactory {
                argument: FactoryArgument::Replacement,
                ..
            }) => {}
            Err(error) => Err(error).unwrap(),
            Ok(()) => panic!("installed an untagged override"),
        }
    }

    #[test]
    fn wrong_output_type_is_reported() {
        let number = factory(|_: &Scope| 1_u8);
        let confused: ServiceFactory<String> =
            ServiceFactory::from_token(number.token().clone());

        match lookup(&Scope::new(), &confused) {
            Err(InjectError::InvalidService { service_info, .. }) => {
                assert_eq!("alloc::string::String", service_info.name());
            }
            Err(error) => Err(error).unwrap(),
            Ok(_) => panic!("a u8 was returned as a String"),
        }
    }

    #[test]
    fn last_override_before_resolution_wins() {
        let real = factory(|_: &Scope| "real");
        let first = factory(|_: &Scope| "first");
        let second = factory(|_: &Scope| "second");
        let scope = Scope::new();

        override_service(&scope, &real, &first).unwrap();
        override_service(&scope, &real, &second).unwrap();
        assert_eq!("second", *lookup(&scope, &real).unwrap());
    }

    #[test]
    fn override_is_keyed_by_original_factory() {
        let real = factory(|_: &Scope| "real");
        let mocked = factory(|_: &Scope| "mocked");
        let scope = Scope::new();

        override_service(&scope, &real, &mocked).unwrap();
        let through_real = lookup(&scope, &real).unwrap();
        let through_mock = lookup(&scope, &mocked).unwrap();

        assert_eq!("mocked", *through_real);
        assert_eq!("mocked", *through_mock);
        assert!(!Svc::ptr_eq(&through_real, &through_mock));
        assert!(Svc::ptr_eq(&through_real, &lookup(&scope, &real).unwrap()));
    }

    #[test]
    fn scope_override_beats_provider() {
        let real = factory(|_: &Scope| "real");
        let provided = factory(|_: &Scope| "provided");
        let mocked = factory(|_: &Scope| "mocked");
        provide(&real, &provided).unwrap();

        assert_eq!("provided", *lookup(&Scope::new(), &real).unwrap());

        let scope = Scope::new();
        override_service(&scope, &real, &mocked).unwrap();
        assert_eq!("mocked", *lookup(&scope, &real).unwrap());
    }

    #[test]
    fn override_during_creation_is_too_late() {
        static TOO_LATE: AtomicBool = AtomicBool::new(false);

        let outer: Svc<OnceCell<ServiceFactory<&'static str>>> =
            Svc::default();
        let handle = outer.clone();
        let dependency = factory(move |scope: &Scope| {
            if let Some(outer) = handle.get() {
                let mocked = factory(|_: &Scope| "mocked");
                let outcome = override_service(scope, outer, &mocked);
                TOO_LATE.store(
                    matches!(outcome, Err(InjectError::OverrideTooLate { .. })),
                    Ordering::SeqCst,
                );
            }
        });

        let real = factory(move |scope: &Scope| {
            lookup(scope, &dependency).unwrap();
            "real"
        });
        outer.set(real.clone()).unwrap();

        let scope = Scope::new();
        assert_eq!("real", *lookup(&scope, &real).unwrap());
        assert!(TOO_LATE.load(Ordering::SeqCst));
    }

    #[test]
    fn provider_is_released_with_its_factory() {
        let value = Svc::new(String::from("provided"));
        let weak = Svc::downgrade(&value);

        {
            let real = factory(|_: &Scope| String::from("real"));
            let provided = factory(move |_: &Scope| String::clone(&value));
            provide(&real, &provided).unwrap();
            assert_eq!("provided", *lookup(&Scope::new(), &real).unwrap());
        }

        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn providing_a_factory_with_itself_clears_the_provider() {
        let real = factory(|_: &Scope| "real");
        provide(&real, &factory(|_: &Scope| "provided")).unwrap();
        assert_eq!("provided", *lookup(&Scope::new(), &real).unwrap());

        provide(&real, &real).unwrap();
        assert_eq!("real", *lookup(&Scope::new(), &real).unwrap());
    }

    #[test]
    fn failed_instantiation_is_retried() {
        #[derive(Debug)]
        struct NotYet;

        impl std::fmt::Display for NotYet {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "not yet")
            }
        }

        impl std::error::Error for NotYet {}

        thread_local! {
            static ATTEMPTS: Cell<u32> = Cell::new(0);
        }

        let flaky = crate::try_factory(|_: &Scope| {
            let attempt = ATTEMPTS.with(|attempts| {
                attempts.set(attempts.get() + 1);
                attempts.get()
            });
            if attempt == 1 {
                Err(NotYet)
            } else {
                Ok(attempt)
            }
        });
        let scope = Scope::new();

        assert!(matches!(
            lookup(&scope, &flaky),
            Err(InjectError::ActivationFailed { .. })
        ));
        assert_eq!(2, *lookup(&scope, &flaky).unwrap());
        assert_eq!(2, *lookup(&scope, &flaky).unwrap());
    }

    #[test]
    fn service_uses_the_object_scope() {
        let slot = ScopeSlot::new();
        let answer = factory(|_: &Scope| 42_u32);

        assert!(matches!(
            service(&slot, &answer),
            Err(InjectError::MissingScope)
        ));

        let scope = Scope::new();
        set_scope(&slot, scope.clone()).unwrap();
        assert!(Svc::ptr_eq(
            &service(&slot, &answer).unwrap(),
            &lookup(&scope, &answer).unwrap()
        ));
    }
}
