use crate::{
    container::{LazyId, MapContainerEx, OnceSlot},
    manager::token::{Capability, Instantiate},
    map_for, AsFactoryToken, Definition, DynSvc, FactoryArgument, FactoryToken,
    InjectError, InjectResult, Scope, ScopeTable, Service, ServiceFactory,
    ServiceInfo, Svc,
};
use std::marker::PhantomData;
use tracing::debug;

/// Turns definitions into services for one scope. One manager exists per
/// scope and [`ManagerKind`], created the first time a factory of that kind
/// is resolved in the scope.
///
/// A manager may resolve other services from its scope while creating a
/// service.
///
/// ```
/// use polaris_service::{
///     lookup, set_service_manager, Definition, InjectResult, ManagerKind,
///     Scope, ServiceManager, Svc,
/// };
///
/// struct Greeting(&'static str);
///
/// struct GreetingManager;
///
/// impl ServiceManager<Greeting> for GreetingManager {
///     type Output = String;
///
///     fn create_service(
///         &self,
///         definition: &Greeting,
///     ) -> InjectResult<Svc<String>> {
///         Ok(Svc::new(format!("Hello, {}!", definition.0)))
///     }
/// }
///
/// fn greeting_manager(_scope: &Scope) -> GreetingManager {
///     GreetingManager
/// }
///
/// static GREETINGS: ManagerKind<GreetingManager> =
///     ManagerKind::new("greeting", greeting_manager);
///
/// let world =
///     set_service_manager(&GREETINGS, &Definition::new(Greeting("world")));
/// let greeting = lookup(&Scope::new(), &world).unwrap();
/// assert_eq!("Hello, world!", *greeting);
/// ```
pub trait ServiceManager<D: ?Sized>: Service {
    /// The type of service this manager creates from a `D`.
    type Output: Service;

    /// Creates a service from its definition.
    fn create_service(&self, definition: &D) -> InjectResult<Svc<Self::Output>>;
}

/// A kind of [`ServiceManager`]: the function creating the manager for a
/// scope. Declare manager kinds as `static`s; a kind's identity is the
/// identity of the static, so every definition tagged with the same kind
/// shares a single manager per scope.
pub struct ManagerKind<M> {
    id: LazyId,
    label: &'static str,
    create: fn(&Scope) -> M,
}

impl<M> ManagerKind<M> {
    /// Creates a new manager kind.
    #[must_use]
    pub const fn new(label: &'static str, create: fn(&Scope) -> M) -> Self {
        ManagerKind {
            id: LazyId::new(),
            label,
            create,
        }
    }

    /// Gets the label of this manager kind.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

type ManagerSlot = Svc<OnceSlot<DynSvc>>;

static MANAGERS: ScopeTable<u64, ManagerSlot> = ScopeTable::new();

fn manager_for<M: Service>(
    scope: &Scope,
    kind: &'static ManagerKind<M>,
) -> InjectResult<Svc<M>> {
    let managers = map_for(scope, &MANAGERS)?;
    let slot = managers.with_inner_mut(|managers| {
        managers.entry(kind.id.get()).or_default().clone()
    });

    let manager = slot
        .get_or_init(|| {
            debug!(
                scope = %scope,
                manager = kind.label,
                "creating service manager"
            );
            Svc::new((kind.create)(scope)) as DynSvc
        })
        .clone();

    manager.downcast::<M>().map_err(|_| {
        InjectError::InternalError(format!(
            "the {} manager cached in {} has the wrong type",
            kind.label, scope
        ))
    })
}

struct Managed<D, M: 'static> {
    kind: &'static ManagerKind<M>,
    marker: PhantomData<fn(&D)>,
}

impl<D, M> Instantiate for Managed<D, M>
where
    D: Service,
    M: ServiceManager<D>,
{
    fn instantiate(
        &self,
        scope: &Scope,
        definition: &DynSvc,
    ) -> InjectResult<DynSvc> {
        let definition = definition.downcast_ref::<D>().ok_or_else(|| {
            InjectError::InternalError(format!(
                "the {} manager was attached to a definition that is not a {}",
                self.kind.label,
                ServiceInfo::of::<D>().name()
            ))
        })?;

        let manager = manager_for(scope, self.kind)?;
        let service = manager.create_service(definition)?;
        Ok(service as DynSvc)
    }
}

/// Attaches a service manager kind to a definition, turning it into a
/// service factory, and returns the factory.
///
/// Attaching the same kind again does nothing. Attaching a different kind
/// replaces the previous one: the last kind attached is the one used from
/// then on.
pub fn set_service_manager<D, M>(
    kind: &'static ManagerKind<M>,
    definition: &Definition<D>,
) -> ServiceFactory<M::Output>
where
    D: Service,
    M: ServiceManager<D>,
{
    let token = definition.token();
    let kind_id = kind.id.get();
    let replaced = token.tag(kind_id, || Capability {
        kind: kind_id,
        kind_label: kind.label,
        instantiate: Svc::new(Managed::<D, M> {
            kind,
            marker: PhantomData,
        }),
    });

    if let Some(previous) = replaced {
        debug!(
            factory = %token.label(),
            previous,
            manager = kind.label,
            "replacing service manager"
        );
    }

    ServiceFactory::from_token(token.clone())
}

/// Whether a value is a service factory, meaning it holds a token with a
/// service manager attached. Never fails.
///
/// ```
/// use polaris_service::{factory, is_service_factory, Definition, Scope};
///
/// assert!(is_service_factory(&factory(|_: &Scope| 1)));
/// assert!(!is_service_factory(&Definition::new(1)));
/// assert!(!is_service_factory(&None::<Definition<i32>>));
/// ```
pub fn is_service_factory<F>(value: &F) -> bool
where
    F: ?Sized + AsFactoryToken,
{
    value
        .factory_token()
        .map_or(false, FactoryToken::is_tagged)
}

/// Creates a new instance from a factory in a scope, bypassing every cache
/// and override. [`lookup`](crate::lookup) is almost always what you want
/// instead.
pub fn instantiate(
    scope: &Scope,
    token: &FactoryToken,
) -> InjectResult<DynSvc> {
    let capability =
        token.capability().ok_or_else(|| InjectError::InvalidFactory {
            argument: FactoryArgument::Factory,
            label: token.label(),
        })?;

    capability.instantiate.instantiate(scope, token.definition())
}

#[cfg(test)]
mod tests {
    use crate::{
        instantiate, is_service_factory, set_service_manager, Definition,
        InjectError, InjectResult, ManagerKind, Scope, ServiceManager, Svc,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper(&'static str);

    struct UpperManager;

    impl ServiceManager<Upper> for UpperManager {
        type Output = String;

        fn create_service(
            &self,
            definition: &Upper,
        ) -> InjectResult<Svc<String>> {
            Ok(Svc::new(definition.0.to_uppercase()))
        }
    }

    struct LenManager;

    impl ServiceManager<Upper> for LenManager {
        type Output = usize;

        fn create_service(
            &self,
            definition: &Upper,
        ) -> InjectResult<Svc<usize>> {
            Ok(Svc::new(definition.0.len()))
        }
    }

    fn upper_manager(_scope: &Scope) -> UpperManager {
        UpperManager
    }

    static UPPER: ManagerKind<UpperManager> =
        ManagerKind::new("upper", upper_manager);
    static LEN: ManagerKind<LenManager> =
        ManagerKind::new("len", |_: &Scope| LenManager);

    #[test]
    fn untagged_definition_is_not_a_factory() {
        let definition = Definition::new(Upper("abc"));
        assert!(!is_service_factory(&definition));

        match instantiate(&Scope::new(), definition.token()) {
            Err(InjectError::InvalidFactory { .. }) => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => panic!("instantiated an untagged definition"),
        }
    }

    #[test]
    fn tagging_makes_a_factory_in_place() {
        let definition = Definition::new(Upper("abc"));
        let factory = set_service_manager(&UPPER, &definition);

        assert!(is_service_factory(&definition));
        assert_eq!(definition.token(), factory.token());

        let service = instantiate(&Scope::new(), factory.token()).unwrap();
        assert_eq!(
            Some("ABC"),
            service.downcast_ref::<String>().map(String::as_str)
        );
    }

    #[test]
    fn one_manager_per_scope_and_kind() {
        static CREATED: AtomicUsize = AtomicUsize::new(0);

        fn counted_manager(_scope: &Scope) -> UpperManager {
            CREATED.fetch_add(1, Ordering::SeqCst);
            UpperManager
        }

        static COUNTED: ManagerKind<UpperManager> =
            ManagerKind::new("counted", counted_manager);

        let first = set_service_manager(&COUNTED, &Definition::new(Upper("a")));
        let second =
            set_service_manager(&COUNTED, &Definition::new(Upper("b")));

        let scope = Scope::new();
        instantiate(&scope, first.token()).unwrap();
        instantiate(&scope, second.token()).unwrap();
        instantiate(&scope, first.token()).unwrap();
        assert_eq!(1, CREATED.load(Ordering::SeqCst));

        instantiate(&Scope::new(), first.token()).unwrap();
        assert_eq!(2, CREATED.load(Ordering::SeqCst));
    }

    #[test]
    fn last_manager_kind_wins() {
        let definition = Definition::new(Upper("abcd"));
        set_service_manager(&UPPER, &definition);
        set_service_manager(&LEN, &definition);

        let service = instantiate(&Scope::new(), definition.token()).unwrap();
        assert_eq!(Some(&4), service.downcast_ref::<usize>());
        assert_eq!(Some("len"), definition.token().manager_label());
    }
}
