use crate::{
    container::{process_wide, ProcessWide},
    set_service_manager, Definition, FactoryToken, InjectResult, ManagerKind,
    Scope, Service, ServiceFactory, ServiceManager, Svc,
};
use std::{
    any::TypeId,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
};

/// The definition behind a [`singleton`]: the instance itself.
pub struct SingletonValue<T> {
    value: Svc<T>,
}

impl<T> SingletonValue<T> {
    /// Gets the shared instance.
    #[must_use]
    pub fn value(&self) -> &Svc<T> {
        &self.value
    }
}

impl<T> Debug for SingletonValue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SingletonValue")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

/// Hands out the same instance in every scope.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughManager;

impl<T: Service> ServiceManager<SingletonValue<T>> for PassthroughManager {
    type Output = T;

    fn create_service(
        &self,
        definition: &SingletonValue<T>,
    ) -> InjectResult<Svc<T>> {
        Ok(definition.value.clone())
    }
}

fn passthrough_manager(_scope: &Scope) -> PassthroughManager {
    PassthroughManager
}

/// The manager kind of every [`singleton`].
pub static PASSTHROUGH_MANAGER: ManagerKind<PassthroughManager> =
    ManagerKind::new("singleton", passthrough_manager);

type SingletonKey = (usize, TypeId);

struct SingletonEntry {
    token: FactoryToken,
    in_use: fn(&FactoryToken) -> bool,
}

/// Whether anything but the memoized definition still holds the value.
fn value_in_use<T: Service>(token: &FactoryToken) -> bool {
    token
        .definition()
        .downcast_ref::<SingletonValue<T>>()
        .map_or(false, |definition| Svc::strong_count(&definition.value) > 1)
}

process_wide! {
    static SINGLETONS: HashMap<SingletonKey, SingletonEntry> = HashMap::new();
}

/// Creates a factory which resolves to `value` in every scope. Calling this
/// again with the same instance returns the same factory for as long as the
/// instance is alive. Once nothing but the memo refers to an instance, its
/// entry is released by the next call to this function.
///
/// ```
/// use polaris_service::{lookup, singleton, Scope, Svc};
///
/// let settings = Svc::new(String::from("dark mode"));
/// let factory = singleton(&settings);
/// assert_eq!(factory, singleton(&settings));
///
/// let scope1 = Scope::new();
/// let scope2 = Scope::new();
/// assert!(Svc::ptr_eq(&settings, &lookup(&scope1, &factory).unwrap()));
/// assert!(Svc::ptr_eq(&settings, &lookup(&scope2, &factory).unwrap()));
/// ```
#[must_use]
pub fn singleton<T: Service>(value: &Svc<T>) -> ServiceFactory<T> {
    let key = (Svc::as_ptr(value) as *const () as usize, TypeId::of::<T>());

    let (factory, released) = SINGLETONS.with_mut(|singletons| {
        let stale: Vec<SingletonKey> = singletons
            .iter()
            .filter(|(_, entry)| !(entry.in_use)(&entry.token))
            .map(|(key, _)| *key)
            .collect();
        let released: Vec<SingletonEntry> = stale
            .iter()
            .filter_map(|key| singletons.remove(key))
            .collect();

        let entry = singletons.entry(key).or_insert_with(|| {
            let definition = Definition::with_label(
                std::any::type_name::<T>(),
                SingletonValue {
                    value: value.clone(),
                },
            );
            let factory =
                set_service_manager(&PASSTHROUGH_MANAGER, &definition);
            SingletonEntry {
                token: factory.token().clone(),
                in_use: value_in_use::<T>,
            }
        });

        (ServiceFactory::from_token(entry.token.clone()), released)
    });

    // Dropped outside the lock, a value's destructor may call back in.
    drop(released);
    factory
}
