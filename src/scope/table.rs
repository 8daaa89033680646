use crate::{
    container::{LazyId, Lock, MapContainer},
    DynSvc, InjectError, InjectResult, Scope, Service, Svc,
};
use std::{collections::HashMap, hash::Hash, marker::PhantomData};

/// A per-scope side map handed out by [`map_for`].
pub type SideMap<K, V> = MapContainer<HashMap<K, V>>;

/// A table of per-scope side maps. Declare one as a `static` for each kind of
/// state kept per scope, then use [`map_for`] to get the map belonging to a
/// particular scope.
///
/// The table itself holds nothing. Each scope's map lives inside that scope,
/// so it is released together with the scope and a scope can never see
/// another scope's map.
///
/// ```
/// use polaris_service::{map_for, Scope, ScopeTable, Svc};
///
/// static VISITS: ScopeTable<&'static str, u32> = ScopeTable::new();
///
/// let scope = Scope::new();
/// let visits = map_for(&scope, &VISITS).unwrap();
/// let again = map_for(&scope, &VISITS).unwrap();
/// assert!(Svc::ptr_eq(&visits, &again));
///
/// let elsewhere = map_for(&Scope::new(), &VISITS).unwrap();
/// assert!(!Svc::ptr_eq(&visits, &elsewhere));
/// ```
pub struct ScopeTable<K, V> {
    id: LazyId,
    marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> ScopeTable<K, V> {
    /// Creates a new table with its own identity.
    #[must_use]
    pub const fn new() -> Self {
        ScopeTable {
            id: LazyId::new(),
            marker: PhantomData,
        }
    }
}

impl<K, V> Default for ScopeTable<K, V> {
    fn default() -> Self {
        ScopeTable::new()
    }
}

/// Gets the side map `table` keeps for `scope`, creating an empty one on
/// first access. Creation is atomic: concurrent first accesses all receive
/// the same map.
pub fn map_for<K, V>(
    scope: &Scope,
    table: &ScopeTable<K, V>,
) -> InjectResult<SideMap<K, V>>
where
    K: Eq + Hash + Service,
    V: Service,
{
    let entry = scope.table_entry(table.id.get(), || {
        Svc::new(Lock::new(HashMap::<K, V>::new())) as DynSvc
    })?;

    entry.downcast::<Lock<HashMap<K, V>>>().map_err(|_| {
        InjectError::InternalError(format!(
            "the side table {} of {} holds a map of the wrong type",
            table.id.get(),
            scope
        ))
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        container::MapContainerEx, map_for, InjectError, Scope, ScopeTable,
        Svc,
    };

    static NAMES: ScopeTable<u32, &'static str> = ScopeTable::new();

    #[test]
    fn map_is_created_once_per_scope() {
        let scope = Scope::new();
        let first = map_for(&scope, &NAMES).unwrap();
        let second = map_for(&scope, &NAMES).unwrap();

        assert!(Svc::ptr_eq(&first, &second));
    }

    #[test]
    fn maps_do_not_leak_across_scopes() {
        let scope1 = Scope::new();
        let scope2 = Scope::new();

        map_for(&scope1, &NAMES)
            .unwrap()
            .with_inner_mut(|names| names.insert(1, "one"));

        let names = map_for(&scope2, &NAMES).unwrap();
        assert!(names.with_inner(|names| names.is_empty()));
    }

    #[test]
    fn distinct_tables_do_not_share_maps() {
        static OTHER: ScopeTable<u32, &'static str> = ScopeTable::new();

        let scope = Scope::new();
        map_for(&scope, &NAMES)
            .unwrap()
            .with_inner_mut(|names| names.insert(1, "one"));

        let other = map_for(&scope, &OTHER).unwrap();
        assert!(other.with_inner(|names| names.get(&1).is_none()));
    }

    #[test]
    fn map_is_released_with_scope() {
        let scope = Scope::new();
        let map = map_for(&scope, &NAMES).unwrap();
        let weak = Svc::downgrade(&map);
        drop(map);

        assert!(weak.upgrade().is_some());
        drop(scope);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn disposed_scope_has_no_maps() {
        let scope = Scope::new();
        scope.dispose();

        assert!(matches!(
            map_for(&scope, &NAMES),
            Err(InjectError::ScopeDisposed { .. })
        ));
    }
}
