use crate::{
    container::{next_id, Lock, MapContainerEx},
    map_for, DynSvc, InjectError, InjectResult, ScopeTable, Svc, WeakSvc,
};
use std::{
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};
use tracing::debug;

struct ScopeInner {
    id: u64,
    parent: Option<WeakScope>,
    /// Side tables keyed by [`ScopeTable`] identity. `None` once disposed.
    tables: Lock<Option<HashMap<u64, DynSvc>>>,
}

/// An opaque lifetime boundary that services are cached in, typically one
/// application or request instance.
///
/// A scope owns no data of its own. Every cache the crate keeps for a scope
/// is a side table stored inside the scope's allocation, so all of them are
/// released as soon as the last handle to the scope is dropped (or the scope
/// is [disposed](Scope::dispose)). Cloning a scope clones the handle, not the
/// scope: clones compare equal and share every cache.
///
/// Services that need to refer back to the scope they were created in should
/// hold a [`WeakScope`]. A strong handle stored in a service would keep the
/// scope, and therefore the service itself, alive forever.
///
/// ```
/// use polaris_service::{factory, lookup, Scope, Svc};
///
/// let scope = Scope::new();
/// let answer = factory(|_: &Scope| 42);
///
/// let first: Svc<i32> = lookup(&scope, &answer).unwrap();
/// let second: Svc<i32> = lookup(&scope, &answer).unwrap();
/// assert!(Svc::ptr_eq(&first, &second));
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Svc<ScopeInner>,
}

impl Scope {
    /// Creates a new, empty scope.
    #[must_use]
    pub fn new() -> Self {
        Scope::with_parent(None)
    }

    fn with_parent(parent: Option<WeakScope>) -> Self {
        Scope {
            inner: Svc::new(ScopeInner {
                id: next_id(),
                parent,
                tables: Lock::new(Some(HashMap::new())),
            }),
        }
    }

    /// Gets the process-unique identifier of this scope.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Creates a weak handle to this scope.
    #[must_use]
    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Svc::downgrade(&self.inner),
        }
    }

    /// Gets the scope this scope was derived from with [`Scope::scoped`], if
    /// it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Scope> {
        self.inner.parent.as_ref().and_then(WeakScope::upgrade)
    }

    /// Gets a child scope of this scope. The child has caches of its own and
    /// is memoized: every call on the same scope returns the same child.
    pub fn scoped(&self) -> InjectResult<Scope> {
        static CHILDREN: ScopeTable<(), Scope> = ScopeTable::new();

        let children = map_for(self, &CHILDREN)?;
        let child = children.with_inner_mut(|children| {
            children
                .entry(())
                .or_insert_with(|| Scope::with_parent(Some(self.downgrade())))
                .clone()
        });
        Ok(child)
    }

    /// Whether [`Scope::dispose`] has been called on this scope.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.tables.with_inner(Option::is_none)
    }

    /// Releases every side table held for this scope. Services, managers,
    /// and overrides cached in it are dropped, which also breaks any
    /// reference cycle between the scope and its services. Any later attempt
    /// to resolve a service in this scope fails with
    /// [`InjectError::ScopeDisposed`].
    pub fn dispose(&self) {
        // Dropped outside the lock so that destructors may use the scope.
        let tables = self.inner.tables.with_inner_mut(Option::take);
        if let Some(tables) = tables {
            debug!(scope = %self, tables = tables.len(), "disposing scope");
            drop(tables);
        }
    }

    pub(crate) fn table_entry<F>(
        &self,
        table_id: u64,
        create: F,
    ) -> InjectResult<DynSvc>
    where
        F: FnOnce() -> DynSvc,
    {
        self.inner.tables.with_inner_mut(|tables| match tables {
            Some(tables) => {
                Ok(tables.entry(table_id).or_insert_with(create).clone())
            }
            None => Err(InjectError::ScopeDisposed {
                scope: self.to_string(),
            }),
        })
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Scope {}

impl Hash for Scope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.id())
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A weak handle to a [`Scope`] which does not keep the scope alive.
#[derive(Clone)]
pub struct WeakScope {
    inner: WeakSvc<ScopeInner>,
}

impl WeakScope {
    /// Attempts to get a strong handle to the scope. Returns `None` if the
    /// scope has already been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<Scope> {
        self.inner.upgrade().map(|inner| Scope { inner })
    }
}

impl Debug for WeakScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(scope) => {
                f.debug_tuple("WeakScope").field(&scope.id()).finish()
            }
            None => f.write_str("WeakScope(<dropped>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{InjectError, Scope};

    #[test]
    fn clones_share_identity() {
        let scope = Scope::new();
        let clone = scope.clone();

        assert_eq!(scope, clone);
        assert_ne!(scope, Scope::new());
    }

    #[test]
    fn weak_scope_does_not_keep_scope_alive() {
        let scope = Scope::new();
        let weak = scope.downgrade();
        assert!(weak.upgrade().is_some());

        drop(scope);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn scoped_child_is_memoized_and_distinct() {
        let parent = Scope::new();
        let child = parent.scoped().unwrap();

        assert_ne!(parent, child);
        assert_eq!(child, parent.scoped().unwrap());
        assert_eq!(Some(parent.clone()), child.parent());
        assert!(parent.parent().is_none());
    }

    #[test]
    fn disposed_scope_rejects_new_tables() {
        let scope = Scope::new();
        scope.dispose();

        assert!(scope.is_disposed());
        match scope.scoped() {
            Err(InjectError::ScopeDisposed { .. }) => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => panic!("a disposed scope created a child"),
        }
    }
}
