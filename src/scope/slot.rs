use crate::{container::OnceSlot, InjectError, InjectResult, Scope, Svc};
use std::fmt::{self, Debug, Formatter};

/// A write-once slot an object embeds so that a [`Scope`] can be attached to
/// it with [`set_scope`].
#[derive(Default)]
pub struct ScopeSlot {
    scope: OnceSlot<Scope>,
}

impl ScopeSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        ScopeSlot::default()
    }

    /// Creates a slot with a scope already attached.
    #[must_use]
    pub fn with_scope(scope: Scope) -> Self {
        ScopeSlot {
            scope: OnceSlot::with_value(scope),
        }
    }

    /// Gets the attached scope, if any.
    #[must_use]
    pub fn get(&self) -> Option<&Scope> {
        self.scope.get()
    }
}

impl Debug for ScopeSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopeSlot").field(&self.get()).finish()
    }
}

/// An object which can carry a [`Scope`].
///
/// Objects get their scope from one of two places: a scope attached
/// explicitly to their [`ScopeSlot`] through [`set_scope`], or their owner,
/// the ambient container the object belongs to, as reported by
/// [`Scopable::owner`]. The attached scope wins when both exist.
///
/// ```
/// use polaris_service::{get_scope, set_scope, Scopable, Scope, ScopeSlot};
///
/// #[derive(Default)]
/// struct Controller {
///     slot: ScopeSlot,
/// }
///
/// impl Scopable for Controller {
///     fn scope_slot(&self) -> Option<&ScopeSlot> {
///         Some(&self.slot)
///     }
/// }
///
/// let scope = Scope::new();
/// let controller = Controller::default();
/// assert!(get_scope(&controller).is_none());
///
/// set_scope(&controller, scope.clone()).unwrap();
/// assert_eq!(Some(scope), get_scope(&controller));
/// ```
pub trait Scopable {
    /// The slot a scope can be attached to, if this object has one.
    fn scope_slot(&self) -> Option<&ScopeSlot> {
        None
    }

    /// The scope of the container that owns this object, if any. This is
    /// consulted only when no scope was attached explicitly.
    fn owner(&self) -> Option<Scope> {
        None
    }
}

impl Scopable for ScopeSlot {
    fn scope_slot(&self) -> Option<&ScopeSlot> {
        Some(self)
    }
}

/// A scope is its own owner.
impl Scopable for Scope {
    fn owner(&self) -> Option<Scope> {
        Some(self.clone())
    }
}

impl<T: ?Sized + Scopable> Scopable for &T {
    fn scope_slot(&self) -> Option<&ScopeSlot> {
        (**self).scope_slot()
    }

    fn owner(&self) -> Option<Scope> {
        (**self).owner()
    }
}

impl<T: ?Sized + Scopable> Scopable for Svc<T> {
    fn scope_slot(&self) -> Option<&ScopeSlot> {
        (**self).scope_slot()
    }

    fn owner(&self) -> Option<Scope> {
        (**self).owner()
    }
}

/// Attaches a scope to an object. A scope can only be attached once; a
/// second call fails with [`InjectError::AlreadyScoped`] and leaves the
/// original scope in place.
pub fn set_scope<O>(object: &O, scope: Scope) -> InjectResult<()>
where
    O: ?Sized + Scopable,
{
    let slot = object.scope_slot().ok_or(InjectError::Unscopable)?;
    slot.scope
        .set(scope)
        .map_err(|_| InjectError::AlreadyScoped)
}

/// Gets the scope of an object: the scope attached with [`set_scope`], or
/// failing that the scope of its owner. Returns `None` if neither exists.
pub fn get_scope<O>(object: &O) -> Option<Scope>
where
    O: ?Sized + Scopable,
{
    object
        .scope_slot()
        .and_then(ScopeSlot::get)
        .cloned()
        .or_else(|| object.owner())
}

#[cfg(test)]
mod tests {
    use crate::{get_scope, set_scope, InjectError, Scopable, Scope, ScopeSlot};

    struct Owned {
        owner: Scope,
        slot: ScopeSlot,
    }

    impl Scopable for Owned {
        fn scope_slot(&self) -> Option<&ScopeSlot> {
            Some(&self.slot)
        }

        fn owner(&self) -> Option<Scope> {
            Some(self.owner.clone())
        }
    }

    struct Unowned;
    impl Scopable for Unowned {}

    #[test]
    fn set_scope_twice_fails() {
        let slot = ScopeSlot::new();
        let first = Scope::new();
        set_scope(&slot, first.clone()).unwrap();

        match set_scope(&slot, Scope::new()) {
            Err(InjectError::AlreadyScoped) => {}
            Err(error) => Err(error).unwrap(),
            Ok(()) => panic!("scope was attached twice"),
        }

        assert_eq!(Some(first), get_scope(&slot));
    }

    #[test]
    fn attached_scope_wins_over_owner() {
        let owner = Scope::new();
        let attached = Scope::new();
        let object = Owned {
            owner: owner.clone(),
            slot: ScopeSlot::new(),
        };

        assert_eq!(Some(owner), get_scope(&object));

        set_scope(&object, attached.clone()).unwrap();
        assert_eq!(Some(attached), get_scope(&object));
    }

    #[test]
    fn no_scope_is_not_an_error() {
        assert!(get_scope(&Unowned).is_none());
        match set_scope(&Unowned, Scope::new()) {
            Err(InjectError::Unscopable) => {}
            Err(error) => Err(error).unwrap(),
            Ok(()) => panic!("attached a scope to an object without a slot"),
        }
    }

    #[test]
    fn scope_is_its_own_owner() {
        let scope = Scope::new();
        assert_eq!(Some(scope.clone()), get_scope(&scope));
    }
}
