use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) trait MapContainerEx<T> {
    fn with_inner<R, F: FnOnce(&T) -> R>(&self, f: F) -> R;
    fn with_inner_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R;
}

/// Process-wide state. In the `rc` configuration services are bound to the
/// thread that created them, so "process-wide" state is kept per thread.
pub(crate) trait ProcessWide<T> {
    fn with_mut<R, F: FnOnce(&mut T) -> R>(&'static self, f: F) -> R;
}

#[cfg(feature = "rc")]
mod types {
    use super::{MapContainerEx, ProcessWide};
    use std::{cell::RefCell, rc::Rc, thread::LocalKey};

    pub type Lock<T> = RefCell<T>;
    pub type MapContainer<T> = Rc<RefCell<T>>;
    pub type OnceSlot<T> = once_cell::unsync::OnceCell<T>;
    pub type Global<T> = LocalKey<RefCell<T>>;

    impl<T> MapContainerEx<T> for Lock<T> {
        fn with_inner<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
            f(&*self.borrow())
        }

        fn with_inner_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
            f(&mut *self.borrow_mut())
        }
    }

    impl<T: 'static> ProcessWide<T> for Global<T> {
        fn with_mut<R, F: FnOnce(&mut T) -> R>(&'static self, f: F) -> R {
            self.with(|cell| f(&mut *cell.borrow_mut()))
        }
    }

    macro_rules! process_wide {
        ($(#[$attr:meta])* static $name:ident: $ty:ty = $init:expr;) => {
            thread_local! {
                $(#[$attr])*
                static $name: ::std::cell::RefCell<$ty> =
                    ::std::cell::RefCell::new($init);
            }
        };
    }

    pub(crate) use process_wide;
}

#[cfg(feature = "arc")]
mod types {
    use super::{MapContainerEx, ProcessWide};
    use once_cell::sync::Lazy;
    use std::sync::{Arc, Mutex, PoisonError};

    pub type Lock<T> = Mutex<T>;
    pub type MapContainer<T> = Arc<Mutex<T>>;
    pub type OnceSlot<T> = once_cell::sync::OnceCell<T>;
    pub type Global<T> = Lazy<Mutex<T>>;

    impl<T> MapContainerEx<T> for Lock<T> {
        fn with_inner<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
            f(&*self.lock().unwrap_or_else(PoisonError::into_inner))
        }

        fn with_inner_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
            f(&mut *self.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    impl<T: Send> ProcessWide<T> for Global<T> {
        fn with_mut<R, F: FnOnce(&mut T) -> R>(&'static self, f: F) -> R {
            f(&mut *self.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    macro_rules! process_wide {
        ($(#[$attr:meta])* static $name:ident: $ty:ty = $init:expr;) => {
            $(#[$attr])*
            static $name: $crate::container::Global<$ty> =
                ::once_cell::sync::Lazy::new(|| ::std::sync::Mutex::new($init));
        };
    }

    pub(crate) use process_wide;
}

#[allow(clippy::wildcard_imports)]
pub(crate) use types::*;

/// Returns a fresh, never reused identifier. Zero is reserved for "not yet
/// assigned".
pub(crate) fn next_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// An identity assigned on first use, so it can live in a `static`.
#[derive(Debug)]
pub(crate) struct LazyId {
    id: AtomicU64,
}

impl LazyId {
    pub(crate) const fn new() -> Self {
        LazyId {
            id: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self) -> u64 {
        let current = self.id.load(Ordering::Acquire);
        if current != 0 {
            return current;
        }

        let fresh = next_id();
        match self.id.compare_exchange(
            0,
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => fresh,
            Err(existing) => existing,
        }
    }
}
