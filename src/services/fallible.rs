use crate::{
    services::factory::ScopeFn, Definition, DynError, FactoryFn, IntoFactory,
    Scope, Service, ServiceFactory,
};
use std::{error::Error, marker::PhantomData};

struct Fallible<F, E> {
    create: F,
    marker: PhantomData<fn() -> E>,
}

impl<T, E, F> ScopeFn<T> for Fallible<F, E>
where
    T: Service,
    E: Error + Service,
    F: Fn(&Scope) -> Result<T, E> + Service,
{
    fn call(&self, scope: &Scope) -> Result<T, DynError> {
        (self.create)(scope).map_err(|error| Box::new(error) as DynError)
    }
}

/// Creates a service factory from a function that may fail. If the function
/// returns an error, the lookup fails with
/// [`InjectError::ActivationFailed`](crate::InjectError::ActivationFailed)
/// and nothing is cached, so the next lookup calls the function again.
///
/// ```
/// use polaris_service::{lookup, try_factory, InjectError, Scope};
/// use std::{
///     error::Error,
///     fmt::{Display, Formatter},
/// };
///
/// #[derive(Debug)]
/// struct NoDatabase;
///
/// impl Error for NoDatabase {}
/// impl Display for NoDatabase {
///     fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
///         write!(f, "no database configured")
///     }
/// }
///
/// struct Database;
///
/// let database = try_factory(|_: &Scope| -> Result<Database, NoDatabase> {
///     Err(NoDatabase)
/// });
///
/// match lookup(&Scope::new(), &database) {
///     Err(InjectError::ActivationFailed { .. }) => {},
///     Err(error) => Err(error).unwrap(),
///     Ok(_) => unreachable!("activation should have failed"),
/// }
/// ```
#[must_use]
pub fn try_factory<T, E, F>(create: F) -> ServiceFactory<T>
where
    T: Service,
    E: Error + Service,
    F: Fn(&Scope) -> Result<T, E> + Service,
{
    let label = std::any::type_name::<F>();
    let create = Fallible {
        create,
        marker: PhantomData,
    };

    Definition::with_label(label, FactoryFn::from_scope_fn(label, create))
        .into_factory()
}

#[cfg(test)]
mod tests {
    use crate::{lookup, try_factory, InjectError, Scope};
    use std::{error::Error, fmt};

    #[derive(Debug)]
    struct Refused(&'static str);

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "refused: {}", self.0)
        }
    }

    impl Error for Refused {}

    #[test]
    fn error_becomes_activation_failure() {
        let refusing = try_factory(|_: &Scope| -> Result<u8, Refused> {
            Err(Refused("no"))
        });

        match lookup(&Scope::new(), &refusing) {
            Err(error @ InjectError::ActivationFailed { .. }) => {
                assert_eq!("refused: no", error.source().unwrap().to_string());
            }
            Err(error) => Err(error).unwrap(),
            Ok(_) => panic!("activation should have failed"),
        }
    }

    #[test]
    fn success_is_cached() {
        let fine = try_factory(|scope: &Scope| -> Result<u64, Refused> {
            Ok(scope.id())
        });
        let scope = Scope::new();

        let first = lookup(&scope, &fine).unwrap();
        let second = lookup(&scope, &fine).unwrap();
        assert!(crate::Svc::ptr_eq(&first, &second));
    }
}
