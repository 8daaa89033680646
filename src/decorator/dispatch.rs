use crate::{
    service, DecoratorArg, DecoratorContext, InjectError, InjectResult,
    MemberKind, PropertyDescriptor, Scopable, Service, ServiceFactory,
    ServiceMember, ServiceResolver, Svc,
};
use std::fmt::{self, Debug, Formatter};
use tracing::trace;

/// Whether the arguments are a legacy `(target, key, descriptor)` call.
#[must_use]
pub fn detect_legacy(args: &[DecoratorArg]) -> bool {
    match args {
        [_, DecoratorArg::Key(_), DecoratorArg::Descriptor(descriptor)] => {
            descriptor.configurable.is_some() && descriptor.enumerable.is_some()
        }
        _ => false,
    }
}

/// Whether the arguments are a stage-3 `(value, context)` call.
#[must_use]
pub fn detect_stage_three(args: &[DecoratorArg]) -> bool {
    matches!(args, [_, DecoratorArg::Context(_)])
}

/// A service decorator: applies a resolver to the members of a class.
pub struct ServiceDecorator<T> {
    resolver: Svc<dyn ServiceResolver<T>>,
}

impl<T> Clone for ServiceDecorator<T> {
    fn clone(&self) -> Self {
        ServiceDecorator {
            resolver: self.resolver.clone(),
        }
    }
}

impl<T> Debug for ServiceDecorator<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDecorator")
            .field("service", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Service> ServiceDecorator<T> {
    /// Applies the decorator to the element described by `args`. Only
    /// instance fields and instance auto-accessors are accepted.
    pub fn apply(
        &self,
        args: &[DecoratorArg],
    ) -> InjectResult<ServiceMember<T>> {
        match args {
            [
                target,
                DecoratorArg::Key(name),
                DecoratorArg::Descriptor(descriptor),
            ] if detect_legacy(args) => {
                self.apply_legacy(target, name, descriptor)
            }
            [_, DecoratorArg::Context(context)] => {
                self.apply_stage_three(context)
            }
            [DecoratorArg::Class { name }] => Err(class_error(name.as_deref())),
            _ => {
                trace!(arguments = args.len(), "unrecognized decorator call");
                Err(InjectError::InvalidDecoratorUsage {
                    construct: "unknown".to_owned(),
                    message: "Invalid @service decorator call".to_owned(),
                })
            }
        }
    }

    fn apply_legacy(
        &self,
        target: &DecoratorArg,
        name: &str,
        descriptor: &PropertyDescriptor,
    ) -> InjectResult<ServiceMember<T>> {
        let kind = if descriptor.value_is_function {
            MemberKind::Method
        } else if descriptor.has_get {
            MemberKind::Getter
        } else if descriptor.has_set {
            MemberKind::Setter
        } else {
            MemberKind::Field
        };

        let context = DecoratorContext {
            kind,
            name: Some(name.to_owned()),
            is_static: matches!(target, DecoratorArg::Class { .. }),
            is_private: false,
        };

        if kind == MemberKind::Field && !context.is_static {
            if descriptor.has_initializer {
                return Err(field_initializer_error(name));
            }

            // Legacy fields become accessors on the prototype.
            return self.apply_stage_three(&DecoratorContext {
                kind: MemberKind::Accessor,
                ..context
            });
        }

        self.apply_stage_three(&context)
    }

    fn apply_stage_three(
        &self,
        context: &DecoratorContext,
    ) -> InjectResult<ServiceMember<T>> {
        let name = context.name.as_deref();
        match context.kind {
            MemberKind::Class => Err(class_error(name)),
            MemberKind::Method | MemberKind::Getter | MemberKind::Setter => {
                Err(member_error(context))
            }
            MemberKind::Field | MemberKind::Accessor if context.is_static => {
                Err(static_field_error(context))
            }
            kind @ (MemberKind::Field | MemberKind::Accessor) => {
                let name = name.unwrap_or("someField").to_owned();
                trace!(kind = %kind, name = %name, "decorating service member");
                Ok(ServiceMember::new(kind, name, self.resolver.clone()))
            }
        }
    }
}

fn class_error(name: Option<&str>) -> InjectError {
    let name = name.filter(|name| !name.is_empty()).unwrap_or("MyClass");
    InjectError::InvalidDecoratorUsage {
        construct: "class".to_owned(),
        message: format!(
            concat!(
                "The @service decorator cannot be used on a class.\n",
                "\n",
                "  @service(...)\n",
                "  ~~~~~~~~~~~~~ this is not allowed\n",
                "  class {name} {{\n",
                "    ...\n",
                "  }}\n",
                "\n",
                "Please remove the @service decorator from this class."
            ),
            name = name
        ),
    }
}

fn member_error(context: &DecoratorContext) -> InjectError {
    let name = context.name.as_deref().filter(|name| !name.is_empty());
    let mut signature = match context.kind {
        MemberKind::Method => format!("{}()", name.unwrap_or("someMethod")),
        MemberKind::Getter => format!("get {}()", name.unwrap_or("someField")),
        _ => format!("set {}(value)", name.unwrap_or("someField")),
    };
    let mut label = context.kind.to_string();

    if context.is_static {
        signature = format!("static {signature}");
        label = format!("static {label}");
    }

    InjectError::InvalidDecoratorUsage {
        message: format!(
            concat!(
                "The @service decorator cannot be used on a {label}.\n",
                "\n",
                "  class MyClass {{\n",
                "    @service(...) {signature} {{\n",
                "    ~~~~~~~~~~~~~ this is not allowed\n",
                "      ...\n",
                "    }}\n",
                "  }}\n",
                "\n",
                "Please remove the @service decorator from this {label}."
            ),
            label = label,
            signature = signature
        ),
        construct: label,
    }
}

fn static_field_error(context: &DecoratorContext) -> InjectError {
    let name = context
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or("someField");
    let (construct, declaration) = match context.kind {
        MemberKind::Accessor => {
            ("static accessor field", format!("static accessor {name}"))
        }
        _ => ("static field", format!("static {name}")),
    };

    InjectError::InvalidDecoratorUsage {
        construct: construct.to_owned(),
        message: format!(
            concat!(
                "The @service decorator cannot be used on a {construct}.\n",
                "\n",
                "  class MyClass {{\n",
                "    @service(...) {declaration};\n",
                "                  ~~~~~~ this is not allowed\n",
                "  }}\n",
                "\n",
                "Please remove the static keyword from this field."
            ),
            construct = construct,
            declaration = declaration
        ),
    }
}

fn field_initializer_error(name: &str) -> InjectError {
    InjectError::InvalidDecoratorUsage {
        construct: "field with an initializer".to_owned(),
        message: format!(
            concat!(
                "The @service decorator cannot be used on a field with an ",
                "initializer.\n",
                "\n",
                "  class MyClass {{\n",
                "    @service(...) {name} = ...;\n",
                "  }}\n",
                "\n",
                "Please remove the initializer from this field."
            ),
            name = name
        ),
    }
}

/// Builds a decorator around a resolver. The resolver receives the object a
/// decorated member is read on, together with the member's name.
///
/// ```
/// use polaris_service::{
///     decorator_for, DecoratorArg, DecoratorContext, MemberKind, Scopable,
///     ScopeSlot, Svc,
/// };
///
/// let decorator =
///     decorator_for(|_: &dyn Scopable, name: &str| Ok(Svc::new(name.len())));
/// let context = DecoratorContext::new(MemberKind::Field, "clock");
/// let member = decorator
///     .apply(&[DecoratorArg::Undefined, DecoratorArg::Context(context)])
///     .unwrap();
///
/// let field = member.init(&DecoratorArg::Undefined).unwrap();
/// assert_eq!(5, *field.get(&ScopeSlot::new()).unwrap());
/// ```
#[must_use]
pub fn decorator_for<T, R>(resolver: R) -> ServiceDecorator<T>
where
    T: Service,
    R: Fn(&dyn Scopable, &str) -> InjectResult<Svc<T>> + Service,
{
    ServiceDecorator {
        resolver: Svc::new(resolver),
    }
}

/// Builds a decorator resolving `factory` in the scope of the object a
/// decorated member is read on. See [`service`].
#[must_use]
pub fn service_decorator<T: Service>(
    factory: &ServiceFactory<T>,
) -> ServiceDecorator<T> {
    let factory = factory.clone();
    decorator_for(move |receiver: &dyn Scopable, _name: &str| {
        service(receiver, &factory)
    })
}
