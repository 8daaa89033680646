use derive_more::Display;

/// The kind of class element a decorator is applied to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum MemberKind {
    /// The class itself.
    #[display(fmt = "class")]
    Class,
    /// A method.
    #[display(fmt = "method")]
    Method,
    /// A getter.
    #[display(fmt = "getter")]
    Getter,
    /// A setter.
    #[display(fmt = "setter")]
    Setter,
    /// A field.
    #[display(fmt = "field")]
    Field,
    /// An auto-accessor field.
    #[display(fmt = "accessor")]
    Accessor,
}

/// The context object of a stage-3 decorator call.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DecoratorContext {
    /// The element being decorated.
    pub kind: MemberKind,
    /// The name of the element, if it has a printable one.
    pub name: Option<String>,
    /// Whether the element is static.
    pub is_static: bool,
    /// Whether the element is private.
    pub is_private: bool,
}

impl DecoratorContext {
    /// A context for a public instance element.
    #[must_use]
    pub fn new(kind: MemberKind, name: impl Into<String>) -> Self {
        DecoratorContext {
            kind,
            name: Some(name.into()),
            is_static: false,
            is_private: false,
        }
    }

    /// Marks the element as static.
    #[must_use]
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// The property descriptor of a legacy decorator call. Only the shape of the
/// descriptor matters, so it records which members are present rather than
/// their values.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct PropertyDescriptor {
    /// The `configurable` flag, if present.
    pub configurable: Option<bool>,
    /// The `enumerable` flag, if present.
    pub enumerable: Option<bool>,
    /// Whether `value` is a function, which makes the property a method.
    pub value_is_function: bool,
    /// Whether the property has a getter.
    pub has_get: bool,
    /// Whether the property has a setter.
    pub has_set: bool,
    /// Whether the field was declared with an initializer.
    pub has_initializer: bool,
}

impl PropertyDescriptor {
    /// The descriptor of a plain field without an initializer.
    #[must_use]
    pub fn field() -> Self {
        PropertyDescriptor {
            configurable: Some(true),
            enumerable: Some(true),
            ..PropertyDescriptor::default()
        }
    }
}

/// One argument of a decorator call, described by its shape.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DecoratorArg {
    /// `undefined`.
    Undefined,
    /// A class constructor.
    Class {
        /// The class name, if it has one.
        name: Option<String>,
    },
    /// A function which is not a class.
    Function,
    /// Any other object, such as a class prototype.
    Object,
    /// A property key.
    Key(String),
    /// A legacy property descriptor.
    Descriptor(PropertyDescriptor),
    /// A stage-3 decorator context.
    Context(DecoratorContext),
    /// The `{ get, set }` target passed to an auto-accessor decorator.
    Accessor,
    /// Anything else.
    Other,
}
