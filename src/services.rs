mod class;
mod factory;
mod fallible;
mod service;
mod singleton;

pub use class::*;
pub use factory::*;
pub use fallible::*;
pub use service::*;
pub use singleton::*;
