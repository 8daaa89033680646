#[allow(clippy::module_inception)]
mod scope;
mod slot;
mod table;

pub use scope::*;
pub use slot::*;
pub use table::*;
