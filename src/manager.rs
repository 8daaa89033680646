#[allow(clippy::module_inception)]
mod manager;
mod token;

pub use manager::*;
pub use token::{
    AsFactoryToken, Definition, FactoryId, FactoryToken, ServiceFactory,
};
