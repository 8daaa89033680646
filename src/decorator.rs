mod args;
mod dispatch;
mod lazy;

pub use args::*;
pub use dispatch::*;
pub use lazy::*;
