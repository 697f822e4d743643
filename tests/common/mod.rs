pub mod fixtures;
pub mod scripted;

pub use fixtures::*;
pub use scripted::*;
