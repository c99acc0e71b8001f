//! Data model: changes and failures

mod change;
mod failure;

pub use change::*;
pub use failure::*;
