//! Error types

mod rule;
mod validator;

pub use rule::*;
pub use validator::*;
