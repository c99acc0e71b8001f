//! Race-safe field validation.
//!
//! Runs per-field validation rules against incremental changes, coalescing
//! overlapping requests so that only the most recent one delivers a result.

pub mod error;
pub mod executor;
pub mod model;
pub mod rule;
pub mod validator;

pub use validator::Validation;
pub use validator::Validator;
pub use validator::create_validator;
