//! Rule execution error types

/// Error raised by a rule while evaluating a change.
///
/// Batch rules return this from their future. The error is `Clone` because a
/// batch result is shared by every field that awaits it.
///
/// # Example
///
/// ```
/// use fieldcheck_lib::error::RuleError;
///
/// let err = RuleError::new("lookup service unavailable");
/// assert_eq!(err.message(), "lookup service unavailable");
/// assert_eq!(err.to_string(), "Rule failed: lookup service unavailable");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rule failed: {message}")]
pub struct RuleError {
    message: String,
}

impl RuleError {
    /// Creates a new rule error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a rule error from any displayable error.
    pub fn from_error(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string())
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
