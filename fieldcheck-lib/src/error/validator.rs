//! Validator error types

use super::RuleError;
use crate::model::Failure;

/// Errors returned by [`Validator::request`](crate::validator::Validator::request).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidatorError {
    /// A newer request superseded this one.
    ///
    /// Callers should ignore it: the newer request delivers the result.
    #[error("Validation request superseded by a newer request")]
    Stale {
        /// Failures computed before the request was found stale, or `None`
        /// if it was superseded while still waiting.
        results: Option<Vec<Failure>>,
    },

    /// A rule failed while the request held the active slot.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl ValidatorError {
    /// Creates a stale request error.
    pub fn stale(results: Option<Vec<Failure>>) -> Self {
        Self::Stale { results }
    }

    /// Returns `true` if the request was superseded.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    /// Returns the failures carried by a stale request, if any were computed.
    pub fn stale_results(&self) -> Option<&[Failure]> {
        match self {
            Self::Stale { results } => results.as_deref(),
            _ => None,
        }
    }

    /// Returns the rule error if a rule failed.
    pub fn rule_error(&self) -> Option<&RuleError> {
        match self {
            Self::Rule(err) => Some(err),
            _ => None,
        }
    }
}
