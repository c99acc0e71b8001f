//! Validation rules.
//!
//! A [`Rule`] checks one field of a [`Change`]. Its invocation yields a
//! [`Verdict`]: either an immediate outcome, or a pending batch that
//! evaluates every field of the change at once (used for rules that must
//! group network or IO calls).
//!
//! # Example
//!
//! ```
//! use fieldcheck_lib::rule::{Rule, RuleSpec};
//! use fieldcheck_lib::model::Failure;
//!
//! let filled = Rule::check("filled", |value, _| {
//!     value.as_str().is_some_and(|s| !s.is_empty())
//! });
//! let taken = Rule::batch(|change| async move {
//!     Ok(change
//!         .iter()
//!         .map(|(prop, value)| (value == "admin").then(|| Failure::new("taken", prop)))
//!         .collect())
//! });
//!
//! let spec = RuleSpec::new()
//!     .field("username", [filled.clone(), taken.clone()])
//!     .field("nickname", [taken]);
//! assert_eq!(spec.len(), 2);
//! ```

mod builder;
mod payload;
mod spec;

pub use payload::*;
pub use spec::*;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::RuleError;
use crate::model::Change;
use crate::model::Failure;

/// Outcome of a batch rule: one entry per evaluated field, `None` for fields
/// that pass.
pub type BatchResult = Result<Vec<Option<Failure>>, RuleError>;

/// Result of invoking a rule for one field.
pub enum Verdict {
    /// The rule decided synchronously.
    Ready(Option<Failure>),
    /// The rule started a batch evaluation of the whole change.
    Pending(BoxFuture<'static, BatchResult>),
}

impl std::fmt::Debug for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(failure) => f.debug_tuple("Ready").field(failure).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

type RuleFn = dyn Fn(&Arc<Change>, &str) -> Verdict + Send + Sync;

/// Stable identity of a [`Rule`].
///
/// Clones of a rule share an identity; separately constructed rules never do,
/// even when built from the same closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);

/// A validation rule.
///
/// Cheap to clone; clones share the underlying closure and therefore the
/// same [`RuleId`]. Reusing one rule instance for several fields is what lets
/// a batch rule run once per validation pass.
#[derive(Clone)]
pub struct Rule {
    check: Arc<RuleFn>,
}

impl Rule {
    /// Creates a rule from a raw closure.
    ///
    /// The closure receives the change under validation and the field being
    /// checked. Prefer [`Rule::check`] and [`Rule::batch`] for the common
    /// cases.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Arc<Change>, &str) -> Verdict + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }

    /// Returns the identity of this rule.
    pub fn id(&self) -> RuleId {
        RuleId(Arc::as_ptr(&self.check) as *const () as usize)
    }

    /// Invokes the rule for `prop`.
    pub fn invoke(&self, change: &Arc<Change>, prop: &str) -> Verdict {
        (self.check)(change, prop)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Rule {}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.id()).finish()
    }
}
