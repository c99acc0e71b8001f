//! Payloads attached to failures

use std::sync::Arc;

use serde_json::Value;

use crate::model::Change;
use crate::model::Failure;

type PayloadFn = dyn Fn(&Failure, &Change) -> Value + Send + Sync;

/// Data attached to a failure produced by a built rule.
///
/// # Example
///
/// ```
/// use fieldcheck_lib::rule::Payload;
/// use serde_json::json;
///
/// let message = Payload::from("This field is required");
/// let computed = Payload::computed(|failure, _change| {
///     json!(format!("{} failed {}", failure.prop, failure.rule_type))
/// });
/// ```
#[derive(Clone)]
pub enum Payload {
    /// Attached verbatim to every failure.
    Static(Value),
    /// Called with the failure (`type` and `prop` only) and the change; the
    /// return value becomes the payload.
    Computed(Arc<PayloadFn>),
}

impl Payload {
    /// Creates a computed payload.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Failure, &Change) -> Value + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Resolves the payload for a failure.
    pub fn resolve(&self, failure: &Failure, change: &Change) -> Value {
        match self {
            Self::Static(value) => value.clone(),
            Self::Computed(f) => f(failure, change),
        }
    }

    /// Returns `failure` with its payload set from this payload.
    pub(crate) fn attach(&self, failure: Failure, change: &Change) -> Failure {
        let payload = self.resolve(&failure, change);
        failure.with_payload(payload)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Static(Value::from(value))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Static(Value::from(value))
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}
