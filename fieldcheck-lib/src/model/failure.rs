//! Failure: a rule that did not pass for a field

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::Change;

/// Identifies the rule and the field that failed a validation.
///
/// Serializes as `{ "type": ..., "prop": ..., "payload": ... }`; `payload`
/// is omitted when absent.
///
/// # Example
///
/// ```
/// use fieldcheck_lib::model::Failure;
/// use serde_json::json;
///
/// let failure = Failure::new("filled", "username").with_payload("Username is required");
///
/// assert_eq!(failure.rule_type, "filled");
/// assert_eq!(failure.prop, "username");
/// assert_eq!(failure.payload, Some(json!("Username is required")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// Identifies the rule.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Identifies the field.
    pub prop: String,
    /// Application specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Failure {
    /// Creates a failure without a payload.
    pub fn new(rule_type: impl Into<String>, prop: impl Into<String>) -> Self {
        Self {
            rule_type: rule_type.into(),
            prop: prop.into(),
            payload: None,
        }
    }

    /// Attaches a payload, replacing any previous one.
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.prop, self.rule_type)
    }
}

/// Reduces failures to a map of field name to payload.
///
/// Every field of `change` is present in the output; fields without a
/// failure map to `None`. A failure for a field that is not part of `change`
/// is still included.
///
/// # Example
///
/// ```
/// use fieldcheck_lib::model::{Change, Failure, collect_payloads};
/// use serde_json::json;
///
/// let failures = vec![Failure::new("filled", "field1").with_payload("p1")];
/// let change = Change::from([("field1", ""), ("field2", "x")]);
///
/// let payloads = collect_payloads(&failures, &change);
/// assert_eq!(payloads["field1"], Some(json!("p1")));
/// assert_eq!(payloads["field2"], None);
/// ```
pub fn collect_payloads(failures: &[Failure], change: &Change) -> BTreeMap<String, Option<Value>> {
    let mut payloads: BTreeMap<String, Option<Value>> =
        change.fields().map(|field| (field.to_string(), None)).collect();
    for failure in failures {
        payloads.insert(failure.prop.clone(), failure.payload.clone());
    }
    payloads
}
