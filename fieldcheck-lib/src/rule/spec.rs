//! Per-field rule lists

use std::collections::BTreeMap;

use super::Rule;

/// The rules that apply to each field, in evaluation order.
///
/// A spec is handed to a [`Validator`](crate::validator::Validator) when it
/// is created and is not changed afterwards.
#[derive(Debug, Clone, Default)]
pub struct RuleSpec {
    fields: BTreeMap<String, Vec<Rule>>,
}

impl RuleSpec {
    /// Creates an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rules for a field, replacing any previous list.
    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.insert(name.into(), rules.into_iter().collect());
        self
    }

    /// Returns the rules for a field.
    pub fn rules(&self, field: &str) -> Option<&[Rule]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Returns `true` if the spec has rules for the field.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterates over the field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the number of fields with rules.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field has rules.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
