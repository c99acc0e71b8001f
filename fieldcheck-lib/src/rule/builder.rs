//! Constructors for the common rule shapes.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use super::BatchResult;
use super::Payload;
use super::Rule;
use super::Verdict;
use crate::model::Change;
use crate::model::Failure;

/// Value seen by predicates for fields missing from the change.
static MISSING: Value = Value::Null;

impl Rule {
    /// Creates a synchronous rule from a predicate.
    ///
    /// The predicate receives the field's value and the whole change, and
    /// returns `true` if the value passes. A failing value produces
    /// `Failure { type: rule_type, prop }`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use fieldcheck_lib::model::{Change, Failure};
    /// use fieldcheck_lib::rule::{Rule, Verdict};
    ///
    /// let filled = Rule::check("filled", |value, _| {
    ///     value.as_str().is_some_and(|s| !s.is_empty())
    /// });
    ///
    /// let change = Arc::new(Change::from([("name", "")]));
    /// let Verdict::Ready(failure) = filled.invoke(&change, "name") else {
    ///     unreachable!()
    /// };
    /// assert_eq!(failure, Some(Failure::new("filled", "name")));
    /// ```
    pub fn check<F>(rule_type: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Change) -> bool + Send + Sync + 'static,
    {
        Self::predicate(rule_type.into(), predicate, None)
    }

    /// Creates a synchronous rule whose failures carry a payload.
    pub fn check_with_payload<F>(
        rule_type: impl Into<String>,
        predicate: F,
        payload: impl Into<Payload>,
    ) -> Self
    where
        F: Fn(&Value, &Change) -> bool + Send + Sync + 'static,
    {
        Self::predicate(rule_type.into(), predicate, Some(payload.into()))
    }

    fn predicate<F>(rule_type: String, predicate: F, payload: Option<Payload>) -> Self
    where
        F: Fn(&Value, &Change) -> bool + Send + Sync + 'static,
    {
        Self::new(move |change, prop| {
            let value = change.get(prop).unwrap_or(&MISSING);
            if predicate(value, change.as_ref()) {
                return Verdict::Ready(None);
            }
            let failure = Failure::new(rule_type.as_str(), prop);
            let failure = match &payload {
                Some(payload) => payload.attach(failure, change),
                None => failure,
            };
            Verdict::Ready(Some(failure))
        })
    }

    /// Creates a batch rule.
    ///
    /// `evaluate` is called once per validation pass with the whole change
    /// and must resolve to one entry per field it checked. Entries are
    /// matched to fields by `prop`. Anything `evaluate` does before returning
    /// its future happens at invocation time.
    pub fn batch<F, Fut>(evaluate: F) -> Self
    where
        F: Fn(Arc<Change>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchResult> + Send + 'static,
    {
        Self::new(move |change, _| Verdict::Pending(evaluate(Arc::clone(change)).boxed()))
    }

    /// Creates a batch rule whose failures carry a payload.
    ///
    /// The payload is set on every failure the batch reports; passing
    /// entries stay empty.
    pub fn batch_with_payload<F, Fut>(evaluate: F, payload: impl Into<Payload>) -> Self
    where
        F: Fn(Arc<Change>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchResult> + Send + 'static,
    {
        let payload = payload.into();
        Self::new(move |change, _| {
            let pending = evaluate(Arc::clone(change));
            let change = Arc::clone(change);
            let payload = payload.clone();
            Verdict::Pending(
                async move {
                    let results = pending.await?;
                    Ok(results
                        .into_iter()
                        .map(|entry| entry.map(|failure| payload.attach(failure, &change)))
                        .collect())
                }
                .boxed(),
            )
        })
    }
}
