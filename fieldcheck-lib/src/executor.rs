//! Rule execution for a single validation pass.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use futures::future::try_join_all;
use log::trace;

use crate::error::RuleError;
use crate::model::Change;
use crate::model::Failure;
use crate::rule::Rule;
use crate::rule::RuleId;
use crate::rule::RuleSpec;
use crate::rule::Verdict;

type SharedBatch = Shared<BoxFuture<'static, Result<Arc<Vec<Option<Failure>>>, RuleError>>>;

/// Batch results shared between the fields of one validation pass.
///
/// The first field that invokes a batch rule registers the pending batch
/// here; every later field using the same rule instance awaits that batch
/// instead of invoking the rule again.
///
/// A map can also be pre-seeded with results computed earlier and handed to
/// [`Validator::request_with`](crate::validator::Validator::request_with),
/// in which case the seeded rules are not invoked at all.
#[derive(Default)]
pub struct AsyncResults {
    batches: DashMap<RuleId, SharedBatch>,
}

enum Step {
    Ready(Option<Failure>),
    Await(SharedBatch),
}

impl AsyncResults {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a batch result for `rule`.
    pub fn seed(&self, rule: &Rule, results: Vec<Option<Failure>>) {
        let batch: SharedBatch = futures::future::ready(Ok(Arc::new(results))).boxed().shared();
        self.batches.insert(rule.id(), batch);
    }

    /// Returns `true` if a batch for `rule` is registered.
    pub fn contains(&self, rule: &Rule) -> bool {
        self.batches.contains_key(&rule.id())
    }

    /// Returns the number of registered batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Returns `true` if no batch is registered.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Reuses the registered batch for `rule`, or invokes it.
    ///
    /// The rule runs without any lock on the map held, so a rule may itself
    /// inspect the map. Fields of one pass are polled from a single task, so
    /// no other field can register the same rule between lookup and insert.
    fn step(&self, rule: &Rule, change: &Arc<Change>, prop: &str) -> Step {
        if let Some(batch) = self.batches.get(&rule.id()) {
            return Step::Await(batch.clone());
        }
        let pending = match rule.invoke(change, prop) {
            Verdict::Ready(failure) => return Step::Ready(failure),
            Verdict::Pending(pending) => pending,
        };
        trace!("{prop}: started batch for {:?}", rule.id());
        let batch = pending.map(|result| result.map(Arc::new)).boxed().shared();
        match self.batches.entry(rule.id()) {
            Entry::Occupied(entry) => Step::Await(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(batch.clone());
                Step::Await(batch)
            }
        }
    }
}

impl std::fmt::Debug for AsyncResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncResults")
            .field("batches", &self.batches.len())
            .finish()
    }
}

/// Runs the rules of a [`RuleSpec`] against a change.
#[derive(Debug, Clone)]
pub struct RuleExecutor {
    spec: Arc<RuleSpec>,
}

impl RuleExecutor {
    /// Creates an executor for `spec`.
    pub fn new(spec: RuleSpec) -> Self {
        Self {
            spec: Arc::new(spec),
        }
    }

    /// Returns the rules this executor runs.
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Validates every field of `change` that has rules.
    ///
    /// Fields are checked concurrently. For each field the rules run in
    /// order and the first failure wins; passing fields are left out of the
    /// result, so it holds at most one failure per field, in field order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleError`] raised by a batch rule.
    pub async fn execute(
        &self,
        change: &Arc<Change>,
        batches: &AsyncResults,
    ) -> Result<Vec<Failure>, RuleError> {
        let checks = change
            .fields()
            .filter_map(|prop| Some((prop, self.spec.rules(prop)?)))
            .map(|(prop, rules)| check_field(rules, change, prop, batches));

        let outcomes = try_join_all(checks).await?;
        Ok(outcomes.into_iter().flatten().collect())
    }
}

async fn check_field(
    rules: &[Rule],
    change: &Arc<Change>,
    prop: &str,
    batches: &AsyncResults,
) -> Result<Option<Failure>, RuleError> {
    for rule in rules {
        let failure = match batches.step(rule, change, prop) {
            Step::Ready(failure) => failure,
            Step::Await(batch) => {
                let results = batch.await?;
                results.iter().flatten().find(|f| f.prop == prop).cloned()
            }
        };
        if failure.is_some() {
            return Ok(failure);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;

    fn counting_check(rule_type: &'static str, calls: &Arc<AtomicUsize>, bad: &'static str) -> Rule {
        let calls = Arc::clone(calls);
        Rule::check(rule_type, move |value, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            value != bad
        })
    }

    fn counting_batch(rule_type: &'static str, calls: &Arc<AtomicUsize>, bad: &'static str) -> Rule {
        let calls = Arc::clone(calls);
        Rule::batch(move |change: Arc<Change>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(change
                    .iter()
                    .map(|(prop, value)| (value == bad).then(|| Failure::new(rule_type, prop)))
                    .collect())
            }
        })
    }

    #[tokio::test]
    async fn test_first_failure_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = RuleSpec::new().field(
            "field5",
            [
                counting_check("rule1", &calls, "rule1"),
                counting_check("rule2", &calls, "rule1"),
                counting_check("rule3", &calls, "rule1"),
            ],
        );
        let executor = RuleExecutor::new(spec);
        let change = Arc::new(Change::from([("field5", "rule1")]));

        let failures = executor.execute(&change, &AsyncResults::new()).await.unwrap();

        assert_eq!(failures, vec![Failure::new("rule1", "field5")]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ignores_fields_without_rules() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = RuleSpec::new().field("field1", [counting_check("filled", &calls, "")]);
        let executor = RuleExecutor::new(spec);
        let change = Arc::new(Change::from([("field1", "x"), ("unknown", "")]));

        let failures = executor.execute(&change, &AsyncResults::new()).await.unwrap();

        assert!(failures.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shared_batch_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let remote = counting_batch("async1", &calls, "async1");
        let spec = RuleSpec::new()
            .field("field2", [remote.clone()])
            .field("field3", [remote.clone()]);
        let executor = RuleExecutor::new(spec);
        let change = Arc::new(Change::from([("field2", "filled"), ("field3", "async1")]));
        let batches = AsyncResults::new();

        let failures = executor.execute(&change, &batches).await.unwrap();

        assert_eq!(failures, vec![Failure::new("async1", "field3")]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(batches.contains(&remote));
    }

    #[tokio::test]
    async fn test_seeded_batch_is_not_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let remote = counting_batch("async1", &calls, "async1");
        let spec = RuleSpec::new().field("field2", [remote.clone()]);
        let executor = RuleExecutor::new(spec);
        let change = Arc::new(Change::from([("field2", "fine")]));
        let batches = AsyncResults::new();
        batches.seed(&remote, vec![Some(Failure::new("async1", "field2"))]);

        let failures = executor.execute(&change, &batches).await.unwrap();

        assert_eq!(failures, vec![Failure::new("async1", "field2")]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sync_rules_run_before_batch() {
        let sync_calls = Arc::new(AtomicUsize::new(0));
        let batch_calls = Arc::new(AtomicUsize::new(0));
        let spec = RuleSpec::new().field(
            "field5",
            [
                counting_check("rule1", &sync_calls, "rule1"),
                counting_batch("async1", &batch_calls, "async1"),
            ],
        );
        let executor = RuleExecutor::new(spec);

        let rejected = Arc::new(Change::from([("field5", "rule1")]));
        let failures = executor.execute(&rejected, &AsyncResults::new()).await.unwrap();
        assert_eq!(failures, vec![Failure::new("rule1", "field5")]);
        assert_eq!(batch_calls.load(Ordering::SeqCst), 0);

        let remote = Arc::new(Change::from([("field5", "async1")]));
        let failures = executor.execute(&remote, &AsyncResults::new()).await.unwrap();
        assert_eq!(failures, vec![Failure::new("async1", "field5")]);
        assert_eq!(batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rule_may_inspect_batches_while_invoked() {
        let batches = Arc::new(AsyncResults::new());
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let rule = {
            let batches = Arc::clone(&batches);
            let seen = Arc::clone(&seen);
            Rule::batch(move |change: Arc<Change>| {
                seen.store(batches.len(), Ordering::SeqCst);
                async move { Ok(change.fields().map(|_| None).collect()) }
            })
        };
        let executor = RuleExecutor::new(RuleSpec::new().field("field1", [rule]));
        let change = Arc::new(Change::from([("field1", "x")]));

        let failures = executor.execute(&change, &batches).await.unwrap();

        assert!(failures.is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(batches.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_error_propagates() {
        let failing = Rule::batch(|_| async { Err(RuleError::new("service down")) });
        let spec = RuleSpec::new()
            .field("field1", [failing.clone()])
            .field("field2", [failing]);
        let executor = RuleExecutor::new(spec);
        let change = Arc::new(Change::from([("field1", "a"), ("field2", "b")]));

        let err = executor.execute(&change, &AsyncResults::new()).await.unwrap_err();
        assert_eq!(err, RuleError::new("service down"));
    }
}
