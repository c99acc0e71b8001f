//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use fieldcheck_lib::error::RuleError;
use fieldcheck_lib::model::Change;
use fieldcheck_lib::model::Failure;
use fieldcheck_lib::rule::Rule;
use serde_json::Value;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::TestLogger;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// Routes library logs to the test output.
pub fn init_logging() {
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}

pub fn filled(value: &Value, _: &Change) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

/// Counts how often a rule was invoked.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A batch rule that resolves immediately, failing fields whose value is `bad`.
pub fn batch_rule(rule_type: &'static str, bad: &'static str) -> (Rule, Calls) {
    let calls = Calls::default();
    let counter = calls.clone();
    let rule = Rule::batch(move |change: Arc<Change>| {
        counter.hit();
        async move { Ok(fail_matching(&change, rule_type, |value| value == bad)) }
    });
    (rule, calls)
}

/// A synchronous rule failing values equal to `bad`, counting invocations.
pub fn counted_rule(rule_type: &'static str, bad: &'static str) -> (Rule, Calls) {
    let calls = Calls::default();
    let counter = calls.clone();
    let rule = Rule::check(rule_type, move |value, _| {
        counter.hit();
        value != bad
    });
    (rule, calls)
}

/// Controls when the batches of a [`gated_rule`] resolve.
pub struct Gate {
    invocations: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    calls: Calls,
}

impl Gate {
    /// Waits for the next invocation and lets its batch resolve.
    pub async fn release_next(&mut self) {
        let release = self
            .invocations
            .recv()
            .await
            .expect("gated rule was never invoked");
        let _ = release.send(());
    }

    /// Waits for the next invocation and makes its batch fail.
    pub async fn fail_next(&mut self) {
        let release = self
            .invocations
            .recv()
            .await
            .expect("gated rule was never invoked");
        drop(release);
    }

    pub fn calls(&self) -> usize {
        self.calls.count()
    }
}

/// A batch rule whose batches stay pending until released through the
/// returned [`Gate`]. Every field with a value other than `"ok"` fails.
pub fn gated_rule(rule_type: &'static str) -> (Rule, Gate) {
    let (tx, invocations) = mpsc::unbounded_channel();
    let calls = Calls::default();
    let counter = calls.clone();
    let rule = Rule::batch(move |change: Arc<Change>| {
        counter.hit();
        let (release, released) = oneshot::channel();
        let _ = tx.send(release);
        async move {
            released
                .await
                .map_err(|_| RuleError::new("batch abandoned"))?;
            Ok(fail_matching(&change, rule_type, |value| value != "ok"))
        }
    });
    (rule, Gate { invocations, calls })
}

fn fail_matching(
    change: &Change,
    rule_type: &str,
    fails: impl Fn(&Value) -> bool,
) -> Vec<Option<Failure>> {
    change
        .iter()
        .map(|(prop, value)| fails(value).then(|| Failure::new(rule_type, prop)))
        .collect()
}
