//! Request coordination.
//!
//! A [`Validator`] accumulates partial changes and runs the rules for the
//! accumulated change, one pass at a time. Bursts of overlapping requests
//! (one per keystroke, say) collapse into a single result: only the most
//! recent request resolves, every request it overtook fails with
//! [`ValidatorError::Stale`].
//!
//! # Example
//!
//! ```
//! use fieldcheck_lib::model::{Change, Failure};
//! use fieldcheck_lib::rule::{Rule, RuleSpec};
//! use fieldcheck_lib::validator::create_validator;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let filled = Rule::check("filled", |value, _| {
//!     value.as_str().is_some_and(|s| !s.is_empty())
//! });
//! let validator = create_validator(RuleSpec::new().field("name", [filled]));
//!
//! let validation = validator.request(Some(Change::from([("name", "")]))).await?;
//! assert_eq!(validation.failures, vec![Failure::new("filled", "name")]);
//! # Ok::<(), fieldcheck_lib::error::ValidatorError>(())
//! # }).unwrap();
//! ```
//!
//! # Hung rules
//!
//! The validator enforces no timeouts. A batch rule that never resolves keeps
//! the active slot, and every later request waits behind it. Wrap slow rules
//! in a timeout of their own if that matters.

mod config;
mod session;

pub use config::*;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use log::debug;
use log::trace;
use log::warn;
use serde_json::Value;
use tokio::sync::oneshot;

use self::session::Admission;
use self::session::Session;
use crate::error::ValidatorError;
use crate::executor::AsyncResults;
use crate::executor::RuleExecutor;
use crate::model::Change;
use crate::model::Failure;
use crate::model::collect_payloads;
use crate::rule::RuleSpec;

/// Creates a validator for `spec` with the default configuration.
pub fn create_validator(spec: RuleSpec) -> Validator {
    Validator::new(spec)
}

/// Result of a request that was not superseded.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    /// One failure per failing field.
    pub failures: Vec<Failure>,
    /// The accumulated change the failures were computed for.
    pub change: Change,
}

impl Validation {
    /// Returns `true` if no field failed.
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Maps every field of the change to the payload of its failure.
    ///
    /// See [`collect_payloads`].
    pub fn payloads(&self) -> BTreeMap<String, Option<Value>> {
        collect_payloads(&self.failures, &self.change)
    }

    /// Splits into failures and change.
    pub fn into_parts(self) -> (Vec<Failure>, Change) {
        (self.failures, self.change)
    }
}

/// Coordinates validation requests against one [`RuleSpec`].
///
/// Cheap to clone; clones share the same session, so requests issued through
/// any clone supersede each other.
///
/// Each request:
///
/// 1. merges its partial change into the accumulated change,
/// 2. takes the next sequence token,
/// 3. waits in FIFO order while another request holds the active slot,
/// 4. runs the rules on the accumulated change, or reuses the last result
///    if the accumulated change is the same one that produced it,
/// 5. resolves only if no newer request was issued in the meantime.
///
/// A request that resolves ends the cycle: the accumulated change, the
/// cached result and the sequence are reset.
#[derive(Clone)]
pub struct Validator {
    inner: Arc<ValidatorInner>,
}

struct ValidatorInner {
    executor: RuleExecutor,
    config: ValidatorConfig,
    session: Mutex<Session>,
}

impl ValidatorInner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds the active slot; dropping it hands the slot on.
struct ActiveSlot<'a> {
    inner: &'a ValidatorInner,
    held: bool,
}

impl<'a> ActiveSlot<'a> {
    fn new(inner: &'a ValidatorInner) -> Self {
        Self { inner, held: true }
    }

    /// Releases the slot and returns the locked session.
    fn release(mut self) -> MutexGuard<'a, Session> {
        self.held = false;
        let mut session = self.inner.lock();
        session.release();
        session
    }
}

impl Drop for ActiveSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            self.inner.lock().release();
        }
    }
}

/// A queued request's claim on the active slot.
///
/// If the request is dropped after the slot was granted but before it ran,
/// the grant is handed back on drop.
struct PendingAdmission<'a> {
    inner: &'a ValidatorInner,
    admission: Option<oneshot::Receiver<Admission>>,
}

impl<'a> PendingAdmission<'a> {
    fn new(inner: &'a ValidatorInner, admission: oneshot::Receiver<Admission>) -> Self {
        Self {
            inner,
            admission: Some(admission),
        }
    }

    /// Waits for the decision; `true` means the caller now holds the slot.
    async fn granted(mut self) -> bool {
        let Some(admission) = self.admission.as_mut() else {
            return false;
        };
        let granted = matches!(admission.await, Ok(Admission::Granted));
        self.admission = None;
        granted
    }
}

impl Drop for PendingAdmission<'_> {
    fn drop(&mut self) {
        if let Some(mut admission) = self.admission.take() {
            admission.close();
            if admission.try_recv() == Ok(Admission::Granted) {
                self.inner.lock().release();
            }
        }
    }
}

impl Validator {
    /// Creates a validator with the default configuration.
    pub fn new(spec: RuleSpec) -> Self {
        Self::with_config(spec, ValidatorConfig::default())
    }

    /// Creates a validator with a custom configuration.
    pub fn with_config(spec: RuleSpec, config: ValidatorConfig) -> Self {
        Self {
            inner: Arc::new(ValidatorInner {
                executor: RuleExecutor::new(spec),
                config,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.inner.config
    }

    /// Returns the rules this validator runs.
    pub fn spec(&self) -> &RuleSpec {
        self.inner.executor.spec()
    }

    /// Returns a copy of the change accumulated in the current cycle.
    pub fn accumulated(&self) -> Change {
        Change::clone(self.inner.lock().change())
    }

    /// Returns `true` while a request runs the rules.
    pub fn is_active(&self) -> bool {
        self.inner.lock().is_active()
    }

    /// Returns the number of requests waiting for the active slot.
    pub fn queued(&self) -> usize {
        self.inner.lock().queued()
    }

    /// Validates the accumulated change after merging `change` into it.
    ///
    /// Pass `None` to validate the accumulated change as it is.
    ///
    /// # Errors
    ///
    /// - [`ValidatorError::Stale`] if a newer request was issued before this
    ///   one could deliver its result.
    /// - [`ValidatorError::Rule`] if a rule failed while this request ran
    ///   the rules.
    pub async fn request(&self, change: Option<Change>) -> Result<Validation, ValidatorError> {
        self.request_with(change, AsyncResults::new()).await
    }

    /// Like [`request`](Self::request), reusing the batch results in
    /// `batches` instead of invoking those rules again.
    ///
    /// `batches` is only consulted if this request actually runs the rules.
    pub async fn request_with(
        &self,
        change: Option<Change>,
        batches: AsyncResults,
    ) -> Result<Validation, ValidatorError> {
        let inner = &*self.inner;
        let name = inner.config.name.as_str();

        let (token, admission) = {
            let mut session = inner.lock();
            if let Some(partial) = change {
                debug!("{name}: merging {} field(s)", partial.len());
                session.merge(partial);
            }
            let token = session.next_token();
            trace!("{name}: request {token} issued");
            if session.try_activate() {
                (token, None)
            } else {
                (token, Some(session.enqueue(token)))
            }
        };

        if let Some(admission) = admission {
            debug!("{name}: request {token} queued");
            if !PendingAdmission::new(inner, admission).granted().await {
                debug!("{name}: request {token} superseded while queued");
                return Err(ValidatorError::stale(None));
            }
        }

        let slot = ActiveSlot::new(inner);
        let current = {
            let session = inner.lock();
            session.is_current(token).then(|| {
                let reuse = inner.config.reuse_results.then(|| session.cached()).flatten();
                (Arc::clone(session.change()), reuse)
            })
        };
        let Some((change, reuse)) = current else {
            drop(slot);
            debug!("{name}: request {token} superseded before running");
            return Err(ValidatorError::stale(None));
        };

        let result = match reuse {
            Some(failures) => {
                debug!("{name}: request {token} reusing result");
                Ok(failures)
            }
            None => {
                trace!("{name}: request {token} running rules on {} field(s)", change.len());
                inner.executor.execute(&change, &batches).await
            }
        };

        let mut session = slot.release();
        let failures = match result {
            Ok(failures) => failures,
            Err(err) => {
                warn!("{name}: request {token} failed: {err}");
                if session.is_current(token) {
                    session.finish_cycle();
                }
                return Err(err.into());
            }
        };

        if inner.config.reuse_results {
            session.store(&change, &failures);
        }
        if !session.is_current(token) {
            debug!("{name}: request {token} superseded while running");
            return Err(ValidatorError::stale(Some(failures)));
        }

        session.finish_cycle();
        drop(session);
        debug!("{name}: request {token} completed with {} failure(s)", failures.len());
        Ok(Validation {
            failures,
            change: Arc::unwrap_or_clone(change),
        })
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("name", &self.inner.config.name)
            .field("fields", &self.inner.executor.spec().len())
            .finish()
    }
}
