//! Per-validator session state.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::model::Change;
use crate::model::Failure;

/// Decision handed to a queued request when the active slot is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Admission {
    /// The request now holds the active slot.
    Granted,
    /// A newer request exists; the queued one must give up.
    Superseded,
}

struct Waiter {
    token: u64,
    admit: oneshot::Sender<Admission>,
}

/// Last computed failures and the accumulated change they belong to.
struct CachedResult {
    change: Arc<Change>,
    failures: Vec<Failure>,
}

/// State shared by all requests of one validator during a cycle.
///
/// Only `sequence` and `waiting` survive a won cycle; everything else is
/// reset by [`Session::finish_cycle`].
#[derive(Default)]
pub(super) struct Session {
    change: Arc<Change>,
    cache: Option<CachedResult>,
    sequence: u64,
    active: bool,
    waiting: VecDeque<Waiter>,
}

impl Session {
    /// Lays `partial` over the accumulated change.
    ///
    /// Always produces a new accumulated change, which invalidates the cache.
    pub(super) fn merge(&mut self, partial: Change) {
        self.change = Arc::new(self.change.merged(partial));
        self.cache = None;
    }

    pub(super) fn next_token(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub(super) fn is_current(&self, token: u64) -> bool {
        self.sequence == token
    }

    pub(super) fn change(&self) -> &Arc<Change> {
        &self.change
    }

    pub(super) fn is_active(&self) -> bool {
        self.active
    }

    pub(super) fn queued(&self) -> usize {
        self.waiting.len()
    }

    /// Takes the active slot if it is free.
    pub(super) fn try_activate(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        true
    }

    /// Queues a request behind the active one.
    pub(super) fn enqueue(&mut self, token: u64) -> oneshot::Receiver<Admission> {
        let (admit, admission) = oneshot::channel();
        self.waiting.push_back(Waiter { token, admit });
        admission
    }

    /// Frees the active slot and answers every queued request in FIFO order.
    ///
    /// The queued request holding the current token is handed the slot; all
    /// others are superseded. A request that was dropped while queued is
    /// skipped.
    pub(super) fn release(&mut self) {
        self.active = false;
        while let Some(waiter) = self.waiting.pop_front() {
            if waiter.token == self.sequence {
                if waiter.admit.send(Admission::Granted).is_ok() {
                    self.active = true;
                }
            } else {
                let _ = waiter.admit.send(Admission::Superseded);
            }
        }
    }

    /// Returns the cached failures if they belong to the current change.
    pub(super) fn cached(&self) -> Option<Vec<Failure>> {
        self.cache
            .as_ref()
            .filter(|cache| Arc::ptr_eq(&cache.change, &self.change))
            .map(|cache| cache.failures.clone())
    }

    /// Caches `failures` for `change`, unless a merge has replaced it since.
    pub(super) fn store(&mut self, change: &Arc<Change>, failures: &[Failure]) {
        if Arc::ptr_eq(change, &self.change) {
            self.cache = Some(CachedResult {
                change: Arc::clone(change),
                failures: failures.to_vec(),
            });
        }
    }

    /// Ends the cycle, returning the accumulated change.
    pub(super) fn finish_cycle(&mut self) -> Arc<Change> {
        self.cache = None;
        self.sequence = 0;
        std::mem::take(&mut self.change)
    }
}
