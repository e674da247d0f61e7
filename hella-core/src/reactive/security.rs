//! Limits Guard
//!
//! Bookkeeping for the abuse limits: the dependency set each effect recorded on
//! its last run, and the last-known subscriber count of each signal.
//!
//! Records are keyed by stable IDs and removed explicitly when an effect is
//! disposed or a signal is dropped, so nothing here keeps a reactive value
//! alive and limit checks never depend on collection timing.
//!
//! The guard makes no control-flow decisions of its own. Callers ask the
//! threshold questions and raise the errors.

use std::collections::HashMap;

use indexmap::IndexSet;

use super::subscriber::{SignalId, SubscriberId};
use crate::config::Limits;

/// Dependency set of one effect, in the order the signals were first read.
pub type DependencySet = IndexSet<SignalId>;

/// Per-runtime limits bookkeeping.
#[derive(Debug, Default)]
pub struct LimitsGuard {
    limits: Limits,
    effect_dependencies: HashMap<SubscriberId, DependencySet>,
    signal_subscribers: HashMap<SignalId, usize>,
}

impl LimitsGuard {
    /// Create a guard enforcing the given ceilings.
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            effect_dependencies: HashMap::new(),
            signal_subscribers: HashMap::new(),
        }
    }

    /// Associate an effect with the dependency set of its latest run.
    pub fn record_dependencies(&mut self, effect: SubscriberId, deps: DependencySet) {
        self.effect_dependencies.insert(effect, deps);
    }

    /// The dependency set recorded for an effect, if it has run.
    pub fn dependencies_of(&self, effect: SubscriberId) -> Option<&DependencySet> {
        self.effect_dependencies.get(&effect)
    }

    /// Drop the record for a disposed effect.
    pub fn forget_effect(&mut self, effect: SubscriberId) {
        self.effect_dependencies.remove(&effect);
    }

    /// Record the subscriber count a signal reached.
    pub fn record_subscriber_count(&mut self, signal: SignalId, count: usize) {
        self.signal_subscribers.insert(signal, count);
    }

    /// Last recorded subscriber count for a signal (0 if never recorded).
    pub fn subscriber_count_of(&self, signal: SignalId) -> usize {
        self.signal_subscribers.get(&signal).copied().unwrap_or(0)
    }

    /// Drop the record for a signal that no longer exists.
    pub fn forget_signal(&mut self, signal: SignalId) {
        self.signal_subscribers.remove(&signal);
    }

    /// True if a dependency set of `size` is over the ceiling.
    pub fn dependency_limit_exceeded(&self, size: usize) -> bool {
        size > self.limits.max_dependencies
    }

    /// True if a subscriber set of `size` is over the ceiling.
    pub fn subscriber_limit_exceeded(&self, size: usize) -> bool {
        size > self.limits.max_subscribers
    }

    /// The configured subscriber ceiling.
    pub fn subscriber_limit(&self) -> usize {
        self.limits.max_subscribers
    }

    /// The configured dependency ceiling.
    pub fn dependency_limit(&self) -> usize {
        self.limits.max_dependencies
    }

    /// Number of effects with a recorded dependency set.
    pub fn tracked_effects(&self) -> usize {
        self.effect_dependencies.len()
    }

    /// Number of signals with a recorded subscriber count.
    pub fn tracked_signals(&self) -> usize {
        self.signal_subscribers.len()
    }
}
