//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect either runs right away (`immediate`) or queues
//!    its first run as a microtask.
//!
//! 2. Each run pushes the effect onto the runtime's context stack and starts
//!    from an empty dependency set. Every signal read during the run
//!    subscribes the effect and joins the set.
//!
//! 3. When the run finishes, successfully or not, the effect is popped,
//!    subscriptions to signals it no longer read are dropped, and the new set
//!    is recorded in the limits guard. A set over the ceiling is reported as
//!    an error after the run; the effect stays live. This holds for the first
//!    run too: a failing immediate effect keeps its subscriptions.
//!
//!    The effect behind a computed value also checks before evaluating. If
//!    its previous run was over the ceiling it refuses to run, keeps its
//!    subscriptions and clears the record, so the following notification
//!    evaluates again.
//!
//! 4. Effects never poll. They re-run only when a signal notifies them.
//!
//! # Ownership
//!
//! Signals hold their subscribers, so an effect stays alive as long as one of
//! its dependencies does, even if its handle is dropped. Call
//! [`Effect::dispose`] to stop it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::{Source, Tracker};
use super::runtime::ReactiveRuntime;
use super::security::DependencySet;
use super::subscriber::{SignalId, Subscriber, SubscriberId};
use crate::error::{DependencyOwner, ReactiveError, Result};

/// When the first run of an effect happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectOptions {
    /// Run synchronously at creation instead of at the next microtask.
    pub immediate: bool,
}

impl EffectOptions {
    /// First run happens during construction.
    pub fn immediate() -> Self {
        Self { immediate: true }
    }

    /// First run is queued as a microtask (the default).
    pub fn deferred() -> Self {
        Self { immediate: false }
    }
}

pub(crate) struct EffectInner {
    id: SubscriberId,
    owner: DependencyOwner,
    runtime: ReactiveRuntime,
    func: Box<dyn Fn() -> Result<()>>,
    active: Cell<bool>,
    dependencies: RefCell<IndexMap<SignalId, Weak<dyn Source>>>,
    run_count: Cell<usize>,
}

impl EffectInner {
    /// Execute the effect function within a reactive context.
    fn run(self: &Rc<Self>) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }

        if self.owner == DependencyOwner::Computed {
            self.check_recorded()?;
        }

        let previous = std::mem::take(&mut *self.dependencies.borrow_mut());

        let outcome = {
            let _ctx = self.runtime.context().enter(self.clone());
            (self.func)()
        };

        self.run_count.set(self.run_count.get() + 1);
        let limit = self.settle(previous);

        // The ceiling check happens last and wins over the body's error.
        limit.and(outcome)
    }

    /// Refuse to evaluate if the last recorded set is over the ceiling.
    ///
    /// Subscriptions are kept and the record is cleared, so the next
    /// notification evaluates again.
    fn check_recorded(&self) -> Result<()> {
        let mut guard = self.runtime.guard_mut();
        let recorded = guard.dependencies_of(self.id).map_or(0, |deps| deps.len());
        if !guard.dependency_limit_exceeded(recorded) {
            return Ok(());
        }

        guard.record_dependencies(self.id, DependencySet::new());
        tracing::debug!(
            effect = self.id.raw(),
            dependencies = recorded,
            "evaluation refused over dependency ceiling"
        );
        Err(ReactiveError::DependencyLimit {
            owner: self.owner,
            count: recorded,
            limit: guard.dependency_limit(),
        })
    }

    /// Drop stale subscriptions and record the rebuilt dependency set.
    fn settle(&self, previous: IndexMap<SignalId, Weak<dyn Source>>) -> Result<()> {
        if !self.active.get() {
            // Disposed during its own run: undo whatever the run subscribed.
            self.release();
            return Ok(());
        }

        let current: Vec<SignalId> = {
            let dependencies = self.dependencies.borrow();
            for (id, source) in &previous {
                if !dependencies.contains_key(id) {
                    if let Some(source) = source.upgrade() {
                        source.detach(self.id);
                    }
                }
            }
            dependencies.keys().copied().collect()
        };

        let count = current.len();
        let mut guard = self.runtime.guard_mut();
        guard.record_dependencies(self.id, current.into_iter().collect());

        tracing::debug!(
            effect = self.id.raw(),
            run = self.run_count.get(),
            dependencies = count,
            "effect ran"
        );

        if guard.dependency_limit_exceeded(count) {
            return Err(ReactiveError::DependencyLimit {
                owner: self.owner,
                count,
                limit: guard.dependency_limit(),
            });
        }
        Ok(())
    }

    /// Unsubscribe from every dependency and forget the guard record.
    fn release(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
        for source in dependencies.values() {
            if let Some(source) = source.upgrade() {
                source.detach(self.id);
            }
        }
        self.runtime.guard_mut().forget_effect(self.id);
    }

    fn dispose(&self) {
        if !self.active.replace(false) {
            return;
        }
        self.runtime.context().remove(self.id);
        self.release();
        tracing::debug!(effect = self.id.raw(), "effect disposed");
    }
}

impl Tracker for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn subscriber(self: Rc<Self>) -> Subscriber {
        let id = self.id;
        Subscriber::with_id(id, move || self.run())
    }

    fn track(&self, id: SignalId, source: Weak<dyn Source>) {
        self.dependencies.borrow_mut().entry(id).or_insert(source);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(0);
///
/// let count_clone = count.clone();
/// let effect = effect(move || {
///     println!("Count is: {}", count_clone.get()?);
///     Ok(())
/// }, EffectOptions::immediate())?;
///
/// count.set(5)?;  // Prints "Count is: 5" at the next frame
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create an effect on the calling thread's default runtime.
    pub fn new<F>(func: F, options: EffectOptions) -> Result<Self>
    where
        F: Fn() -> Result<()> + 'static,
    {
        Self::create(ReactiveRuntime::current(), func, options)
    }

    /// Build and start a user effect.
    ///
    /// A failed immediate first run is reported, but the effect stays
    /// subscribed to what it read and re-runs when those signals change.
    pub(crate) fn create<F>(runtime: ReactiveRuntime, func: F, options: EffectOptions) -> Result<Self>
    where
        F: Fn() -> Result<()> + 'static,
    {
        let (effect, first_run) = Self::spawn(runtime, func, options, DependencyOwner::Effect);
        first_run.map(|()| effect)
    }

    /// Build the effect and start it, handing back the first run's outcome
    /// without disposing on failure.
    pub(crate) fn spawn<F>(
        runtime: ReactiveRuntime,
        func: F,
        options: EffectOptions,
        owner: DependencyOwner,
    ) -> (Self, Result<()>)
    where
        F: Fn() -> Result<()> + 'static,
    {
        let inner = Rc::new(EffectInner {
            id: SubscriberId::new(),
            owner,
            runtime,
            func: Box::new(func),
            active: Cell::new(true),
            dependencies: RefCell::new(IndexMap::new()),
            run_count: Cell::new(0),
        });

        let first_run = if options.immediate {
            inner.run()
        } else {
            let deferred = inner.clone();
            inner
                .runtime
                .scheduler()
                .queue_microtask(Box::new(move || deferred.run()));
            Ok(())
        };

        (Self { inner }, first_run)
    }

    /// The effect's identity (also its subscriber ID).
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Stop the effect. Safe to call more than once.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !self.inner.active.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies from the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Signals read during the latest run, in first-read order.
    pub fn dependencies(&self) -> Vec<SignalId> {
        self.inner.dependencies.borrow().keys().copied().collect()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
