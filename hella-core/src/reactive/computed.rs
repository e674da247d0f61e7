//! Computed Implementation
//!
//! A Computed is a cached derived value. It is built from two primitives: a
//! cache signal holding the last result and an internal effect that
//! re-evaluates the function and writes the cache.
//!
//! # How Computed Values Work
//!
//! 1. Creating a computed value evaluates nothing.
//!
//! 2. The first access (`get`, `subscribe`, ...) materializes it: the cache
//!    signal and the internal effect are created, and the effect runs once
//!    right away, recording which signals the function read.
//!
//! 3. Later reads return the cached value. They behave exactly like signal
//!    reads, including subscribing the running effect.
//!
//! 4. When a signal read during the last evaluation changes, the internal
//!    effect re-runs at the next frame and writes the cache, which in turn
//!    notifies whoever reads the computed value. Signals the function did not
//!    read never trigger it.
//!
//! 5. An evaluation that read more signals than the dependency ceiling makes
//!    the next notification fail without evaluating. The subscriptions stay,
//!    so the notification after that evaluates again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::{Effect, EffectOptions};
use super::runtime::ReactiveRuntime;
use super::signal::{Signal, SignalConfig, Subscription};
use super::subscriber::SignalId;
use crate::error::{DependencyOwner, ReactiveError, Result};

/// Optional hooks for a computed value.
pub struct ComputedConfig<T> {
    on_create: Option<Box<dyn Fn()>>,
    on_compute: Option<Box<dyn Fn(&T)>>,
}

impl<T> Default for ComputedConfig<T> {
    fn default() -> Self {
        Self {
            on_create: None,
            on_compute: None,
        }
    }
}

impl<T> ComputedConfig<T> {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once, when the computed value materializes.
    pub fn on_create(mut self, f: impl Fn() + 'static) -> Self {
        self.on_create = Some(Box::new(f));
        self
    }

    /// Called with every successful evaluation result.
    pub fn on_compute(mut self, f: impl Fn(&T) + 'static) -> Self {
        self.on_compute = Some(Box::new(f));
        self
    }
}

impl<T> fmt::Debug for ComputedConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedConfig")
            .field("on_create", &self.on_create.is_some())
            .field("on_compute", &self.on_compute.is_some())
            .finish()
    }
}

enum ComputedState<T> {
    /// Not accessed yet.
    Pending,
    /// Cache and driver exist.
    Ready {
        cache: Signal<Option<T>>,
        driver: Effect,
    },
}

struct ComputedInner<T> {
    runtime: ReactiveRuntime,
    func: Rc<dyn Fn() -> Result<T>>,
    config: Rc<ComputedConfig<T>>,
    created: Cell<bool>,
    state: RefCell<ComputedState<T>>,
}

impl<T: Clone + 'static> ComputedInner<T> {
    /// Return the cache, building it on first access.
    fn materialize(&self) -> Result<Signal<Option<T>>> {
        if let ComputedState::Ready { cache, .. } = &*self.state.borrow() {
            return Ok(cache.clone());
        }

        if !self.created.replace(true) {
            if let Some(on_create) = &self.config.on_create {
                on_create();
            }
        }

        // `None` is the placeholder before the first successful evaluation.
        let cache = self.runtime.signal(
            None,
            SignalConfig::new().validate(|value: &Option<T>| value.is_none()),
        );

        let func = Rc::clone(&self.func);
        let config = Rc::clone(&self.config);
        let target = cache.clone();
        let body = move || -> Result<()> {
            let result = func()?;
            if let Some(on_compute) = &config.on_compute {
                on_compute(&result);
            }
            target.set(Some(result))
        };

        let (driver, first_run) = Effect::spawn(
            self.runtime.clone(),
            body,
            EffectOptions::immediate(),
            DependencyOwner::Computed,
        );
        tracing::debug!(
            cache = cache.id().raw(),
            driver = driver.id().raw(),
            "computed materialized"
        );

        *self.state.borrow_mut() = ComputedState::Ready {
            cache: cache.clone(),
            driver,
        };
        first_run.map(|()| cache)
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// Cloning a `Computed` creates another handle to the same value.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(2);
///
/// let count_clone = count.clone();
/// let doubled = computed(move || Ok(count_clone.get()? * 2));
///
/// assert_eq!(doubled.get()?, 4);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value on the calling thread's default runtime.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> Result<T> + 'static,
    {
        Self::with_runtime(ReactiveRuntime::current(), func, ComputedConfig::default())
    }

    /// Create a computed value on a specific runtime.
    pub fn with_runtime<F>(runtime: ReactiveRuntime, func: F, config: ComputedConfig<T>) -> Self
    where
        F: Fn() -> Result<T> + 'static,
    {
        Self {
            inner: Rc::new(ComputedInner {
                runtime,
                func: Rc::new(func),
                config: Rc::new(config),
                created: Cell::new(false),
                state: RefCell::new(ComputedState::Pending),
            }),
        }
    }

    /// Get the current value, materializing on first access.
    ///
    /// Subscribes the running effect like a signal read.
    pub fn get(&self) -> Result<T> {
        let cache = self.inner.materialize()?;
        cache
            .get()?
            .ok_or(ReactiveError::Validation { signal: cache.id() })
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> Result<T> {
        let cache = self.inner.materialize()?;
        cache
            .get_untracked()?
            .ok_or(ReactiveError::Validation { signal: cache.id() })
    }

    /// Register a callback fired when the cached value changes.
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Result<Subscription> {
        self.inner.materialize()?.subscribe(f)
    }

    /// Number of subscribers on the cached value, materializing if needed.
    pub fn subscriber_count(&self) -> Result<usize> {
        Ok(self.inner.materialize()?.subscriber_count())
    }

    /// Stop recomputing and drop subscribers. No-op before materialization.
    pub fn dispose(&self) {
        if let ComputedState::Ready { cache, driver } = &*self.inner.state.borrow() {
            driver.dispose();
            cache.dispose();
        }
    }

    /// True once the first access has happened.
    pub fn is_materialized(&self) -> bool {
        matches!(*self.inner.state.borrow(), ComputedState::Ready { .. })
    }

    /// ID of the cache signal, once materialized.
    pub fn id(&self) -> Option<SignalId> {
        match &*self.inner.state.borrow() {
            ComputedState::Ready { cache, .. } => Some(cache.id()),
            ComputedState::Pending => None,
        }
    }

    /// Signals read during the latest evaluation.
    pub fn dependencies(&self) -> Vec<SignalId> {
        match &*self.inner.state.borrow() {
            ComputedState::Ready { driver, .. } => driver.dependencies(),
            ComputedState::Pending => Vec::new(),
        }
    }

    /// Number of evaluations so far.
    pub fn evaluation_count(&self) -> usize {
        match &*self.inner.state.borrow() {
            ComputedState::Ready { driver, .. } => driver.run_count(),
            ComputedState::Pending => 0,
        }
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Computed");
        match &*self.inner.state.borrow() {
            ComputedState::Pending => debug.field("state", &"pending"),
            ComputedState::Ready { cache, driver } => debug
                .field("cache", cache)
                .field("driver", driver),
        };
        debug.finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
