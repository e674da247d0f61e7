//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computed
//! values and effects. It owns every piece of shared scheduling state:
//!
//! - the active-effect stack used for implicit subscription,
//! - the limits guard,
//! - the batch depth and pending-notification set,
//! - the microtask and frame queues.
//!
//! # Ownership
//!
//! A `ReactiveRuntime` is a cheap, clonable handle. Every signal, effect and
//! computed value keeps a handle to the runtime that created it, so all the
//! primitives of one graph always share the same state.
//!
//! Each thread has one default runtime, returned by
//! [`ReactiveRuntime::current`] and used by the free constructor functions.
//! Explicit runtimes can be created with [`ReactiveRuntime::new`] and threaded
//! through by calling the constructor methods on them directly; tests do this
//! to stay isolated from each other.
//!
//! # Thread Safety
//!
//! None. The runtime is `!Send` and relies on single-threaded cooperative
//! scheduling: shared state lives in `Cell`/`RefCell`.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::batch::{run_batch, BatchState};
use super::computed::{Computed, ComputedConfig};
use super::context::ContextStack;
use super::effect::{Effect, EffectOptions};
use super::readonly::ReadOnlySignal;
use super::scheduler::Scheduler;
use super::security::LimitsGuard;
use super::signal::{Signal, SignalConfig};
use super::subscriber::{SignalId, SubscriberId};
use crate::config::RuntimeConfig;
use crate::error::{keep_first, Result};

thread_local! {
    static CURRENT: RefCell<ReactiveRuntime> =
        RefCell::new(ReactiveRuntime::new(RuntimeConfig::default()));
}

struct RuntimeInner {
    config: RuntimeConfig,
    context: ContextStack,
    guard: RefCell<LimitsGuard>,
    batch: BatchState,
    scheduler: Scheduler,
}

/// Handle to one reactive runtime.
#[derive(Clone)]
pub struct ReactiveRuntime {
    inner: Rc<RuntimeInner>,
}

impl ReactiveRuntime {
    /// Create a runtime with the given configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let guard = LimitsGuard::new(config.limits);
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: ContextStack::new(),
                guard: RefCell::new(guard),
                batch: BatchState::default(),
                scheduler: Scheduler::new(),
            }),
        }
    }

    /// The default runtime of the calling thread.
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Replace the calling thread's default runtime, returning the old one.
    ///
    /// Primitives already created keep using the runtime they were created on.
    pub fn install(runtime: ReactiveRuntime) -> ReactiveRuntime {
        CURRENT.with(|current| current.replace(runtime))
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// True if both handles point at the same runtime.
    pub fn ptr_eq(&self, other: &ReactiveRuntime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Create a signal on this runtime.
    pub fn signal<T>(&self, initial: T, config: SignalConfig<T>) -> Signal<T>
    where
        T: Clone + 'static,
    {
        Signal::with_runtime(self.clone(), initial, config)
    }

    /// Create a read-only signal on this runtime.
    pub fn immutable<T>(&self, key: impl Into<String>, value: T) -> ReadOnlySignal<T>
    where
        T: Clone + 'static,
    {
        ReadOnlySignal::new(key, self.signal(value, SignalConfig::default()))
    }

    /// Create an effect on this runtime.
    ///
    /// With `immediate`, the first run happens now and its error is returned.
    /// An effect whose first run fails stays subscribed to the signals it read
    /// and runs again when they change. Otherwise the first run is queued as a
    /// microtask.
    pub fn effect<F>(&self, func: F, options: EffectOptions) -> Result<Effect>
    where
        F: Fn() -> Result<()> + 'static,
    {
        Effect::create(self.clone(), func, options)
    }

    /// Create a computed value on this runtime. Nothing runs until first access.
    pub fn computed<T, F>(&self, func: F, config: ComputedConfig<T>) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T> + 'static,
    {
        Computed::with_runtime(self.clone(), func, config)
    }

    /// Group writes so each affected subscriber fires once, after `body`.
    pub fn batch<R>(&self, body: impl FnOnce() -> Result<R>) -> Result<R> {
        run_batch(self, body)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Run queued microtasks (deferred first runs of effects).
    pub fn run_microtasks(&self) -> Result<usize> {
        self.inner.scheduler.run_microtasks()
    }

    /// Cross one frame boundary, delivering coalesced notifications.
    pub fn advance_frame(&self) -> Result<usize> {
        self.inner.scheduler.advance_frame()
    }

    /// Run microtasks and frames until nothing is queued.
    ///
    /// Stops after `max_flush_frames` frames so a self-feeding effect cannot
    /// spin forever. Returns the number of frames processed.
    pub fn flush(&self) -> Result<usize> {
        let scheduler = &self.inner.scheduler;
        let mut first_error = None;
        keep_first(&mut first_error, scheduler.run_microtasks().map(drop));

        let mut frames = 0;
        while !scheduler.is_idle() && frames < self.inner.config.max_flush_frames {
            keep_first(&mut first_error, scheduler.advance_frame().map(drop));
            frames += 1;
        }

        if !scheduler.is_idle() {
            tracing::warn!(frames, "flush stopped with notifications still queued");
        }

        first_error.map_or(Ok(frames), Err)
    }

    /// True if no microtask or frame notification is queued.
    pub fn is_idle(&self) -> bool {
        self.inner.scheduler.is_idle()
    }

    /// Frames crossed so far.
    pub fn frame_count(&self) -> u64 {
        self.inner.scheduler.frame_count()
    }

    /// True while a batch is open.
    pub fn is_batching(&self) -> bool {
        self.inner.batch.is_batching()
    }

    /// True while an effect or computed is running.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_active()
    }

    /// The effect currently running, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current_subscriber()
    }

    // ------------------------------------------------------------------
    // Limits introspection
    // ------------------------------------------------------------------

    /// Dependencies recorded for an effect on its last run.
    pub fn dependencies_of(&self, effect: SubscriberId) -> Option<Vec<SignalId>> {
        self.guard()
            .dependencies_of(effect)
            .map(|deps| deps.iter().copied().collect())
    }

    /// Last subscriber count recorded for a signal.
    pub fn subscriber_count_of(&self, signal: SignalId) -> usize {
        self.guard().subscriber_count_of(signal)
    }

    // ------------------------------------------------------------------
    // Crate-internal accessors
    // ------------------------------------------------------------------

    pub(crate) fn context(&self) -> &ContextStack {
        &self.inner.context
    }

    pub(crate) fn guard(&self) -> Ref<'_, LimitsGuard> {
        self.inner.guard.borrow()
    }

    pub(crate) fn guard_mut(&self) -> RefMut<'_, LimitsGuard> {
        self.inner.guard.borrow_mut()
    }

    /// Mutable guard access that tolerates an outstanding borrow (for `Drop`).
    pub(crate) fn try_guard_mut(&self) -> Option<RefMut<'_, LimitsGuard>> {
        self.inner.guard.try_borrow_mut().ok()
    }

    pub(crate) fn batch_state(&self) -> &BatchState {
        &self.inner.batch
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }
}

impl Default for ReactiveRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl fmt::Debug for ReactiveRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveRuntime")
            .field("limits", &self.inner.config.limits)
            .field("tracking_depth", &self.inner.context.depth())
            .field("batch_depth", &self.inner.batch.depth())
            .field("pending_frame_tasks", &self.inner.scheduler.pending_frame_tasks())
            .field("pending_microtasks", &self.inner.scheduler.pending_microtasks())
            .finish()
    }
}
