//! Hella Core
//!
//! This crate provides the reactive core of the Hella UI framework. It
//! implements:
//!
//! - Reactive primitives (signals, computed values, effects)
//! - Batching of writes into a single notification pass
//! - Frame-coalesced notification scheduling
//! - Dependency and subscriber ceilings
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives, the runtime and its scheduler
//! - `config`: Runtime limits and scheduling parameters
//! - `error`: The error type shared by every operation
//!
//! A [`FrameDriver`] ticks a runtime's frame clock from a tokio timer for
//! hosts that do not have their own render loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use hella_core::{computed, effect, signal, EffectOptions};
//!
//! // Create a signal
//! let count = signal(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = computed(move || Ok(c.get()? * 2));
//!
//! // Create an effect
//! let (c, d) = (count.clone(), doubled.clone());
//! effect(move || {
//!     println!("Count: {}, Doubled: {}", c.get()?, d.get()?);
//!     Ok(())
//! }, EffectOptions::immediate())?;
//!
//! // Update the signal
//! count.set(5)?;
//! // At the next frame the effect prints: "Count: 5, Doubled: 10"
//! ```

pub mod config;
pub mod error;
pub mod reactive;

mod driver;

pub use config::{Limits, RuntimeConfig};
pub use driver::FrameDriver;
pub use error::{DependencyOwner, ReactiveError, Result};
pub use reactive::{
    Computed, ComputedConfig, Effect, EffectOptions, ReactiveRuntime, ReadOnlySignal, Signal,
    SignalConfig, SignalId, SignalState, SubscriberId, Subscription,
};

/// Create a signal on the calling thread's default runtime.
pub fn signal<T: Clone + 'static>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

/// Create a signal with validation, sanitizing or observer hooks.
pub fn signal_with<T: Clone + 'static>(initial: T, config: SignalConfig<T>) -> Signal<T> {
    ReactiveRuntime::current().signal(initial, config)
}

/// Create an effect on the calling thread's default runtime.
pub fn effect<F>(func: F, options: EffectOptions) -> Result<Effect>
where
    F: Fn() -> Result<()> + 'static,
{
    Effect::new(func, options)
}

/// Create a lazily evaluated computed value.
pub fn computed<T, F>(func: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> Result<T> + 'static,
{
    Computed::new(func)
}

/// Create a computed value with lifecycle hooks.
pub fn computed_with<T, F>(func: F, config: ComputedConfig<T>) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> Result<T> + 'static,
{
    ReactiveRuntime::current().computed(func, config)
}

/// Run `body` with notifications deferred until it returns.
///
/// Every subscriber affected by writes inside the batch fires exactly once,
/// synchronously, after the outermost batch closes.
pub fn batch_signals<R>(body: impl FnOnce() -> Result<R>) -> Result<R> {
    ReactiveRuntime::current().batch(body)
}

/// Create a read-only signal holding `value` under a diagnostic key.
pub fn immutable<T: Clone + 'static>(key: impl Into<String>, value: T) -> ReadOnlySignal<T> {
    ReactiveRuntime::current().immutable(key, value)
}
