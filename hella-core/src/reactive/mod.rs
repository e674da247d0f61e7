//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computed values
//! and effects, plus the runtime that schedules them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect is running, the signal registers that effect as a
//! subscriber. When the value changes, subscribers are notified at the next
//! frame, or when the enclosing batch closes.
//!
//! ## Computed Values
//!
//! A Computed is a derived value that caches its result. It is evaluated on
//! first access and re-evaluated only when one of the signals it read changes.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever one of its
//! dependencies changes. Dependencies are rebuilt on every run.
//!
//! # Implementation Notes
//!
//! Dependency tracking is implicit: the runtime keeps a stack of running
//! effects, and a signal read subscribes whatever sits on top of it. Every
//! primitive keeps a handle to the runtime it was created on, so separate
//! runtimes never share subscribers, limits or queues.
//!
//! Writes are never delivered synchronously outside a batch. They are
//! coalesced per signal and delivered when the runtime crosses a frame
//! boundary (see [`ReactiveRuntime::advance_frame`]).

mod batch;
mod computed;
mod context;
mod effect;
mod readonly;
mod runtime;
mod scheduler;
mod security;
mod signal;
mod subscriber;

pub use batch::BatchState;
pub use computed::{Computed, ComputedConfig};
pub use context::{ContextGuard, ContextStack, Source, Tracker};
pub use effect::{Effect, EffectOptions};
pub use readonly::ReadOnlySignal;
pub use runtime::ReactiveRuntime;
pub use scheduler::Scheduler;
pub use security::{DependencySet, LimitsGuard};
pub use signal::{Signal, SignalConfig, SignalState, Subscription};
pub use subscriber::{SignalId, Subscriber, SubscriberId};
