//! Read-only signals.
//!
//! [`ReadOnlySignal`] wraps a signal and disables `set` at the boundary: a
//! write logs a warning naming the key and leaves the value alone.
//!
//! The guarantee covers the handle only. Reads hand out clones, so mutating a
//! returned value never reaches the signal, but a `T` with shared interior
//! mutability (`Rc<RefCell<_>>` and friends) can still be changed through the
//! clone.

use std::fmt;

use super::signal::{Signal, Subscription};
use super::subscriber::SignalId;
use crate::error::Result;

/// A signal whose value cannot be replaced through this handle.
pub struct ReadOnlySignal<T> {
    key: String,
    signal: Signal<T>,
}

impl<T: Clone + 'static> ReadOnlySignal<T> {
    /// Wrap `signal` under a diagnostic `key`.
    pub fn new(key: impl Into<String>, signal: Signal<T>) -> Self {
        Self {
            key: key.into(),
            signal,
        }
    }

    /// The diagnostic key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The wrapped signal's ID.
    pub fn id(&self) -> SignalId {
        self.signal.id()
    }

    /// Tracked read; see [`Signal::get`].
    pub fn get(&self) -> Result<T> {
        self.signal.get()
    }

    /// Untracked read; see [`Signal::get_untracked`].
    pub fn get_untracked(&self) -> Result<T> {
        self.signal.get_untracked()
    }

    /// Writes are refused with a warning.
    pub fn set(&self, _value: T) {
        tracing::warn!(key = %self.key, "Cannot modify readonly property: {}", self.key);
    }

    /// See [`Signal::subscribe`].
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Result<Subscription> {
        self.signal.subscribe(f)
    }

    /// See [`Signal::dispose`].
    pub fn dispose(&self) {
        self.signal.dispose();
    }
}

impl<T> Clone for ReadOnlySignal<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlySignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlySignal")
            .field("key", &self.key)
            .field("signal", &self.signal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RuntimeConfig;
    use crate::reactive::ReactiveRuntime;

    #[derive(Debug, Clone, PartialEq)]
    struct ApiConfig {
        api_url: String,
        max_retries: u32,
        timeout: u32,
    }

    fn api_config() -> ApiConfig {
        ApiConfig {
            api_url: "https://api.example.com".to_string(),
            max_retries: 3,
            timeout: 5000,
        }
    }

    #[test]
    fn set_is_refused() {
        let rt = ReactiveRuntime::new(RuntimeConfig::default());
        let config = rt.immutable("config", api_config());
        assert_eq!(config.key(), "config");

        let mut next = config.get().unwrap();
        next.max_retries = 5;
        config.set(next);

        assert_eq!(config.get().unwrap().max_retries, 3);
        assert!(rt.is_idle());
    }

    #[test]
    fn mutating_a_read_value_does_not_leak_back() {
        let rt = ReactiveRuntime::new(RuntimeConfig::default());
        let config = rt.immutable("config", api_config());

        let mut copy = config.get().unwrap();
        copy.timeout = 10_000;

        assert_eq!(config.get().unwrap(), api_config());
    }

    #[test]
    fn subscribe_and_dispose_delegate() {
        let rt = ReactiveRuntime::new(RuntimeConfig::default());
        let config = rt.immutable("config", 1);

        let _sub = config.subscribe(|| {}).unwrap();
        assert_eq!(rt.subscriber_count_of(config.id()), 1);

        config.dispose();
        assert_eq!(rt.subscriber_count_of(config.id()), 0);
    }
}
