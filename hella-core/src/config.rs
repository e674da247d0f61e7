//! Runtime Configuration
//!
//! Ceilings and scheduling parameters for a [`ReactiveRuntime`]. Configuration
//! can be built in code or loaded from JSON.
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{"limits": {"max_subscribers": 50}}"#)?;
//! let rt = ReactiveRuntime::new(config);
//! ```
//!
//! [`ReactiveRuntime`]: crate::reactive::ReactiveRuntime

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default ceiling on the number of signals one effect may read per run.
pub const DEFAULT_MAX_DEPENDENCIES: usize = 100;

/// Default ceiling on the number of subscribers attached to one signal.
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 1000;

/// Hard caps enforced by the limits guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum dependency set size for an effect or computed.
    pub max_dependencies: usize,
    /// Maximum subscriber count for a signal.
    pub max_subscribers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dependencies: DEFAULT_MAX_DEPENDENCIES,
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
        }
    }
}

/// Configuration for one reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Dependency and subscriber ceilings.
    pub limits: Limits,

    /// Period of the frame clock used by [`FrameDriver`](crate::FrameDriver).
    /// 16ms approximates one display frame.
    pub frame_interval_ms: u64,

    /// Upper bound on frames processed by a single `flush()` call.
    /// Guards against effects that keep rewriting their own dependencies.
    pub max_flush_frames: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            frame_interval_ms: 16,
            max_flush_frames: 64,
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from a JSON string. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the dependency ceiling.
    pub fn with_max_dependencies(mut self, max: usize) -> Self {
        self.limits.max_dependencies = max;
        self
    }

    /// Set the subscriber ceiling.
    pub fn with_max_subscribers(mut self, max: usize) -> Self {
        self.limits.max_subscribers = max;
        self
    }

    /// The frame period as a `Duration`.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_ceilings() {
        let config = RuntimeConfig::default();
        assert_eq!(config.limits.max_dependencies, 100);
        assert_eq!(config.limits.max_subscribers, 1000);
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn parse_partial_json() {
        let json = r#"{
            "limits": {"max_subscribers": 5},
            "frame_interval_ms": 8
        }"#;

        let config = RuntimeConfig::from_json(json).unwrap();
        assert_eq!(config.limits.max_subscribers, 5);
        assert_eq!(config.limits.max_dependencies, DEFAULT_MAX_DEPENDENCIES);
        assert_eq!(config.frame_interval_ms, 8);
        assert_eq!(config.max_flush_frames, 64);
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = RuntimeConfig::from_json("{ limits: ").unwrap_err();
        assert!(err.to_string().starts_with("invalid runtime configuration"));
    }

    #[test]
    fn builder_overrides_limits() {
        let config = RuntimeConfig::default()
            .with_max_dependencies(3)
            .with_max_subscribers(7);
        assert_eq!(config.limits, Limits { max_dependencies: 3, max_subscribers: 7 });
    }
}
