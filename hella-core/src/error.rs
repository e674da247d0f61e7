//! Error types for the reactive core.
//!
//! Every error is raised synchronously at the call site that triggers it.
//! The core never retries; callers decide what to do with a failure.

use std::fmt;

use thiserror::Error;

use crate::reactive::SignalId;

/// Which kind of computation exceeded its dependency ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyOwner {
    /// A plain effect created through `effect()`.
    Effect,
    /// The internal effect driving a computed value.
    Computed,
}

impl fmt::Display for DependencyOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyOwner::Effect => f.write_str("Effect"),
            DependencyOwner::Computed => f.write_str("Computed"),
        }
    }
}

/// Errors produced by signals, effects and computed values.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A configured validator rejected a value on read or write.
    #[error("Signal value validation failed (signal {signal:?})")]
    Validation { signal: SignalId },

    /// An effect or computed read more signals than the ceiling allows.
    #[error("{owner} dependencies limit exceeded ({count} > {limit})")]
    DependencyLimit {
        owner: DependencyOwner,
        count: usize,
        limit: usize,
    },

    /// A subscription would push a signal past the subscriber ceiling.
    #[error("Maximum subscriber limit ({limit}) exceeded")]
    SubscriberLimit { limit: usize },

    /// Runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Returns true for validator rejections.
    pub fn is_validation(&self) -> bool {
        matches!(self, ReactiveError::Validation { .. })
    }

    /// Returns true for dependency ceiling violations.
    pub fn is_dependency_limit(&self) -> bool {
        matches!(self, ReactiveError::DependencyLimit { .. })
    }

    /// Returns true for subscriber ceiling violations.
    pub fn is_subscriber_limit(&self) -> bool {
        matches!(self, ReactiveError::SubscriberLimit { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Keep the first error of a sequence and log the rest.
///
/// Notification paths run every subscriber even when one fails, so only one
/// error can be handed back to the caller.
pub(crate) fn keep_first(slot: &mut Option<ReactiveError>, result: Result<()>) {
    if let Err(err) = result {
        match slot {
            None => *slot = Some(err),
            Some(_) => tracing::error!(error = %err, "subscriber failed during notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = ReactiveError::DependencyLimit {
            owner: DependencyOwner::Computed,
            count: 101,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "Computed dependencies limit exceeded (101 > 100)"
        );

        let err = ReactiveError::SubscriberLimit { limit: 1000 };
        assert_eq!(err.to_string(), "Maximum subscriber limit (1000) exceeded");
        assert!(err.is_subscriber_limit());
        assert!(!err.is_validation());
    }

    #[test]
    fn keep_first_retains_earliest_error() {
        let mut slot = None;
        keep_first(&mut slot, Ok(()));
        assert!(slot.is_none());

        keep_first(&mut slot, Err(ReactiveError::SubscriberLimit { limit: 1 }));
        keep_first(&mut slot, Err(ReactiveError::SubscriberLimit { limit: 2 }));

        match slot {
            Some(ReactiveError::SubscriberLimit { limit }) => assert_eq!(limit, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
