//! Policies deciding whether an update context has been pending too long.
//!
//! A policy only reports staleness; the coordinator decides what to do with
//! a stale context.

use crate::context::UpdateContext;
use chrono::TimeDelta;
use std::time::{Duration, Instant};

/// Decides whether a context has outlived its time budget.
///
/// Implementations must be pure and safe to call concurrently.
pub trait PendingExceededChecker: Send + Sync {
    /// Returns true if the context has been pending too long.
    fn is_pending_exceeded(&self, context: &UpdateContext) -> bool;
}

/// Returns true if `elapsed` is strictly greater than `limit`.
///
/// Zero and negative limits are always exceeded.
fn exceeds(elapsed: Duration, limit: TimeDelta) -> bool {
    if limit <= TimeDelta::zero() {
        return true;
    }
    // An elapsed time too large for `TimeDelta` is certainly past any limit.
    TimeDelta::from_std(elapsed).map_or(true, |elapsed| elapsed > limit)
}

fn elapsed_since(start: Instant) -> Duration {
    Instant::now().saturating_duration_since(start)
}

/// Measures pending time from context creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationTimePendingExceededChecker {
    pending_time_limit: TimeDelta,
}

impl CreationTimePendingExceededChecker {
    /// Creates a checker. Any limit is accepted.
    #[must_use]
    pub const fn new(pending_time_limit: TimeDelta) -> Self {
        Self { pending_time_limit }
    }

    /// Creates a checker from a std duration.
    #[must_use]
    pub fn from_std(pending_time_limit: Duration) -> Self {
        Self::new(TimeDelta::from_std(pending_time_limit).unwrap_or(TimeDelta::MAX))
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn pending_time_limit(&self) -> TimeDelta {
        self.pending_time_limit
    }
}

impl PendingExceededChecker for CreationTimePendingExceededChecker {
    fn is_pending_exceeded(&self, context: &UpdateContext) -> bool {
        exceeds(elapsed_since(context.created_instant()), self.pending_time_limit)
    }
}

/// Measures pending time from the last recorded activity.
///
/// Handlers that call [`UpdateContext::touch`] keep their context alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastActivityPendingExceededChecker {
    idle_time_limit: TimeDelta,
}

impl LastActivityPendingExceededChecker {
    /// Creates a checker. Any limit is accepted.
    #[must_use]
    pub const fn new(idle_time_limit: TimeDelta) -> Self {
        Self { idle_time_limit }
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn idle_time_limit(&self) -> TimeDelta {
        self.idle_time_limit
    }
}

impl PendingExceededChecker for LastActivityPendingExceededChecker {
    fn is_pending_exceeded(&self, context: &UpdateContext) -> bool {
        exceeds(elapsed_since(context.last_activity()), self.idle_time_limit)
    }
}
