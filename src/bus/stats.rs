//! Dispatch statistics.
//!
//! Counters are monotonic and mutated under one dedicated lock; readers get
//! a snapshot copy. The average handler duration is an exact running mean
//! (invocation count plus summed duration), not a sampled approximation.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::bus::registry::SubscriptionCounts;

/// Lock-consistent snapshot of bus statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Events accepted by `publish` (including zero-match publishes).
    pub events_published: u64,
    /// Successful handler invocations.
    pub events_processed: u64,
    /// Failed handler invocations.
    pub events_failed: u64,
    /// Total handler invocations (processed + failed).
    pub handler_invocations: u64,
    /// Exact mean handler invocation duration.
    pub avg_handler_duration: Duration,
    /// Currently active subscriptions.
    pub active_subscriptions: usize,
    /// All current subscriptions, active or paused.
    pub total_subscriptions: usize,
    /// Archive enqueues dropped because the queue was full or closed.
    pub archive_dropped: u64,
    /// Archive store saves that returned an error.
    pub archive_failures: u64,
    /// When the most recent event was published.
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StatsInner {
    published: u64,
    processed: u64,
    failed: u64,
    invocations: u64,
    total_duration: Duration,
    last_event_at: Option<DateTime<Utc>>,
}

/// Internal accumulator behind the stats snapshot.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    inner: Mutex<StatsInner>,
}

impl StatsRecorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_published(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.published += 1;
        inner.last_event_at = Some(Utc::now());
    }

    pub(crate) fn record_invocation(&self, duration: Duration, succeeded: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.invocations += 1;
        inner.total_duration += duration;
        if succeeded {
            inner.processed += 1;
        } else {
            inner.failed += 1;
        }
    }

    pub(crate) fn snapshot(
        &self,
        subscriptions: SubscriptionCounts,
        archive_dropped: u64,
        archive_failures: u64,
    ) -> BusStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let avg_handler_duration = if inner.invocations == 0 {
            Duration::ZERO
        } else {
            let nanos = inner.total_duration.as_nanos() / u128::from(inner.invocations);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };

        BusStats {
            events_published: inner.published,
            events_processed: inner.processed,
            events_failed: inner.failed,
            handler_invocations: inner.invocations,
            avg_handler_duration,
            active_subscriptions: subscriptions.active,
            total_subscriptions: subscriptions.total,
            archive_dropped,
            archive_failures,
            last_event_at: inner.last_event_at,
        }
    }
}
