//! Subscription registry.
//!
//! Maps patterns to ordered subscription buckets. Ordering is deterministic:
//! priority descending, then insertion sequence ascending for equal
//! priorities. The registry is exclusively owned by the bus; readers
//! (publish's match phase) take a read lock, writers (subscribe/unsubscribe)
//! take a write lock, and no lock is ever held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BusError, BusResult};
use crate::handlers::EventHandler;
use crate::pattern::Pattern;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Creates a new random subscription ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Options configuring a new subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Invocation ordering weight; higher sorts first.
    pub priority: i32,
    /// Free-form metadata attached to the subscription.
    pub metadata: BTreeMap<String, String>,
}

impl SubscribeOptions {
    /// Sets the priority (builder style).
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a metadata entry (builder style).
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
    priority: i32,
    seq: u64,
    active: bool,
    created_at: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
}

/// A subscription selected for one publish, in dispatch order.
pub(crate) struct MatchedSubscription {
    pub(crate) id: SubscriptionId,
    pub(crate) handler: Arc<dyn EventHandler>,
    pub(crate) handler_name: &'static str,
    priority: i32,
    seq: u64,
}

/// Current registry size, split by active flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SubscriptionCounts {
    pub(crate) active: usize,
    pub(crate) total: usize,
}

#[derive(Default)]
struct RegistryState {
    buckets: HashMap<Pattern, Vec<Subscription>>,
    next_seq: u64,
}

/// Pattern-bucketed subscription storage.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a pattern. Never fails; duplicate
    /// registrations are independent subscriptions.
    pub(crate) fn insert(
        &self,
        pattern: Pattern,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let id = SubscriptionId::new();
        let seq = state.next_seq;
        state.next_seq += 1;

        let bucket = state.buckets.entry(pattern).or_default();
        bucket.push(Subscription {
            id,
            handler,
            priority: options.priority,
            seq,
            active: true,
            created_at: Utc::now(),
            metadata: options.metadata,
        });
        bucket.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));

        id
    }

    /// Removes the first subscription with the given ID.
    ///
    /// Linear scan across all pattern buckets, matching the lookup cost of
    /// the registry's bucket-keyed layout.
    pub(crate) fn remove(&self, id: SubscriptionId) -> BusResult<()> {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut removed = false;
        let mut emptied: Option<Pattern> = None;
        for (pattern, bucket) in &mut state.buckets {
            if let Some(pos) = bucket.iter().position(|sub| sub.id == id) {
                bucket.remove(pos);
                removed = true;
                if bucket.is_empty() {
                    emptied = Some(pattern.clone());
                }
                break;
            }
        }

        if let Some(pattern) = emptied {
            state.buckets.remove(&pattern);
        }

        if removed {
            Ok(())
        } else {
            Err(BusError::SubscriptionNotFound { id })
        }
    }

    /// Flips the active flag on a subscription.
    pub(crate) fn set_active(&self, id: SubscriptionId, active: bool) -> BusResult<()> {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for bucket in state.buckets.values_mut() {
            if let Some(sub) = bucket.iter_mut().find(|sub| sub.id == id) {
                sub.active = active;
                return Ok(());
            }
        }

        Err(BusError::SubscriptionNotFound { id })
    }

    /// All active subscriptions matching `event_type`, in dispatch order
    /// (priority descending, insertion sequence ascending).
    pub(crate) fn matching(&self, event_type: &str) -> Vec<MatchedSubscription> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let mut matched: Vec<MatchedSubscription> = state
            .buckets
            .iter()
            .filter(|(pattern, _)| pattern.matches(event_type))
            .flat_map(|(_, bucket)| bucket.iter())
            .filter(|sub| sub.active)
            .map(|sub| MatchedSubscription {
                id: sub.id,
                handler: Arc::clone(&sub.handler),
                handler_name: sub.handler.name(),
                priority: sub.priority,
                seq: sub.seq,
            })
            .collect();

        matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        matched
    }

    /// Active and total counts over current subscriptions.
    pub(crate) fn counts(&self) -> SubscriptionCounts {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = SubscriptionCounts::default();
        for sub in state.buckets.values().flatten() {
            counts.total += 1;
            if sub.active {
                counts.active += 1;
            }
        }
        counts
    }

    /// Creation timestamp and metadata for a subscription, if present.
    pub(crate) fn describe(
        &self,
        id: SubscriptionId,
    ) -> Option<(DateTime<Utc>, BTreeMap<String, String>)> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .buckets
            .values()
            .flatten()
            .find(|sub| sub.id == id)
            .map(|sub| (sub.created_at, sub.metadata.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::error::HandlerError;
    use crate::event::Event;

    struct NoopHandler;

    #[async_trait]
    impl EventHandler for NoopHandler {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn handle(&self, _event: Arc<Event>) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn noop() -> Arc<dyn EventHandler> {
        Arc::new(NoopHandler)
    }

    #[test]
    fn matching_orders_by_priority_then_insertion() {
        let registry = SubscriptionRegistry::new();
        let low = registry.insert(
            Pattern::exact("expense.created"),
            noop(),
            SubscribeOptions::default().priority(5),
        );
        let high = registry.insert(
            Pattern::exact("expense.created"),
            noop(),
            SubscribeOptions::default().priority(10),
        );
        // Same priority as `high`; registered later, so sorts after it.
        let high_later = registry.insert(
            Pattern::parse("expense.*").unwrap(),
            noop(),
            SubscribeOptions::default().priority(10),
        );

        let matched = registry.matching("expense.created");
        let ids: Vec<SubscriptionId> = matched.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![high, high_later, low]);
    }

    #[test]
    fn matching_skips_inactive_subscriptions() {
        let registry = SubscriptionRegistry::new();
        let id = registry.insert(Pattern::All, noop(), SubscribeOptions::default());

        assert_eq!(registry.matching("anything").len(), 1);

        registry.set_active(id, false).unwrap();
        assert!(registry.matching("anything").is_empty());
        assert_eq!(
            registry.counts(),
            SubscriptionCounts { active: 0, total: 1 }
        );

        registry.set_active(id, true).unwrap();
        assert_eq!(registry.matching("anything").len(), 1);
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let registry = SubscriptionRegistry::new();
        registry.insert(Pattern::All, noop(), SubscribeOptions::default());

        let unknown = SubscriptionId::new();
        let err = registry.remove(unknown).unwrap_err();
        assert!(matches!(
            err,
            BusError::SubscriptionNotFound { id } if id == unknown
        ));
    }

    #[test]
    fn remove_drops_subscription_and_empty_bucket() {
        let registry = SubscriptionRegistry::new();
        let a = registry.insert(Pattern::exact("a"), noop(), SubscribeOptions::default());
        let b = registry.insert(Pattern::exact("b"), noop(), SubscribeOptions::default());

        registry.remove(a).unwrap();
        assert!(registry.matching("a").is_empty());
        assert_eq!(registry.matching("b").len(), 1);
        assert_eq!(
            registry.counts(),
            SubscriptionCounts { active: 1, total: 1 }
        );

        // Second removal of the same ID fails.
        assert!(registry.remove(a).is_err());
        registry.remove(b).unwrap();
        assert_eq!(registry.counts(), SubscriptionCounts::default());
    }

    #[test]
    fn describe_returns_metadata() {
        let registry = SubscriptionRegistry::new();
        let id = registry.insert(
            Pattern::All,
            noop(),
            SubscribeOptions::default().metadata("owner", "reporting"),
        );

        let (_created_at, metadata) = registry.describe(id).unwrap();
        assert_eq!(metadata.get("owner").map(String::as_str), Some("reporting"));
        assert!(registry.describe(SubscriptionId::new()).is_none());
    }
}
