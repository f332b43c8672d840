//! Event bus dispatcher.
//!
//! Matches published events against the subscription registry and fans them
//! out to handlers. Fan-out is concurrent but bounded: at most
//! `max_concurrent_dispatch` handler invocations run at once, enforced with
//! a semaphore rather than unbounded task growth. Publishers wait for all
//! matched handlers to finish and receive one aggregate error listing every
//! failure.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::archive::EventArchiver;
use crate::bus::middleware::{compose, HandlerFuture, Middleware, Next};
use crate::bus::registry::{
    MatchedSubscription, SubscribeOptions, SubscriptionId, SubscriptionRegistry,
};
use crate::bus::stats::{BusStats, StatsRecorder};
use crate::error::{BusError, BusResult, HandlerError, HandlerFailure, HandlerFailures};
use crate::event::Event;
use crate::handlers::EventHandler;
use crate::pattern::Pattern;
use crate::storage::EventStore;

/// Default cap on concurrently running handler invocations.
pub const DEFAULT_MAX_CONCURRENT_DISPATCH: usize = 64;

/// Default archive queue capacity.
pub const DEFAULT_ARCHIVE_QUEUE_CAPACITY: usize = 4096;

/// Default archive retention hint: 24 hours.
pub const DEFAULT_ARCHIVE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// How matched handlers are executed within one publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Handlers run concurrently (bounded by `max_concurrent_dispatch`).
    /// Priority fixes the deterministic spawn/iteration order only; no
    /// ordering between handler side effects is guaranteed.
    #[default]
    Concurrent,
    /// Handlers are awaited one at a time in strict priority order
    /// (descending priority, then registration order).
    Sequential,
}

/// Event bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Max handler invocations running at once (min 1).
    pub max_concurrent_dispatch: usize,
    /// Execution mode for matched handlers.
    pub dispatch: DispatchMode,
    /// Max queued archive messages before drops apply.
    pub archive_queue_capacity: usize,
    /// Retention hint passed to the event store; `None` keeps records
    /// indefinitely.
    pub archive_retention: Option<Duration>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_concurrent_dispatch: DEFAULT_MAX_CONCURRENT_DISPATCH,
            dispatch: DispatchMode::Concurrent,
            archive_queue_capacity: DEFAULT_ARCHIVE_QUEUE_CAPACITY,
            archive_retention: Some(DEFAULT_ARCHIVE_RETENTION),
        }
    }
}

struct BusInner {
    registry: SubscriptionRegistry,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    stats: StatsRecorder,
    limiter: Arc<Semaphore>,
    archiver: Option<EventArchiver>,
    dispatch: DispatchMode,
    closed: AtomicBool,
}

/// The event bus.
///
/// Cheap to clone; clones share the registry, middleware, statistics, and
/// archive worker. Subscriptions registered on one clone are visible to
/// publishes on any other.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a bus with default configuration and no event store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus with the given configuration and no event store.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a bus that archives published events to `store`.
    #[must_use]
    pub fn with_store(config: BusConfig, store: Arc<dyn EventStore>) -> Self {
        Self::build(config, Some(store))
    }

    fn build(config: BusConfig, store: Option<Arc<dyn EventStore>>) -> Self {
        let archiver = store.map(|store| {
            EventArchiver::new(
                config.archive_queue_capacity,
                config.archive_retention,
                store,
            )
        });

        Self {
            inner: Arc::new(BusInner {
                registry: SubscriptionRegistry::new(),
                middleware: RwLock::new(Vec::new()),
                stats: StatsRecorder::new(),
                limiter: Arc::new(Semaphore::new(config.max_concurrent_dispatch.max(1))),
                archiver,
                dispatch: config.dispatch,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a handler for an exact event type. Always succeeds; a
    /// handler may be registered any number of times, each registration
    /// being an independent subscription.
    pub fn subscribe(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        self.subscribe_with(event_type, handler, SubscribeOptions::default())
    }

    /// Registers a handler for an exact event type with options.
    pub fn subscribe_with(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let pattern = Pattern::exact(event_type);
        let id = self.inner.registry.insert(pattern, handler, options);
        debug!(subscription_id = %id, "Subscription registered");
        id
    }

    /// Registers a handler for a pattern (`"*"`, `"prefix*"`, or exact).
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty pattern.
    pub fn subscribe_pattern(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
    ) -> BusResult<SubscriptionId> {
        self.subscribe_pattern_with(pattern, handler, SubscribeOptions::default())
    }

    /// Registers a handler for a pattern with options.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty pattern.
    pub fn subscribe_pattern_with(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> BusResult<SubscriptionId> {
        let pattern = Pattern::parse(pattern)?;
        let id = self.inner.registry.insert(pattern, handler, options);
        debug!(subscription_id = %id, "Pattern subscription registered");
        Ok(id)
    }

    /// Removes a subscription. After this returns, the subscription is
    /// never invoked by subsequent publishes.
    ///
    /// # Errors
    ///
    /// Returns `BusError::SubscriptionNotFound` for an unknown ID.
    pub fn unsubscribe(&self, id: SubscriptionId) -> BusResult<()> {
        self.inner.registry.remove(id)?;
        debug!(subscription_id = %id, "Subscription removed");
        Ok(())
    }

    /// Pauses a subscription without removing it. Paused subscriptions are
    /// skipped by publish but still counted in `total_subscriptions`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::SubscriptionNotFound` for an unknown ID.
    pub fn pause(&self, id: SubscriptionId) -> BusResult<()> {
        self.inner.registry.set_active(id, false)
    }

    /// Reactivates a paused subscription.
    ///
    /// # Errors
    ///
    /// Returns `BusError::SubscriptionNotFound` for an unknown ID.
    pub fn resume(&self, id: SubscriptionId) -> BusResult<()> {
        self.inner.registry.set_active(id, true)
    }

    /// Appends middleware. The chain is composed fresh per publish;
    /// first-registered middleware runs outermost.
    pub fn layer(&self, middleware: impl Middleware + 'static) {
        self.inner
            .middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(middleware));
    }

    /// Publishes an event to all matching subscriptions and waits for every
    /// matched handler to finish.
    ///
    /// With no matching subscription this is a no-op returning `Ok`. A
    /// handler registered under two independently matching patterns is
    /// invoked once per matching subscription — twice, deliberately; see
    /// the crate docs on duplicate delivery.
    ///
    /// The event is archived best-effort when a store is configured;
    /// archive problems surface only in [`BusStats`], never here.
    ///
    /// # Errors
    ///
    /// `BusError::Closed` after [`close`](Self::close), or
    /// `BusError::Dispatch` aggregating every handler failure. A failing
    /// handler never blocks or cancels its siblings.
    pub async fn publish(&self, event: Event) -> BusResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        self.inner.stats.record_published();

        let matched = self.inner.registry.matching(event.event_type());
        if matched.is_empty() {
            trace!(event_type = event.event_type(), "No subscriptions matched");
            return Ok(());
        }

        trace!(
            event_type = event.event_type(),
            event_id = %event.id(),
            matched = matched.len(),
            "Dispatching event"
        );

        if let Some(archiver) = &self.inner.archiver {
            archiver.enqueue(&event);
        }

        let middleware = self
            .inner
            .middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let event = Arc::new(event);
        let failures = match self.inner.dispatch {
            DispatchMode::Concurrent => self.dispatch_concurrent(&middleware, &event, matched).await,
            DispatchMode::Sequential => self.dispatch_sequential(&middleware, &event, matched).await,
        };

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(
                event_id = %event.id(),
                failed = failures.len(),
                "Handler failures during dispatch"
            );
            Err(BusError::Dispatch(HandlerFailures(failures)))
        }
    }

    /// Fire-and-forget publish. The result is logged, never propagated; the
    /// caller does not wait for handlers.
    pub fn publish_async(&self, event: Event) {
        let bus = self.clone();
        tokio::spawn(async move {
            if let Err(error) = bus.publish(event).await {
                warn!(%error, "Async publish failed");
            }
        });
    }

    /// Creation time and metadata of a subscription, or `None` if the ID is
    /// unknown (or was unsubscribed).
    #[must_use]
    pub fn describe_subscription(
        &self,
        id: SubscriptionId,
    ) -> Option<(DateTime<Utc>, BTreeMap<String, String>)> {
        self.inner.registry.describe(id)
    }

    /// Snapshot of dispatch statistics.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        let (archive_dropped, archive_failures) = self
            .inner
            .archiver
            .as_ref()
            .map_or((0, 0), |archiver| {
                (archiver.dropped(), archiver.store_failures())
            });

        self.inner
            .stats
            .snapshot(self.inner.registry.counts(), archive_dropped, archive_failures)
    }

    /// Closes the bus. Subsequent publishes fail with `BusError::Closed`.
    ///
    /// Idempotent. Handler invocations already in flight are NOT awaited;
    /// callers that need a quiescent shutdown must stop publishing and
    /// drain their own work first.
    ///
    /// # Errors
    ///
    /// None currently; the `Result` reserves room for stores that need a
    /// flush on shutdown.
    pub fn close(&self) -> BusResult<()> {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("Event bus closed");
        }
        Ok(())
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    async fn dispatch_concurrent(
        &self,
        middleware: &[Arc<dyn Middleware>],
        event: &Arc<Event>,
        matched: Vec<MatchedSubscription>,
    ) -> Vec<HandlerFailure> {
        let mut tasks: JoinSet<(Duration, Result<(), HandlerError>)> = JoinSet::new();
        let mut task_meta: HashMap<tokio::task::Id, (SubscriptionId, &'static str)> =
            HashMap::with_capacity(matched.len());

        for sub in matched {
            let entry = compose(middleware, handler_entry(Arc::clone(&sub.handler)));
            let event = Arc::clone(event);
            let limiter = Arc::clone(&self.inner.limiter);

            let handle = tasks.spawn(async move {
                let permit = limiter.acquire_owned().await;
                let started = Instant::now();
                let result = match permit {
                    Ok(_permit) => entry(event).await,
                    Err(_) => Err(HandlerError::Other("dispatch limiter closed".to_string())),
                };
                (started.elapsed(), result)
            });
            task_meta.insert(handle.id(), (sub.id, sub.handler_name));
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task_id, (elapsed, result))) => {
                    self.inner.stats.record_invocation(elapsed, result.is_ok());
                    if let Err(error) = result {
                        let (subscription_id, handler) = task_meta
                            .remove(&task_id)
                            .map_or((SubscriptionId::default(), "unknown"), |meta| meta);
                        failures.push(HandlerFailure {
                            subscription_id,
                            handler: handler.to_string(),
                            error,
                        });
                    }
                }
                Err(join_err) => {
                    // A panicking handler counts as a failed invocation.
                    self.inner.stats.record_invocation(Duration::ZERO, false);
                    let (subscription_id, handler) = task_meta
                        .remove(&join_err.id())
                        .map_or((SubscriptionId::default(), "unknown"), |meta| meta);
                    failures.push(HandlerFailure {
                        subscription_id,
                        handler: handler.to_string(),
                        error: HandlerError::Other(format!("handler panicked: {join_err}")),
                    });
                }
            }
        }

        failures
    }

    async fn dispatch_sequential(
        &self,
        middleware: &[Arc<dyn Middleware>],
        event: &Arc<Event>,
        matched: Vec<MatchedSubscription>,
    ) -> Vec<HandlerFailure> {
        let mut failures = Vec::new();

        for sub in matched {
            let entry = compose(middleware, handler_entry(Arc::clone(&sub.handler)));
            let started = Instant::now();
            let result = entry(Arc::clone(event)).await;
            self.inner
                .stats
                .record_invocation(started.elapsed(), result.is_ok());
            if let Err(error) = result {
                failures.push(HandlerFailure {
                    subscription_id: sub.id,
                    handler: sub.handler_name.to_string(),
                    error,
                });
            }
        }

        failures
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("dispatch", &self.inner.dispatch)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .field("subscriptions", &self.inner.registry.counts())
            .finish_non_exhaustive()
    }
}

fn handler_entry(handler: Arc<dyn EventHandler>) -> Next {
    Arc::new(move |event| -> HandlerFuture {
        let handler = Arc::clone(&handler);
        Box::pin(async move { handler.handle(event).await })
    })
}
