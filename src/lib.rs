//! # tallybus — event dispatch for the Tally budget tracker
//!
//! tallybus is the in-process event subsystem behind Tally's expense,
//! income, and budget services. After a primary write commits, the service
//! layer publishes a typed domain event; the bus matches it against pattern
//! subscriptions and fans it out to independent consumers (audit trail,
//! notifications, analytics) with bounded concurrency.
//!
//! ## Core concepts
//!
//! - **Event**: immutable record of something that happened, with a typed
//!   payload from a closed union and a required user ID.
//! - **Pattern**: an exact event-type tag, a trailing-wildcard prefix
//!   (`"expense.*"`), or `"*"` for everything.
//! - **Subscription**: a registered interest binding a pattern to a
//!   handler, with a priority and an active flag.
//! - **Dispatcher**: resolves subscriptions, runs matched handlers, and
//!   aggregates their errors into one result per publish.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use tallybus::{AuditHandler, Event, EventBus, EventPayload, UserId};
//!
//! # async fn example() -> tallybus::BusResult<()> {
//! let bus = EventBus::new();
//!
//! let audit = Arc::new(AuditHandler::new());
//! bus.subscribe_pattern("*", audit.clone())?;
//!
//! let event = Event::new(
//!     "auth-service",
//!     EventPayload::UserLoggedIn { user_id: UserId::new() },
//! )?;
//! bus.publish(event).await?;
//!
//! assert_eq!(audit.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Duplicate delivery
//!
//! A handler registered under two independently matching patterns (say
//! `"expense.*"` and `"expense.created"`) is invoked once per matching
//! subscription — twice for one `expense.created` event. Subscriptions are
//! independent registrations; an audit subscription is never suppressed
//! because a broader one also matches.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod archive;
pub mod bus;
pub mod error;
pub mod event;
pub mod handlers;
pub mod pattern;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use bus::{
    BusConfig, BusStats, DispatchMode, EventBus, HandlerFuture, Middleware, Next,
    SubscribeOptions, SubscriptionId, DEFAULT_MAX_CONCURRENT_DISPATCH,
};
pub use error::{
    BusError, BusResult, HandlerError, HandlerFailure, HandlerFailures, StorageError,
    ValidationError,
};
pub use event::{Event, EventId, EventPayload, UserId, EVENT_SCHEMA_VERSION};
pub use handlers::{
    AnalyticsHandler, AnalyticsSnapshot, AuditHandler, AuditRecord, EventHandler,
    NotificationChannel, NotificationHandler, OutboundNotification,
};
pub use pattern::Pattern;
pub use storage::{EventStore, InMemoryEventStore};
