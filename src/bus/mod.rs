//! Event bus: subscription registry, middleware, statistics, dispatcher.
//!
//! The bus is an in-process library invoked by the service layer after its
//! primary write commits. Dispatch failures affect only event-driven side
//! effects (audit entries, notifications, metrics), never the operation
//! that raised the event.

/// Dispatch loop and bus surface.
pub mod dispatcher;
/// Handler-wrapping middleware.
pub mod middleware;
/// Subscription storage and pattern matching.
pub mod registry;
/// Dispatch statistics.
pub mod stats;

pub use dispatcher::{BusConfig, DispatchMode, EventBus, DEFAULT_MAX_CONCURRENT_DISPATCH};
pub use middleware::{HandlerFuture, Middleware, Next};
pub use registry::{SubscribeOptions, SubscriptionId};
pub use stats::BusStats;
