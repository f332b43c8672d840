//! Event handlers for the budget tracker.
//!
//! Handlers are independent consumers: each one switches on the event type
//! and produces its own derived record (audit entry, outbound notification,
//! in-memory metric). None of them depends on the others, and none retains
//! the event beyond the `handle` call.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::event::Event;

mod analytics;
mod audit;
mod notification;

pub use analytics::{AnalyticsHandler, AnalyticsSnapshot};
pub use audit::{AuditHandler, AuditRecord};
pub use notification::{NotificationChannel, NotificationHandler, OutboundNotification};

/// A consumer of published events.
///
/// Implementations must be cheap to call for event types they do not care
/// about: return `Ok(())` rather than an error for unhandled types.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable handler name, used in logs and aggregate dispatch errors.
    fn name(&self) -> &'static str;

    /// Process one event.
    ///
    /// The event arrives behind an `Arc` because dispatch is concurrent;
    /// do not store the `Arc` past the call.
    ///
    /// # Errors
    ///
    /// Handler-specific failures. The bus collects these per publish and
    /// never retries.
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError>;
}
