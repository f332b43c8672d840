//! Handler-wrapping middleware.
//!
//! Middleware wraps the handler entry point the way HTTP middleware wraps a
//! request handler. The chain is composed fresh for every publish:
//! first-registered middleware ends up outermost, last-registered wraps the
//! handler itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::event::Event;

/// Boxed future returned by a handler entry point.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// A handler entry point: takes the event, returns the invocation future.
pub type Next = Arc<dyn Fn(Arc<Event>) -> HandlerFuture + Send + Sync>;

/// Wraps a handler entry point with cross-cutting behavior.
///
/// Closures of type `Fn(Next) -> Next` implement this trait directly:
///
/// ```
/// use std::sync::Arc;
/// use tallybus::{EventBus, Next};
///
/// let bus = EventBus::new();
/// bus.layer(|next: Next| -> Next {
///     Arc::new(move |event| {
///         let next = Arc::clone(&next);
///         Box::pin(async move {
///             tracing::debug!(event_type = event.event_type(), "dispatching");
///             next(event).await
///         })
///     })
/// });
/// ```
pub trait Middleware: Send + Sync {
    /// Returns an entry point that wraps `next`.
    fn wrap(&self, next: Next) -> Next;
}

impl<F> Middleware for F
where
    F: Fn(Next) -> Next + Send + Sync,
{
    fn wrap(&self, next: Next) -> Next {
        self(next)
    }
}

/// Composes the registered middleware around a base entry point.
///
/// Iterates in reverse registration order so the first-registered
/// middleware is applied last and therefore runs outermost.
pub(crate) fn compose(middleware: &[Arc<dyn Middleware>], base: Next) -> Next {
    let mut entry = base;
    for mw in middleware.iter().rev() {
        entry = mw.wrap(entry);
    }
    entry
}
