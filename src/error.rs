//! Error types for tallybus.
//!
//! All errors are strongly typed using thiserror. The layering mirrors the
//! subsystem boundaries: validation errors at event construction, storage
//! errors from the archive collaborator, handler errors from individual
//! consumers, and a top-level `BusError` that callers match on.

use std::fmt;

use thiserror::Error;

use crate::bus::registry::SubscriptionId;

/// Validation errors raised when constructing events or subscriptions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Event origin must identify the producing component.
    #[error("Event origin cannot be empty")]
    EmptyOrigin,

    /// User IDs must be real; the nil UUID is a construction bug upstream.
    #[error("User ID cannot be the nil UUID")]
    NilUserId,

    /// Expense/budget categories must be non-empty.
    #[error("Category cannot be empty")]
    EmptyCategory,

    /// Income source labels must be non-empty.
    #[error("Income source cannot be empty")]
    EmptySource,

    /// Monetary amounts are integer cents and must be positive.
    #[error("Amount must be positive, got {amount_cents} cents")]
    NonPositiveAmount {
        /// The rejected amount.
        amount_cents: i64,
    },

    /// Subscription patterns must be non-empty.
    #[error("Subscription pattern cannot be empty")]
    EmptyPattern,
}

/// Errors from the event store collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record under the given key.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Backend error (poisoned lock, I/O, connection).
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Errors returned by individual event handlers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// An outbound notification channel refused the message.
    #[error("Channel {channel} unavailable: {reason}")]
    ChannelUnavailable {
        /// Channel label (email, push, webhook).
        channel: String,
        /// Why delivery failed.
        reason: String,
    },

    /// The handler could not serialize the event for its derived record.
    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    /// Catch-all for handler-specific failures.
    #[error("Handler failed: {0}")]
    Other(String),
}

/// A single handler failure inside an aggregate dispatch error.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Subscription whose handler failed.
    pub subscription_id: SubscriptionId,
    /// Handler name (as reported by `EventHandler::name`).
    pub handler: String,
    /// The underlying error.
    pub error: HandlerError,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subscription {} (handler {}): {}",
            self.subscription_id, self.handler, self.error
        )
    }
}

/// Aggregate of all handler failures from one publish call.
///
/// A failing handler never blocks or cancels its siblings, so one publish
/// can surface several failures at once.
#[derive(Debug, Clone)]
pub struct HandlerFailures(pub Vec<HandlerFailure>);

impl fmt::Display for HandlerFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} handler(s) failed: ", self.0.len())?;
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Top-level error type for tallybus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unsubscribe/pause/resume referenced an unknown subscription.
    #[error("Subscription not found: {id}")]
    SubscriptionNotFound {
        /// The unknown ID.
        id: SubscriptionId,
    },

    /// One or more handlers failed during publish.
    #[error("Dispatch failed: {0}")]
    Dispatch(HandlerFailures),

    /// The bus has been closed; no further publishes are accepted.
    #[error("Event bus is closed")]
    Closed,

    /// Event store error surfaced outside the best-effort archive path.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BusError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error aggregates handler failures.
    #[must_use]
    pub const fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// The individual handler failures, if this is a dispatch error.
    #[must_use]
    pub fn handler_failures(&self) -> Option<&[HandlerFailure]> {
        match self {
            Self::Dispatch(HandlerFailures(failures)) => Some(failures),
            _ => None,
        }
    }
}

/// Result type alias for tallybus operations.
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_amount_message() {
        let err = ValidationError::NonPositiveAmount { amount_cents: -250 };
        let msg = format!("{err}");
        assert!(msg.contains("-250"));
        assert!(msg.contains("positive"));
    }

    #[test]
    fn handler_failures_display_lists_every_subscription() {
        let a = SubscriptionId::new();
        let b = SubscriptionId::new();
        let err = BusError::Dispatch(HandlerFailures(vec![
            HandlerFailure {
                subscription_id: a,
                handler: "audit".to_string(),
                error: HandlerError::Other("boom".to_string()),
            },
            HandlerFailure {
                subscription_id: b,
                handler: "notification".to_string(),
                error: HandlerError::ChannelUnavailable {
                    channel: "email".to_string(),
                    reason: "smtp down".to_string(),
                },
            },
        ]));

        let msg = format!("{err}");
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
        assert!(msg.contains("boom"));
        assert!(msg.contains("smtp down"));
        assert!(err.is_dispatch());
        assert_eq!(err.handler_failures().map(<[_]>::len), Some(2));
    }

    #[test]
    fn bus_error_from_validation() {
        let err: BusError = ValidationError::EmptyCategory.into();
        assert!(err.is_validation());
        assert!(!err.is_dispatch());
        assert!(err.handler_failures().is_none());
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::BackendError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));

        let err = StorageError::KeyNotFound("events/x".to_string());
        assert!(err.to_string().contains("events/x"));
    }
}
