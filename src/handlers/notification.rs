//! Notification handler.
//!
//! Routes events to outbound notification channels. Delivery is stubbed:
//! each channel has a simulated latency and the handler records what would
//! have been sent, which is what the surrounding application inspects in
//! tests and local runs.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HandlerError;
use crate::event::{Event, EventId, EventPayload, UserId};
use crate::handlers::EventHandler;

/// Outbound notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Email delivery.
    Email,
    /// Mobile push delivery.
    Push,
    /// Webhook callout.
    Webhook,
}

impl NotificationChannel {
    /// Simulated delivery latency for the stubbed channel.
    #[must_use]
    pub const fn simulated_latency(self) -> Duration {
        match self {
            Self::Email => Duration::from_millis(5),
            Self::Push => Duration::from_millis(2),
            Self::Webhook => Duration::from_millis(8),
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Push => write!(f, "push"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

/// A notification the handler would have delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotification {
    /// Channel the message was routed to.
    pub channel: NotificationChannel,
    /// Recipient user.
    pub user_id: UserId,
    /// Event that triggered the message.
    pub event_id: EventId,
    /// Human-readable message body.
    pub body: String,
    /// When the stub "sent" it.
    pub sent_at: DateTime<Utc>,
}

/// Handler that turns selected events into user notifications.
///
/// Routing:
/// - `budget.exceeded` → email + push (the one users actually care about)
/// - `expense.created` → push receipt
/// - `user.logged_in` → email security notice
///
/// Everything else is ignored.
#[derive(Debug, Default)]
pub struct NotificationHandler {
    sent: Mutex<Vec<OutboundNotification>>,
}

impl NotificationHandler {
    /// Creates a notification handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything "sent" so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundNotification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Number of notifications sent.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }

    fn routes(event: &Event) -> Vec<(NotificationChannel, String)> {
        match event.payload() {
            EventPayload::BudgetExceeded {
                category,
                limit_cents,
                spent_cents,
                ..
            } => {
                let body = format!(
                    "Budget exceeded for {category}: spent {} of {} limit",
                    format_cents(*spent_cents),
                    format_cents(*limit_cents),
                );
                vec![
                    (NotificationChannel::Email, body.clone()),
                    (NotificationChannel::Push, body),
                ]
            }
            EventPayload::ExpenseCreated {
                category,
                amount_cents,
                ..
            } => vec![(
                NotificationChannel::Push,
                format!("Recorded {} expense in {category}", format_cents(*amount_cents)),
            )],
            EventPayload::UserLoggedIn { .. } => vec![(
                NotificationChannel::Email,
                "New sign-in to your account".to_string(),
            )],
            _ => Vec::new(),
        }
    }

    async fn deliver(
        &self,
        channel: NotificationChannel,
        body: String,
        event: &Event,
    ) -> Result<(), HandlerError> {
        // Stub transport: sleep for the channel's simulated latency.
        tokio::time::sleep(channel.simulated_latency()).await;

        debug!(
            channel = %channel,
            user_id = %event.user_id(),
            event_type = event.event_type(),
            "Notification dispatched"
        );

        let mut sent = self.sent.lock().map_err(|_| HandlerError::ChannelUnavailable {
            channel: channel.to_string(),
            reason: "outbox lock poisoned".to_string(),
        })?;
        sent.push(OutboundNotification {
            channel,
            user_id: event.user_id(),
            event_id: event.id(),
            body,
            sent_at: Utc::now(),
        });
        Ok(())
    }
}

fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[async_trait]
impl EventHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        for (channel, body) in Self::routes(&event) {
            self.deliver(channel, body, &event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn budget_exceeded() -> Event {
        Event::new(
            "budget-service",
            EventPayload::BudgetExceeded {
                user_id: UserId::new(),
                category: "dining".to_string(),
                limit_cents: 20_000,
                spent_cents: 23_550,
                period: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn budget_exceeded_goes_to_email_and_push() {
        let handler = NotificationHandler::new();
        let event = budget_exceeded();
        handler.handle(Arc::new(event.clone())).await.unwrap();

        let sent = handler.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel, NotificationChannel::Email);
        assert_eq!(sent[1].channel, NotificationChannel::Push);
        for msg in &sent {
            assert_eq!(msg.user_id, event.user_id());
            assert_eq!(msg.event_id, event.id());
            assert!(msg.body.contains("dining"));
            assert!(msg.body.contains("235.50"));
            assert!(msg.body.contains("200.00"));
        }
    }

    #[tokio::test]
    async fn expense_created_sends_push_receipt() {
        let handler = NotificationHandler::new();
        let event = Event::new(
            "expense-service",
            EventPayload::ExpenseCreated {
                user_id: UserId::new(),
                expense_id: Uuid::new_v4(),
                category: "groceries".to_string(),
                amount_cents: 1299,
                spent_on: NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
            },
        )
        .unwrap();

        handler.handle(Arc::new(event)).await.unwrap();

        let sent = handler.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, NotificationChannel::Push);
        assert!(sent[0].body.contains("12.99"));
    }

    #[tokio::test]
    async fn unrouted_events_are_ignored() {
        let handler = NotificationHandler::new();
        let event = Event::new(
            "income-service",
            EventPayload::IncomeRecorded {
                user_id: UserId::new(),
                income_id: Uuid::new_v4(),
                source: "salary".to_string(),
                amount_cents: 500_000,
                received_on: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            },
        )
        .unwrap();

        handler.handle(Arc::new(event)).await.unwrap();
        assert_eq!(handler.sent_count(), 0);
    }
}
