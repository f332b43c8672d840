//! Analytics handler.
//!
//! Aggregates derived metrics from the event stream into in-memory maps:
//! spend per user and category, income per user, per-type event counters,
//! and login counts. All state sits behind one mutex; readers get snapshot
//! copies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::event::{Event, EventPayload, UserId};
use crate::handlers::EventHandler;

#[derive(Debug, Default)]
struct AnalyticsState {
    spend_by_category: HashMap<(UserId, String), i64>,
    income_by_user: HashMap<UserId, i64>,
    events_by_type: HashMap<&'static str, u64>,
    logins_by_user: HashMap<UserId, u64>,
    budgets_exceeded: u64,
}

/// Point-in-time copy of the aggregated metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsSnapshot {
    /// Net spend in cents per (user, category).
    pub spend_by_category: HashMap<(UserId, String), i64>,
    /// Total income in cents per user.
    pub income_by_user: HashMap<UserId, i64>,
    /// Count of events seen, per event-type tag.
    pub events_by_type: HashMap<&'static str, u64>,
    /// Sign-in count per user.
    pub logins_by_user: HashMap<UserId, u64>,
    /// How many budget.exceeded events were observed.
    pub budgets_exceeded: u64,
}

/// Handler that folds the event stream into aggregate metrics.
#[derive(Debug, Default)]
pub struct AnalyticsHandler {
    state: Mutex<AnalyticsState>,
}

impl AnalyticsHandler {
    /// Creates an analytics handler with empty aggregates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current aggregates.
    #[must_use]
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        self.state
            .lock()
            .map(|state| AnalyticsSnapshot {
                spend_by_category: state.spend_by_category.clone(),
                income_by_user: state.income_by_user.clone(),
                events_by_type: state.events_by_type.clone(),
                logins_by_user: state.logins_by_user.clone(),
                budgets_exceeded: state.budgets_exceeded,
            })
            .unwrap_or_default()
    }

    /// Net spend in cents for one user and category.
    #[must_use]
    pub fn category_spend(&self, user_id: UserId, category: &str) -> i64 {
        self.state
            .lock()
            .map(|state| {
                state
                    .spend_by_category
                    .get(&(user_id, category.to_string()))
                    .copied()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventHandler for AnalyticsHandler {
    fn name(&self) -> &'static str {
        "analytics"
    }

    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HandlerError::Other("analytics lock poisoned".to_string()))?;

        *state.events_by_type.entry(event.event_type()).or_insert(0) += 1;

        match event.payload() {
            EventPayload::ExpenseCreated {
                user_id,
                category,
                amount_cents,
                ..
            } => {
                *state
                    .spend_by_category
                    .entry((*user_id, category.clone()))
                    .or_insert(0) += amount_cents;
            }
            EventPayload::ExpenseUpdated {
                user_id,
                category,
                amount_cents,
                previous_amount_cents,
                ..
            } => {
                *state
                    .spend_by_category
                    .entry((*user_id, category.clone()))
                    .or_insert(0) += amount_cents - previous_amount_cents;
            }
            EventPayload::ExpenseDeleted {
                user_id,
                category,
                amount_cents,
                ..
            } => {
                *state
                    .spend_by_category
                    .entry((*user_id, category.clone()))
                    .or_insert(0) -= amount_cents;
            }
            EventPayload::IncomeRecorded {
                user_id,
                amount_cents,
                ..
            } => {
                *state.income_by_user.entry(*user_id).or_insert(0) += amount_cents;
            }
            EventPayload::BudgetExceeded { .. } => {
                state.budgets_exceeded += 1;
            }
            EventPayload::UserLoggedIn { user_id } => {
                *state.logins_by_user.entry(*user_id).or_insert(0) += 1;
            }
            EventPayload::BudgetSet { .. } => {}
        }

        Ok(())
    }
}
