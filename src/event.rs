//! Domain event types for the budget tracker.
//!
//! Events are immutable records of something that happened: an expense was
//! created, income was recorded, a budget limit was crossed. Every event
//! carries a typed payload from a closed union; there is no loosely-typed
//! payload escape hatch, so a handler can always rely on a validated
//! structure with a required user ID.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Schema version stamped on every event envelope.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
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

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// True for the all-zero UUID, which is never a valid user.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed union of domain event payloads.
///
/// Every variant carries the user the event belongs to. Amounts are integer
/// cents; budget periods are the first day of the month they cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// An expense was recorded.
    ExpenseCreated {
        /// Owning user.
        user_id: UserId,
        /// The new expense row.
        expense_id: Uuid,
        /// Spending category (e.g. "groceries").
        category: String,
        /// Amount in cents.
        amount_cents: i64,
        /// Day the money was spent.
        spent_on: NaiveDate,
    },

    /// An existing expense was edited.
    ExpenseUpdated {
        /// Owning user.
        user_id: UserId,
        /// The edited expense row.
        expense_id: Uuid,
        /// Spending category after the edit.
        category: String,
        /// Amount in cents after the edit.
        amount_cents: i64,
        /// Amount in cents before the edit.
        previous_amount_cents: i64,
    },

    /// An expense was removed.
    ExpenseDeleted {
        /// Owning user.
        user_id: UserId,
        /// The removed expense row.
        expense_id: Uuid,
        /// Category the expense belonged to.
        category: String,
        /// Amount in cents that was removed.
        amount_cents: i64,
    },

    /// An income source payment was recorded.
    IncomeRecorded {
        /// Owning user.
        user_id: UserId,
        /// The new income row.
        income_id: Uuid,
        /// Income source label (e.g. "salary").
        source: String,
        /// Amount in cents.
        amount_cents: i64,
        /// Day the money arrived.
        received_on: NaiveDate,
    },

    /// A monthly budget limit was created or changed.
    BudgetSet {
        /// Owning user.
        user_id: UserId,
        /// Budgeted category.
        category: String,
        /// Limit in cents for the period.
        limit_cents: i64,
        /// First day of the budgeted month.
        period: NaiveDate,
    },

    /// Spending in a category crossed its budget limit.
    BudgetExceeded {
        /// Owning user.
        user_id: UserId,
        /// Category that went over.
        category: String,
        /// Configured limit in cents.
        limit_cents: i64,
        /// Total spent in cents, including the triggering expense.
        spent_cents: i64,
        /// First day of the budgeted month.
        period: NaiveDate,
    },

    /// A user signed in.
    UserLoggedIn {
        /// The user who signed in.
        user_id: UserId,
    },
}

impl EventPayload {
    /// The dot-namespaced type tag for this payload.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ExpenseCreated { .. } => "expense.created",
            Self::ExpenseUpdated { .. } => "expense.updated",
            Self::ExpenseDeleted { .. } => "expense.deleted",
            Self::IncomeRecorded { .. } => "income.recorded",
            Self::BudgetSet { .. } => "budget.set",
            Self::BudgetExceeded { .. } => "budget.exceeded",
            Self::UserLoggedIn { .. } => "user.logged_in",
        }
    }

    /// The user this event belongs to. Required on every variant.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        match self {
            Self::ExpenseCreated { user_id, .. }
            | Self::ExpenseUpdated { user_id, .. }
            | Self::ExpenseDeleted { user_id, .. }
            | Self::IncomeRecorded { user_id, .. }
            | Self::BudgetSet { user_id, .. }
            | Self::BudgetExceeded { user_id, .. }
            | Self::UserLoggedIn { user_id } => *user_id,
        }
    }

    /// Validates payload fields that cannot be enforced by the type system.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for nil user IDs, empty category/source
    /// labels, or non-positive amounts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id().is_nil() {
            return Err(ValidationError::NilUserId);
        }

        match self {
            Self::ExpenseCreated {
                category,
                amount_cents,
                ..
            }
            | Self::ExpenseDeleted {
                category,
                amount_cents,
                ..
            } => {
                check_category(category)?;
                check_amount(*amount_cents)?;
            }
            Self::ExpenseUpdated {
                category,
                amount_cents,
                previous_amount_cents,
                ..
            } => {
                check_category(category)?;
                check_amount(*amount_cents)?;
                check_amount(*previous_amount_cents)?;
            }
            Self::IncomeRecorded {
                source,
                amount_cents,
                ..
            } => {
                if source.trim().is_empty() {
                    return Err(ValidationError::EmptySource);
                }
                check_amount(*amount_cents)?;
            }
            Self::BudgetSet {
                category,
                limit_cents,
                ..
            } => {
                check_category(category)?;
                check_amount(*limit_cents)?;
            }
            Self::BudgetExceeded {
                category,
                limit_cents,
                spent_cents,
                ..
            } => {
                check_category(category)?;
                check_amount(*limit_cents)?;
                check_amount(*spent_cents)?;
            }
            Self::UserLoggedIn { .. } => {}
        }

        Ok(())
    }
}

fn check_category(category: &str) -> Result<(), ValidationError> {
    if category.trim().is_empty() {
        return Err(ValidationError::EmptyCategory);
    }
    Ok(())
}

fn check_amount(amount_cents: i64) -> Result<(), ValidationError> {
    if amount_cents <= 0 {
        return Err(ValidationError::NonPositiveAmount { amount_cents });
    }
    Ok(())
}

/// An immutable domain event.
///
/// ID and timestamp are assigned at construction and never change. Handlers
/// receive events behind an `Arc` and must not retain them beyond the call.
///
/// # Examples
///
/// ```
/// use tallybus::{Event, EventPayload, UserId};
///
/// let event = Event::new(
///     "expense-service",
///     EventPayload::UserLoggedIn { user_id: UserId::new() },
/// )
/// .unwrap();
///
/// assert_eq!(event.event_type(), "user.logged_in");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    payload: EventPayload,
    occurred_at: DateTime<Utc>,
    origin: String,
    schema_version: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

impl Event {
    /// Creates a new event, validating the payload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyOrigin` if `origin` is blank, or any
    /// payload validation error.
    pub fn new(origin: impl Into<String>, payload: EventPayload) -> Result<Self, ValidationError> {
        let origin = origin.into();
        if origin.trim().is_empty() {
            return Err(ValidationError::EmptyOrigin);
        }
        payload.validate()?;

        Ok(Self {
            id: EventId::new(),
            payload,
            occurred_at: Utc::now(),
            origin,
            schema_version: EVENT_SCHEMA_VERSION,
            metadata: BTreeMap::new(),
        })
    }

    /// Attach a metadata entry (builder style).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The event's unique ID.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// The typed payload.
    #[must_use]
    pub const fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// The dot-namespaced type tag (e.g. `"expense.created"`).
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// The user this event belongs to.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.payload.user_id()
    }

    /// When the event was constructed (UTC).
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// The component that produced the event.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Envelope schema version.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Free-form metadata entries.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}
