//! The three domain handlers wired to a real bus.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use tallybus::{
    AnalyticsHandler, AuditHandler, Event, EventBus, EventPayload, NotificationChannel,
    NotificationHandler, SubscribeOptions, UserId,
};

fn wire_bus() -> (
    EventBus,
    Arc<AuditHandler>,
    Arc<NotificationHandler>,
    Arc<AnalyticsHandler>,
) {
    let bus = EventBus::new();

    let audit = Arc::new(AuditHandler::new());
    let notification = Arc::new(NotificationHandler::new());
    let analytics = Arc::new(AnalyticsHandler::new());

    // Audit sees everything; the others pick what they need.
    bus.subscribe_pattern_with(
        "*",
        audit.clone(),
        SubscribeOptions::default().priority(100),
    )
    .unwrap();
    bus.subscribe_pattern("expense.*", notification.clone()).unwrap();
    bus.subscribe("budget.exceeded", notification.clone());
    bus.subscribe("user.logged_in", notification.clone());
    bus.subscribe_pattern("*", analytics.clone()).unwrap();

    (bus, audit, notification, analytics)
}

fn expense(user_id: UserId, category: &str, amount_cents: i64) -> Event {
    Event::new(
        "expense-service",
        EventPayload::ExpenseCreated {
            user_id,
            expense_id: Uuid::new_v4(),
            category: category.to_string(),
            amount_cents,
            spent_on: NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn one_expense_flows_to_all_three_handlers() {
    let (bus, audit, notification, analytics) = wire_bus();

    let user = UserId::new();
    bus.publish(expense(user, "groceries", 1299)).await.unwrap();

    // Audit recorded it with a verifiable checksum.
    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_type, "expense.created");
    assert_eq!(records[0].user_id, user);
    assert_eq!(records[0].checksum.len(), 64);

    // Notification sent a push receipt.
    let sent = notification.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel, NotificationChannel::Push);
    assert_eq!(sent[0].user_id, user);

    // Analytics aggregated the spend.
    assert_eq!(analytics.category_spend(user, "groceries"), 1299);
}

#[tokio::test]
async fn month_of_activity_aggregates_cleanly() {
    let (bus, audit, notification, analytics) = wire_bus();

    let user = UserId::new();
    let period = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

    bus.publish(
        Event::new(
            "auth-service",
            EventPayload::UserLoggedIn { user_id: user },
        )
        .unwrap(),
    )
    .await
    .unwrap();

    bus.publish(
        Event::new(
            "income-service",
            EventPayload::IncomeRecorded {
                user_id: user,
                income_id: Uuid::new_v4(),
                source: "salary".to_string(),
                amount_cents: 420_000,
                received_on: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            },
        )
        .unwrap(),
    )
    .await
    .unwrap();

    bus.publish(expense(user, "dining", 8_500)).await.unwrap();
    bus.publish(expense(user, "dining", 14_000)).await.unwrap();

    bus.publish(
        Event::new(
            "budget-service",
            EventPayload::BudgetExceeded {
                user_id: user,
                category: "dining".to_string(),
                limit_cents: 20_000,
                spent_cents: 22_500,
                period,
            },
        )
        .unwrap(),
    )
    .await
    .unwrap();

    // Every event audited exactly once.
    assert_eq!(audit.len(), 5);

    // Two push receipts plus email+push for the exceeded budget plus the
    // sign-in notice.
    let sent = notification.sent();
    assert_eq!(sent.len(), 5);
    assert_eq!(
        sent.iter()
            .filter(|msg| msg.channel == NotificationChannel::Email)
            .count(),
        2
    );

    let snapshot = analytics.snapshot();
    assert_eq!(snapshot.income_by_user.get(&user), Some(&420_000));
    assert_eq!(
        snapshot.spend_by_category.get(&(user, "dining".to_string())),
        Some(&22_500)
    );
    assert_eq!(snapshot.logins_by_user.get(&user), Some(&1));
    assert_eq!(snapshot.budgets_exceeded, 1);

    let stats = bus.stats();
    assert_eq!(stats.events_published, 5);
    assert_eq!(stats.events_failed, 0);
}

#[tokio::test]
async fn audit_checksum_verifies_archived_payload() {
    let (bus, audit, _notification, _analytics) = wire_bus();

    let event = expense(UserId::new(), "travel", 99_000);
    let expected = AuditHandler::checksum(&event).unwrap();
    bus.publish(event).await.unwrap();

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].checksum, expected);
}
