use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use tokio::runtime::Runtime;
use uuid::Uuid;

use tallybus::{
    BusConfig, DispatchMode, Event, EventBus, EventHandler, EventPayload, HandlerError, UserId,
};

struct NoopHandler;

#[async_trait]
impl EventHandler for NoopHandler {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn handle(&self, _event: Arc<Event>) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn expense_created() -> Event {
    Event::new(
        "bench",
        EventPayload::ExpenseCreated {
            user_id: UserId::new(),
            expense_id: Uuid::new_v4(),
            category: "groceries".to_string(),
            amount_cents: 1299,
            spent_on: NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
        },
    )
    .unwrap()
}

fn make_bus(subscribers: usize, mode: DispatchMode) -> EventBus {
    let bus = EventBus::with_config(BusConfig {
        dispatch: mode,
        ..BusConfig::default()
    });
    for _ in 0..subscribers {
        bus.subscribe("expense.created", Arc::new(NoopHandler));
    }
    bus
}

fn bench_publish_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("publish_fanout");
    group.throughput(Throughput::Elements(1));

    for subscribers in [1_usize, 8, 64] {
        let bus = make_bus(subscribers, DispatchMode::Concurrent);
        group.bench_function(format!("concurrent/{subscribers}_subs"), |b| {
            b.to_async(&rt).iter(|| {
                let bus = bus.clone();
                async move { bus.publish(expense_created()).await.unwrap() }
            });
        });
    }

    let bus = make_bus(8, DispatchMode::Sequential);
    group.bench_function("sequential/8_subs", |b| {
        b.to_async(&rt).iter(|| {
            let bus = bus.clone();
            async move { bus.publish(expense_created()).await.unwrap() }
        });
    });

    group.finish();
}

fn bench_pattern_matching(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    // Many non-matching buckets so publish pays realistic lookup cost.
    let bus = EventBus::new();
    bus.subscribe("expense.created", Arc::new(NoopHandler));
    bus.subscribe_pattern("expense.*", Arc::new(NoopHandler))
        .unwrap();
    bus.subscribe_pattern("*", Arc::new(NoopHandler)).unwrap();
    for tag in [
        "expense.updated",
        "expense.deleted",
        "income.recorded",
        "budget.set",
        "budget.exceeded",
        "user.logged_in",
    ] {
        bus.subscribe(tag, Arc::new(NoopHandler));
    }

    c.bench_function("publish_mixed_patterns", |b| {
        b.to_async(&rt).iter(|| {
            let bus = bus.clone();
            async move { bus.publish(expense_created()).await.unwrap() }
        });
    });
}

criterion_group!(benches, bench_publish_fanout, bench_pattern_matching);
criterion_main!(benches);
