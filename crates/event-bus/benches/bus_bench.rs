use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{Criterion, criterion_group, criterion_main};
use event_bus::{EventBus, EventEnvelope, EventHandler, HandlerError, InMemoryEventBus};

struct Noop;

#[async_trait]
impl EventHandler for Noop {
    async fn handle(&self, _event: &EventEnvelope) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn make_event(order_id: i64) -> EventEnvelope {
    EventEnvelope::new(
        "OrderCreated",
        order_id.to_string(),
        serde_json::json!({
            "orderId": order_id,
            "userId": 1,
            "timestamp": 0,
            "items": [{"productId": 1, "quantity": 2, "unitPrice": 1000}],
            "totalAmount": 2000
        }),
    )
}

fn bench_publish_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_bus/publish_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = InMemoryEventBus::new();
                bus.publish("order-created", "1", make_event(1)).await.unwrap();
            });
        });
    });
}

fn bench_publish_and_drain_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_bus/publish_and_drain_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = InMemoryEventBus::new();
                bus.subscribe("order-created", "bench-group", Arc::new(Noop))
                    .await
                    .unwrap();
                for order_id in 0..100 {
                    bus.publish("order-created", &order_id.to_string(), make_event(order_id))
                        .await
                        .unwrap();
                }
                assert!(bus.wait_until_idle(Duration::from_secs(10)).await);
                bus.shutdown().await;
            });
        });
    });
}

criterion_group!(
    benches,
    bench_publish_single_event,
    bench_publish_and_drain_100
);
criterion_main!(benches);
