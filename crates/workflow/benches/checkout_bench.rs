use common::{Money, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::PaymentOutcome;
use messaging::{InMemoryBus, OrderStatusPublisher};
use store::{InMemoryStore, Product, Store};
use workflow::{CartService, CheckoutOrchestrator, SettlementProcessor};

use std::sync::Arc;

/// Seeds a product with enough stock that no iteration runs out.
async fn seed(store: &InMemoryStore) -> Product {
    let product = Product::new("Widget", Money::from_cents(1000), u32::MAX / 2);
    store.insert_product(&product).await.unwrap();
    product
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let product = rt.block_on(seed(&store));
    let cart = CartService::new(store.clone());
    let checkout = CheckoutOrchestrator::new(store.clone());

    c.bench_function("workflow/checkout_single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                let user = UserId::new();
                cart.add_item(user, product.id, 1).await.unwrap();
                checkout.checkout(user).await.unwrap();
            });
        });
    });
}

fn bench_checkout_and_settle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let product = rt.block_on(seed(&store));
    let bus = InMemoryBus::new();
    let cart = CartService::new(store.clone());
    let checkout = CheckoutOrchestrator::new(store.clone());
    let settlement = SettlementProcessor::new(
        store.clone(),
        OrderStatusPublisher::new(Arc::new(bus), "order_status"),
    );

    c.bench_function("workflow/checkout_then_settle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let user = UserId::new();
                cart.add_item(user, product.id, 1).await.unwrap();
                let placed = checkout.checkout(user).await.unwrap();
                settlement
                    .settle(placed.order_id, PaymentOutcome::Success)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_checkout, bench_checkout_and_settle);
criterion_main!(benches);
