//! Concurrency tests for checkout and settlement against PostgreSQL.
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p workflow --test postgres_concurrency -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{Money, OrderId, OrderStatus, ProductId, UserId};
use domain::PaymentOutcome;
use messaging::{InMemoryBus, OrderStatusPublisher};
use serial_test::serial;
use store::{PostgresStore, Product, Store};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use workflow::{
    CartService, CheckoutError, CheckoutOrchestrator, Settlement, SettlementProcessor,
};

const TOPIC: &str = "order_status";

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let store = PostgresStore::connect(&connection_string, 1).await.unwrap();
            store.run_migrations().await.unwrap();
            store.pool().close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct Harness {
    store: PostgresStore,
    bus: InMemoryBus,
    cart: CartService<PostgresStore>,
    checkout: Arc<CheckoutOrchestrator<PostgresStore>>,
    settlement: Arc<SettlementProcessor<PostgresStore>>,
}

impl Harness {
    async fn new() -> Self {
        let info = get_container_info().await;
        let store = PostgresStore::connect(&info.connection_string, 16)
            .await
            .unwrap();
        let bus = InMemoryBus::new();
        let publisher = OrderStatusPublisher::new(Arc::new(bus.clone()), TOPIC);

        Self {
            cart: CartService::new(store.clone()),
            checkout: Arc::new(CheckoutOrchestrator::new(store.clone())),
            settlement: Arc::new(SettlementProcessor::new(store.clone(), publisher)),
            store,
            bus,
        }
    }

    async fn product(&self, stock: u32) -> ProductId {
        let product = Product::new("Widget", Money::from_cents(1000), stock);
        self.store.insert_product(&product).await.unwrap();
        product.id
    }

    async fn stock(&self, product_id: ProductId) -> (u32, u32) {
        let product = self.store.get_product(product_id).await.unwrap().unwrap();
        (product.stock, product.reserved_stock)
    }

    async fn pending_order(&self, product_id: ProductId, quantity: u32) -> OrderId {
        let user_id = UserId::new();
        self.cart.add_item(user_id, product_id, quantity).await.unwrap();
        self.checkout.checkout(user_id).await.unwrap().order_id
    }

    async fn settle_concurrently(
        &self,
        order_id: OrderId,
        outcomes: &[PaymentOutcome],
    ) -> Vec<Settlement> {
        let handles: Vec<_> = outcomes
            .iter()
            .map(|&outcome| {
                let settlement = Arc::clone(&self.settlement);
                tokio::spawn(async move { settlement.settle(order_id, outcome).await })
            })
            .collect();

        futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_checkouts_never_oversell() {
    let h = Harness::new().await;
    let product = h.product(5).await;

    let mut users = Vec::new();
    for _ in 0..6 {
        let user = UserId::new();
        h.cart.add_item(user, product, 2).await.unwrap();
        users.push(user);
    }

    let handles: Vec<_> = users
        .iter()
        .map(|&user| {
            let checkout = Arc::clone(&h.checkout);
            tokio::spawn(async move { checkout.checkout(user).await })
        })
        .collect();
    let results = futures_util::future::join_all(handles).await;

    let mut placed = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::OutOfStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 2);
    assert_eq!(h.stock(product).await, (5, 4));

    let mut orders = 0;
    for user in users {
        orders += h.store.orders_for_user(user).await.unwrap().len();
    }
    assert_eq!(orders, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn single_units_are_granted_exactly_up_to_stock() {
    let h = Harness::new().await;
    let product = h.product(3).await;

    let mut users = Vec::new();
    for _ in 0..8 {
        let user = UserId::new();
        h.cart.add_item(user, product, 1).await.unwrap();
        users.push(user);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let checkout = Arc::clone(&h.checkout);
            tokio::spawn(async move { checkout.checkout(user).await })
        })
        .collect();
    let placed = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();

    assert_eq!(placed, 3);
    assert_eq!(h.stock(product).await, (3, 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn same_cart_checked_out_twice_yields_one_order() {
    let h = Harness::new().await;
    let product = h.product(10).await;
    let user = UserId::new();
    h.cart.add_item(user, product, 2).await.unwrap();

    // Hold the stock row so both checkouts are in flight at once.
    let mut blocker = h.store.begin().await.unwrap();
    blocker.lock_stock(product).await.unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let checkout = Arc::clone(&h.checkout);
            tokio::spawn(async move { checkout.checkout(user).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(300)).await;
    blocker.commit().await.unwrap();

    let results: Vec<_> = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(CheckoutError::EmptyCart(id)) if *id == user))
    );
    assert_eq!(h.store.orders_for_user(user).await.unwrap().len(), 1);
    assert_eq!(h.stock(product).await, (10, 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn item_added_during_checkout_stays_in_cart() {
    let h = Harness::new().await;
    let product = h.product(10).await;
    let late = h.product(10).await;
    let user = UserId::new();
    h.cart.add_item(user, product, 2).await.unwrap();

    let mut blocker = h.store.begin().await.unwrap();
    blocker.lock_stock(product).await.unwrap();

    let pending = {
        let checkout = Arc::clone(&h.checkout);
        tokio::spawn(async move { checkout.checkout(user).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.cart.add_item(user, late, 1).await.unwrap();
    blocker.commit().await.unwrap();

    let placed = pending.await.unwrap().unwrap();
    assert_eq!(placed.lines.len(), 1);
    assert_eq!(placed.lines[0].product_id, product);

    let cart = h.cart.cart(user).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].product_id, late);
    assert_eq!(h.stock(late).await, (10, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_duplicate_settlements_converge() {
    let h = Harness::new().await;
    let product = h.product(5).await;
    let order_id = h.pending_order(product, 2).await;

    let results = h
        .settle_concurrently(order_id, &[PaymentOutcome::Success; 8])
        .await;

    assert_eq!(results.iter().filter(|s| s.is_applied()).count(), 1);
    assert!(results.iter().all(|s| s.status() == OrderStatus::Completed));
    assert_eq!(h.stock(product).await, (3, 0));
    assert_eq!(h.bus.messages(TOPIC).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn conflicting_outcomes_settle_once() {
    let h = Harness::new().await;
    let product = h.product(5).await;
    let order_id = h.pending_order(product, 2).await;

    let outcomes = [
        PaymentOutcome::Success,
        PaymentOutcome::Failure,
        PaymentOutcome::Success,
        PaymentOutcome::Failure,
    ];
    let results = h.settle_concurrently(order_id, &outcomes).await;

    let applied: Vec<_> = results.iter().filter(|s| s.is_applied()).collect();
    assert_eq!(applied.len(), 1);
    let winner = applied[0].status();
    assert!(results.iter().all(|s| s.status() == winner));

    let expected = match winner {
        OrderStatus::Completed => (3, 0),
        _ => (5, 0),
    };
    assert_eq!(h.stock(product).await, expected);
    assert_eq!(h.bus.messages(TOPIC).await.len(), 1);
}
