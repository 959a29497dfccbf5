//! Integration tests for checkout and settlement against the in-memory store
//! and bus.

use std::sync::Arc;

use common::{Money, OrderId, OrderStatus, ProductId, UserId};
use domain::PaymentOutcome;
use messaging::{InMemoryBus, OrderStatusEvent, OrderStatusPublisher};
use store::{InMemoryStore, Product, Store};
use workflow::{
    CartService, CheckoutError, CheckoutOrchestrator, OrderQueries, Settlement, SettlementError,
    SettlementProcessor,
};

const TOPIC: &str = "order_status";

struct Harness {
    store: InMemoryStore,
    bus: InMemoryBus,
    cart: CartService<InMemoryStore>,
    checkout: Arc<CheckoutOrchestrator<InMemoryStore>>,
    settlement: SettlementProcessor<InMemoryStore>,
    queries: OrderQueries<InMemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let bus = InMemoryBus::new();
        let publisher = OrderStatusPublisher::new(Arc::new(bus.clone()), TOPIC);

        Self {
            cart: CartService::new(store.clone()),
            checkout: Arc::new(CheckoutOrchestrator::new(store.clone())),
            settlement: SettlementProcessor::new(store.clone(), publisher),
            queries: OrderQueries::new(store.clone()),
            store,
            bus,
        }
    }

    async fn product(&self, price_cents: i64, stock: u32) -> ProductId {
        let product = Product::new("Widget", Money::from_cents(price_cents), stock);
        self.store.insert_product(&product).await.unwrap();
        product.id
    }

    async fn stock(&self, product_id: ProductId) -> (u32, u32) {
        let product = self.store.get_product(product_id).await.unwrap().unwrap();
        (product.stock, product.reserved_stock)
    }

    async fn status(&self, order_id: OrderId) -> OrderStatus {
        self.store.get_order(order_id).await.unwrap().unwrap().status
    }

    async fn events(&self) -> Vec<OrderStatusEvent> {
        self.bus
            .messages(TOPIC)
            .await
            .iter()
            .map(|m| OrderStatusEvent::from_bytes(&m.value).unwrap())
            .collect()
    }

    /// Fills a cart with `quantity` units and checks it out.
    async fn pending_order(&self, product_id: ProductId, quantity: u32) -> OrderId {
        let user_id = UserId::new();
        self.cart.add_item(user_id, product_id, quantity).await.unwrap();
        self.checkout.checkout(user_id).await.unwrap().order_id
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn end_to_end_success() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let user = UserId::new();
        h.cart.add_item(user, product, 2).await.unwrap();

        let placed = h.checkout.checkout(user).await.unwrap();
        assert_eq!(placed.status, OrderStatus::Pending);
        assert_eq!(placed.total_price, Money::from_cents(2000));
        assert_eq!(h.stock(product).await, (5, 2));
        assert!(h.cart.cart(user).await.unwrap().is_empty());

        let settled = h
            .settlement
            .settle(placed.order_id, PaymentOutcome::Success)
            .await
            .unwrap();
        assert_eq!(settled, Settlement::Applied(OrderStatus::Completed));
        assert_eq!(h.status(placed.order_id).await, OrderStatus::Completed);
        assert_eq!(h.stock(product).await, (3, 0));
        assert_eq!(
            h.events().await,
            vec![OrderStatusEvent::new(placed.order_id, OrderStatus::Completed)]
        );
    }

    #[tokio::test]
    async fn lines_copy_the_price_snapshot() {
        let h = Harness::new();
        let cheap = h.product(250, 10).await;
        let dear = h.product(1999, 10).await;
        let user = UserId::new();
        h.cart.add_item(user, cheap, 4).await.unwrap();
        h.cart.add_item(user, dear, 1).await.unwrap();

        let placed = h.checkout.checkout(user).await.unwrap();
        assert_eq!(placed.total_price, Money::from_cents(2999));

        let details = h.queries.get_order(placed.order_id).await.unwrap().unwrap();
        assert_eq!(details.order.total_price, Money::from_cents(2999));
        assert_eq!(details.lines.len(), 2);
        for line in &details.lines {
            let expected = if line.product_id == cheap { 250 } else { 1999 };
            assert_eq!(line.unit_price, Money::from_cents(expected));
        }
        assert_eq!(details.lines, placed.lines);
    }

    #[tokio::test]
    async fn empty_cart_changes_nothing() {
        let h = Harness::new();
        let user = UserId::new();

        let err = h.checkout.checkout(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart(id) if id == user));
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn out_of_stock_rolls_back_every_line() {
        let h = Harness::new();
        let plenty = h.product(1000, 10).await;
        let scarce = h.product(1000, 1).await;
        let user = UserId::new();
        h.cart.add_item(user, plenty, 3).await.unwrap();
        h.cart.add_item(user, scarce, 2).await.unwrap();

        let err = h.checkout.checkout(user).await.unwrap_err();
        match err {
            CheckoutError::OutOfStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, scarce);
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected OutOfStock, got {other:?}"),
        }

        assert_eq!(h.stock(plenty).await, (10, 0));
        assert_eq!(h.stock(scarce).await, (1, 0));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.cart.cart(user).await.unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_trace() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let user = UserId::new();
        h.cart.add_item(user, product, 2).await.unwrap();

        h.store.set_fail_on_commit(true);
        let err = h.checkout.checkout(user).await.unwrap_err();
        h.store.set_fail_on_commit(false);

        assert!(matches!(err, CheckoutError::Store(_)));
        assert_eq!(h.stock(product).await, (5, 0));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.cart.cart(user).await.unwrap().lines.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;

        let mut users = Vec::new();
        for _ in 0..4 {
            let user = UserId::new();
            h.cart.add_item(user, product, 2).await.unwrap();
            users.push(user);
        }

        let handles: Vec<_> = users
            .into_iter()
            .map(|user| {
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
        assert_eq!(h.store.order_count().await, 2);
    }

    #[tokio::test]
    async fn overflowing_total_is_rolled_back() {
        let h = Harness::new();
        let product = h.product(i64::MAX / 2, 10).await;
        let user = UserId::new();
        h.cart.add_item(user, product, 3).await.unwrap();

        let err = h.checkout.checkout(user).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Pricing(_)));
        assert_eq!(h.stock(product).await, (10, 0));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.store.cart_lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_cart_checked_out_twice_yields_one_order() {
        let h = Harness::new();
        let product = h.product(1000, 10).await;
        let user = UserId::new();
        h.cart.add_item(user, product, 2).await.unwrap();

        let (x, y) = tokio::join!(h.checkout.checkout(user), h.checkout.checkout(user));
        let results = [x, y];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(CheckoutError::EmptyCart(id)) if *id == user))
        );
        assert_eq!(h.stock(product).await, (10, 2));
        assert_eq!(h.store.order_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn carts_sharing_products_in_opposite_order_both_complete() {
        let h = Harness::new();
        let a = h.product(100, 10).await;
        let b = h.product(200, 10).await;

        let first = UserId::new();
        h.cart.add_item(first, a, 1).await.unwrap();
        h.cart.add_item(first, b, 1).await.unwrap();
        let second = UserId::new();
        h.cart.add_item(second, b, 1).await.unwrap();
        h.cart.add_item(second, a, 1).await.unwrap();

        let (x, y) = tokio::join!(h.checkout.checkout(first), h.checkout.checkout(second));
        x.unwrap();
        y.unwrap();

        assert_eq!(h.stock(a).await, (10, 2));
        assert_eq!(h.stock(b).await, (10, 2));
    }
}

mod settlement {
    use super::*;

    #[tokio::test]
    async fn failure_releases_the_reservation() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let order = h.pending_order(product, 2).await;

        let settled = h
            .settlement
            .settle(order, PaymentOutcome::Failure)
            .await
            .unwrap();

        assert_eq!(settled, Settlement::Applied(OrderStatus::Canceled));
        assert_eq!(h.status(order).await, OrderStatus::Canceled);
        assert_eq!(h.stock(product).await, (5, 0));
        assert_eq!(
            h.events().await,
            vec![OrderStatusEvent::new(order, OrderStatus::Canceled)]
        );
    }

    #[tokio::test]
    async fn redelivery_is_a_no_op() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let order = h.pending_order(product, 2).await;

        h.settlement
            .settle(order, PaymentOutcome::Success)
            .await
            .unwrap();
        let again = h
            .settlement
            .settle(order, PaymentOutcome::Success)
            .await
            .unwrap();
        let contrary = h
            .settlement
            .settle(order, PaymentOutcome::Failure)
            .await
            .unwrap();

        assert_eq!(again, Settlement::AlreadySettled(OrderStatus::Completed));
        assert_eq!(contrary, Settlement::AlreadySettled(OrderStatus::Completed));
        assert_eq!(h.stock(product).await, (3, 0));
        assert_eq!(h.events().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_converge() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let order = h.pending_order(product, 2).await;

        let (x, y) = tokio::join!(
            h.settlement.settle(order, PaymentOutcome::Success),
            h.settlement.settle(order, PaymentOutcome::Success)
        );
        let applied = [x.unwrap(), y.unwrap()]
            .iter()
            .filter(|s| s.is_applied())
            .count();

        assert_eq!(applied, 1);
        assert_eq!(h.stock(product).await, (3, 0));
        assert_eq!(h.events().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_order() {
        let h = Harness::new();
        let order = OrderId::new();

        let err = h
            .settlement
            .settle(order, PaymentOutcome::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::OrderNotFound(id) if id == order));
        assert!(h.events().await.is_empty());
    }

    #[tokio::test]
    async fn lost_reservation_keeps_order_pending() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let order = h.pending_order(product, 2).await;
        h.store.set_stock_level(product, 5, 0).await.unwrap();

        let err = h
            .settlement
            .settle(order, PaymentOutcome::Success)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettlementError::InsufficientReservation { order_id, product_id }
                if order_id == order && product_id == product
        ));
        assert_eq!(h.status(order).await, OrderStatus::Pending);
        assert_eq!(h.stock(product).await, (5, 0));
        assert!(h.events().await.is_empty());
    }

    #[tokio::test]
    async fn publish_failure_does_not_undo_the_commit() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let order = h.pending_order(product, 2).await;

        h.bus.set_fail_on_publish(true);
        let settled = h
            .settlement
            .settle(order, PaymentOutcome::Success)
            .await
            .unwrap();

        assert_eq!(settled, Settlement::Applied(OrderStatus::Completed));
        assert_eq!(h.status(order).await, OrderStatus::Completed);
        assert_eq!(h.stock(product).await, (3, 0));
        assert!(h.events().await.is_empty());
    }

    #[tokio::test]
    async fn failed_commit_publishes_nothing_and_can_be_retried() {
        let h = Harness::new();
        let product = h.product(1000, 5).await;
        let order = h.pending_order(product, 2).await;

        h.store.set_fail_on_commit(true);
        let err = h
            .settlement
            .settle(order, PaymentOutcome::Success)
            .await
            .unwrap_err();
        h.store.set_fail_on_commit(false);

        assert!(matches!(err, SettlementError::Store(_)));
        assert_eq!(h.status(order).await, OrderStatus::Pending);
        assert_eq!(h.stock(product).await, (5, 2));
        assert!(h.events().await.is_empty());

        let retried = h
            .settlement
            .settle(order, PaymentOutcome::Success)
            .await
            .unwrap();
        assert!(retried.is_applied());
        assert_eq!(h.stock(product).await, (3, 0));
        assert_eq!(h.events().await.len(), 1);
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn orders_for_user_lists_every_checkout() {
        let h = Harness::new();
        let product = h.product(1000, 10).await;
        let user = UserId::new();

        for _ in 0..2 {
            h.cart.add_item(user, product, 1).await.unwrap();
            h.checkout.checkout(user).await.unwrap();
        }

        let orders = h.queries.orders_for_user(user).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.user_id == user));
        assert!(orders[0].created_at >= orders[1].created_at);
    }

    #[tokio::test]
    async fn missing_order_is_none() {
        let h = Harness::new();
        assert!(h.queries.get_order(OrderId::new()).await.unwrap().is_none());
    }
}
