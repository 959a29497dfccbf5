//! HTTP API server for checkout and payment settlement.
//!
//! Maps the cart, checkout, settlement and order query operations to REST
//! endpoints, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use messaging::{MessageBus, OrderStatusPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{CartService, CheckoutOrchestrator, OrderQueries, SettlementProcessor};

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub cart: CartService<S>,
    pub checkout: CheckoutOrchestrator<S>,
    pub settlement: SettlementProcessor<S>,
    pub orders: OrderQueries<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", post(routes::cart::add_item::<S>))
        .route("/cart/{user_id}", get(routes::cart::get::<S>))
        .route("/orders", post(routes::orders::checkout::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/users/{user_id}/orders", get(routes::orders::list_for_user::<S>))
        .route("/payments/webhook", post(routes::payments::webhook::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over one store, publishing order-status
/// events to `topic` on `bus`.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    bus: Arc<dyn MessageBus>,
    topic: &str,
) -> Arc<AppState<S>> {
    let publisher = OrderStatusPublisher::new(bus, topic);

    Arc::new(AppState {
        cart: CartService::new(store.clone()),
        checkout: CheckoutOrchestrator::new(store.clone()),
        settlement: SettlementProcessor::new(store.clone(), publisher),
        orders: OrderQueries::new(store),
    })
}
