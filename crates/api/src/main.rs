//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use messaging::{Consumer, InMemoryBus, LogSink, MessageBus, OrderStatusNotifier};
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM), then cancels `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }

    token.cancel();
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>, store::StoreError> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.run_migrations().await?;
            tracing::info!(
                max_connections = config.database_max_connections,
                "using PostgreSQL store"
            );
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Storage and bus
    let store = open_store(&config).await?;
    let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new());

    // 4. Background consumer for order-status notifications
    let shutdown = CancellationToken::new();
    let notifier = Arc::new(OrderStatusNotifier::new(store.clone(), Arc::new(LogSink)));
    let consumer = Consumer::new(
        bus.clone(),
        &config.order_status_topic,
        &config.order_status_group,
        notifier,
    )
    .with_poll_timeout(config.bus_poll_timeout)
    .spawn(shutdown.clone());

    // 5. Build the application
    let state = api::create_default_state(store, bus, &config.order_status_topic);
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // The server can also stop on its own; make sure the consumer follows.
    shutdown.cancel();
    consumer.await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}
