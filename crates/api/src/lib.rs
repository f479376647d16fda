//! HTTP API server with observability for the fulfillment engine.
//!
//! Provides REST endpoints for checkout, vendor fulfillment, refunds,
//! payment webhooks and buyer tracking, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    CheckoutOrchestrator, FulfillmentService, InMemoryNotificationSink, InMemoryPaymentGateway,
    InMemoryRateProvider, PaymentGateway, PaymentProcessor, RateProvider, RefundService,
    TrackingDispatcher,
};
use ledger::{InMemoryLedger, InventoryLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryOrderStore, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<L, S, G, R> {
    pub ledger: Arc<L>,
    pub store: Arc<S>,
    pub gateway: Arc<G>,
    pub rates: Arc<R>,
    pub orchestrator: CheckoutOrchestrator<L, S, G, R>,
    pub fulfillment: FulfillmentService<L, S, R>,
    pub payments: PaymentProcessor<S, G>,
    pub refunds: RefundService<L, S, G>,
    pub tracking: TrackingDispatcher<S>,
}

/// State wired entirely to the in-memory backends.
pub type InMemoryAppState =
    AppState<InMemoryLedger, InMemoryOrderStore, InMemoryPaymentGateway, InMemoryRateProvider>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, S, G, R>(
    state: Arc<AppState<L, S, G, R>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkouts", post(routes::checkouts::create::<L, S, G, R>))
        .route("/orders/{id}", get(routes::orders::get::<L, S, G, R>))
        .route("/orders/{id}/ship", post(routes::orders::ship::<L, S, G, R>))
        .route(
            "/orders/{id}/label",
            post(routes::orders::label::<L, S, G, R>),
        )
        .route(
            "/orders/{id}/cancel",
            post(routes::orders::cancel::<L, S, G, R>),
        )
        .route(
            "/orders/{id}/archive",
            post(routes::orders::archive::<L, S, G, R>),
        )
        .route(
            "/orders/{id}/refunds",
            post(routes::orders::refund::<L, S, G, R>),
        )
        .route("/order-groups/{id}", get(routes::groups::get::<L, S, G, R>))
        .route(
            "/order-groups/{id}/fulfillment",
            get(routes::groups::fulfillment::<L, S, G, R>),
        )
        .route(
            "/tracking/{token}",
            get(routes::tracking::get::<L, S, G, R>),
        )
        .route(
            "/webhooks/payment",
            post(routes::webhooks::payment::<L, S, G, R>),
        )
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

/// Creates the default application state wired to the in-memory backends.
pub fn create_default_state() -> Arc<InMemoryAppState> {
    create_state_with_ledger(Arc::new(InMemoryLedger::new()))
}

/// Creates application state around any ledger backend, with the order store
/// and external services in memory.
pub fn create_state_with_ledger<L: InventoryLedger + 'static>(
    ledger: Arc<L>,
) -> Arc<AppState<L, InMemoryOrderStore, InMemoryPaymentGateway, InMemoryRateProvider>> {
    let store = Arc::new(InMemoryOrderStore::new());
    let gateway = Arc::new(InMemoryPaymentGateway::new());
    let rates = Arc::new(InMemoryRateProvider::new());
    let sink: Arc<dyn checkout::NotificationSink> = Arc::new(InMemoryNotificationSink::new());

    let orchestrator = CheckoutOrchestrator::new(
        Arc::clone(&ledger),
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::clone(&rates),
        Arc::clone(&sink),
    );
    let fulfillment = FulfillmentService::new(
        Arc::clone(&ledger),
        Arc::clone(&store),
        Arc::clone(&rates),
        TrackingDispatcher::new(Arc::clone(&store), Arc::clone(&sink)),
    );
    let payments = PaymentProcessor::new(Arc::clone(&store), Arc::clone(&gateway));
    let refunds = RefundService::new(
        Arc::clone(&ledger),
        Arc::clone(&store),
        Arc::clone(&gateway),
    );
    let tracking = TrackingDispatcher::new(Arc::clone(&store), Arc::clone(&sink));

    Arc::new(AppState {
        ledger,
        store,
        gateway,
        rates,
        orchestrator,
        fulfillment,
        payments,
        refunds,
        tracking,
    })
}
