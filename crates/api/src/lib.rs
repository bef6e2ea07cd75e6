//! HTTP API server for the medicine marketplace order workflow.
//!
//! Thin controllers over the domain workflow, with structured logging
//! (tracing) and Prometheus metrics. Authentication is resolved by an
//! upstream layer; see [`auth`].

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::OrderWorkflow;
use market_store::MarketStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/orders/{id}/cancel", patch(routes::orders::cancel::<S>))
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

/// Creates the application state over the given store.
pub fn create_state<S: MarketStore + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        workflow: OrderWorkflow::new(store),
    })
}
