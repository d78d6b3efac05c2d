//! HTTP API for the storefront backend.
//!
//! Catalog browsing, carts, order placement and cancellation, reviews,
//! favorites and admin operations over JSON, with bearer-token identity,
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use auth::{AdminCaller, AuthKeys, Caller, Claims};
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Catalog and reviews
        .route("/products", get(routes::catalog::list::<S>))
        .route("/products/{id}", get(routes::catalog::get::<S>))
        .route(
            "/products/{id}/reviews",
            get(routes::reviews::list::<S>).post(routes::reviews::upsert::<S>),
        )
        .route("/reviews/{id}", delete(routes::reviews::delete::<S>))
        // Cart
        .route(
            "/cart",
            get(routes::cart::list::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add::<S>))
        .route(
            "/cart/items/{id}",
            put(routes::cart::set_quantity::<S>).delete(routes::cart::remove::<S>),
        )
        // Orders
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        // Favorites
        .route("/favorites", get(routes::favorites::list::<S>))
        .route(
            "/favorites/{product_id}",
            get(routes::favorites::check::<S>)
                .post(routes::favorites::add::<S>)
                .delete(routes::favorites::remove::<S>),
        )
        // Admin
        .route("/admin/orders", get(routes::admin::list_orders::<S>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::admin::update_order_status::<S>),
        )
        .route(
            "/admin/products",
            get(routes::admin::list_products::<S>).post(routes::admin::create_product::<S>),
        )
        .route(
            "/admin/products/stats",
            get(routes::admin::product_stats::<S>),
        )
        .route(
            "/admin/products/{id}",
            delete(routes::admin::delete_product::<S>),
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

/// Builds the shared state over `store`, verifying tokens with `jwt_secret`.
pub fn create_state<S: Store + Clone + 'static>(store: S, jwt_secret: &str) -> Arc<AppState<S>> {
    Arc::new(AppState::new(
        store,
        AuthKeys::from_secret(jwt_secret.as_bytes()),
    ))
}
