//! Route definitions for the inventory administration backend

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - settings
        .nest("/settings", settings_routes(state))
        // Protected routes - inventory
        .nest("/inventory", inventory_routes(state))
}

/// Notification and site channel settings (protected)
fn settings_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/notifications/test", post(handlers::send_test_notification))
        .route("/notifications/history", get(handlers::get_history))
        .route("/notifications/check-low-stock", post(handlers::check_low_stock))
        .route(
            "/site/channels",
            get(handlers::get_channel_settings).put(handlers::update_channel_settings),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/low-stock", get(handlers::list_low_stock))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
