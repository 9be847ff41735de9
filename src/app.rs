use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::error::global_error_handler;
use crate::middleware::chain::MiddlewareChain;
use crate::routes::{health, not_found, user};
use crate::AppState;

/// Assembles the full application: routes, the middleware chain and the
/// centralized error handler wrapped around everything.
pub fn build_app(state: AppState, chain: &MiddlewareChain) -> Router {
    let environment = state.config.environment;

    let router = Router::new()
        .route("/health", get(health::health).fallback(not_found))
        .nest("/api/v1/users", user::router(state.clone()))
        .fallback(not_found)
        .with_state(state);

    chain
        .apply(router)
        .layer(from_fn_with_state(environment, global_error_handler))
}
