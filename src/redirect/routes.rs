use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use super::handlers::{home, redirect_link, RedirectState};
use super::middleware::response_timing;

pub fn create_redirect_router(state: Arc<RedirectState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/{slug}", get(redirect_link))
        .layer(middleware::from_fn(response_timing))
        .with_state(state)
}
