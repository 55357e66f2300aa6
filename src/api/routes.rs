use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::auth::{auth_middleware, AuthService};

use super::handlers::{
    create_link, delete_link, get_link, health_check, list_links, suggest_slug, update_link,
    verify, AppState,
};

pub fn create_api_router(state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let protected_routes = Router::new()
        .route("/verify", get(verify))
        .route("/link", get(list_links).post(create_link))
        .route("/link/ai", get(suggest_slug))
        .route(
            "/link/{slug}",
            get(get_link).put(update_link).delete(delete_link),
        )
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
}
