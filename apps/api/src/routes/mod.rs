pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::drafts::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/drafts", post(handlers::handle_create_draft))
        .route("/api/v1/drafts/compare", get(handlers::handle_compare))
        .route(
            "/api/v1/drafts/:id",
            get(handlers::handle_get_draft)
                .patch(handlers::handle_update_draft)
                .delete(handlers::handle_delete_draft),
        )
        .route(
            "/api/v1/drafts/:id/versions",
            post(handlers::handle_create_version),
        )
        .route("/api/v1/drafts/:id/history", get(handlers::handle_history))
        .route("/api/v1/drafts/:id/head", get(handlers::handle_head))
        .route("/api/v1/drafts/:id/restore", post(handlers::handle_restore))
        .with_state(state)
}
