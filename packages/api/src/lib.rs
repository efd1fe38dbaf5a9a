// ABOUTME: HTTP API layer for HellaFresh providing REST endpoints and routing
// ABOUTME: Integration layer over the review service with bearer-token gating on writes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod error;
pub mod health;
pub mod pagination;
pub mod response;
pub mod review_handlers;
pub mod state;
pub mod words_handlers;

pub use auth::ApiTokens;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Creates the words API router (nested under /api/words)
pub fn create_words_router() -> Router<AppState> {
    Router::new()
        .route("/", post(words_handlers::submit_word))
        .route("/{id}", get(words_handlers::get_word))
}

/// Creates the review API router (nested under /api/review)
pub fn create_review_router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(review_handlers::review_queue))
        .route("/{id}/vote", post(review_handlers::vote_on_term))
}

/// Creates the votes API router (nested under /api/votes)
pub fn create_votes_router() -> Router<AppState> {
    Router::new().route("/", post(review_handlers::cast_vote))
}

/// Full application router with service info, health and the /api tree
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/words", create_words_router())
        .nest("/review", create_review_router())
        .nest("/votes", create_votes_router());

    Router::new()
        .route("/", get(health::service_info))
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::bearer_auth_middleware,
        ))
        .with_state(state)
}
