pub mod auth;
pub mod error;
pub mod middleware;
pub mod notes;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::middleware::require_auth;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/notes", post(notes::create_note))
        .route("/notes/recent", get(notes::recent_notes))
        .route("/notes/search", get(notes::search_notes))
        .route("/notes/titles/{note_ids}", get(notes::get_titles))
        .route("/notes/{note_id}", get(notes::get_note))
        .route("/notes/{note_id}/privacy", put(notes::set_privacy))
        .route("/sharing", get(notes::list_sharees))
        .route("/sharing/{sharee_id}", post(notes::share_with))
        .route("/authors/{author_id}", get(notes::get_author))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
