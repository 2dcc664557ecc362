pub mod assets;
pub mod auth;
pub mod home;
pub mod posts;
pub mod reactions;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::{error_page, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/statics/{*path}", get(assets::serve))
        .route(
            "/create/post",
            get(posts::new_post_page).post(posts::create_post),
        )
        .route(
            "/posts/{id}",
            get(posts::show_post).post(posts::create_comment),
        )
        .route("/reaction/", post(reactions::react))
        .merge(auth::router())
        .fallback(|| async { AppError::NotFound })
        .method_not_allowed_fallback(|| async {
            error_page(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
