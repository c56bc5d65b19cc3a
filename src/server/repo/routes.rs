use super::handlers;
use crate::server::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/repo/images", post(handlers::list_images))
        .route("/repo/retag", post(handlers::retag_image))
        .route("/repo/{region}", get(handlers::list_repositories))
}
