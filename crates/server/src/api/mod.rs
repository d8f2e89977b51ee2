pub mod library;
pub mod settings;

use axum::{
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use crate::state::{AppState, HealthResponse};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/library", get(library::get_library))
        .route("/library/duplicates", post(library::find_duplicates))
        .route("/library/:id", delete(library::delete_record))
        .route(
            "/settings",
            get(settings::get_settings).post(settings::update_settings),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
