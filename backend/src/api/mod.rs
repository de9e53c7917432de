pub mod materials;

use axum::{routing::get, Router};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/materials", get(materials::list).post(materials::create))
        .route(
            "/api/materials/:id",
            get(materials::get_one)
                .put(materials::update)
                .patch(materials::update)
                .delete(materials::delete_one),
        )
        .with_state(state)
}
