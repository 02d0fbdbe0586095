use crate::config::AppState;
use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/relationships/{relation_type}/{object_id}",
            get(handlers::get_relationship),
        )
        .route(
            "/relationships/{relation_type}/{object_id}/toggle",
            post(handlers::toggle_relationship),
        )
        .route(
            "/relationships/{relation_type}/{object_id}/subjects",
            get(handlers::list_subjects),
        )
        .route(
            "/subjects/{subject_id}/relationships/{relation_type}",
            get(handlers::list_objects),
        )
}
