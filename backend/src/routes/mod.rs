//! Route definitions for the process phase service

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/processes", process_routes())
}

/// Process phase routes
fn process_routes() -> Router<AppState> {
    Router::new()
        .route("/:process_id", get(handlers::get_process))
        .route("/:process_id/transitions", post(handlers::request_transition))
        .route("/:process_id/records", post(handlers::submit_record))
        .route("/:process_id/estimate", get(handlers::get_estimate))
}
