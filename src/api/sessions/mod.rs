mod handlers;
mod helpers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_session))
        .route("/:session_id", get(handlers::get_session).delete(handlers::delete_session))
        .route("/:session_id/answers", post(handlers::record_answer))
        .route("/:session_id/navigation", post(handlers::navigate))
        .route("/:session_id/integrity-events", post(handlers::report_integrity_event))
        .route("/:session_id/submit", post(handlers::submit_session))
}

#[cfg(test)]
mod tests;
