use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Simulated occupancy feed in the upstream `/data` shape.
pub async fn get_data(State(state): State<AppState>) -> Response {
    let Some(feed) = state.demo_feed.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let body = feed.read().await.clone();
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}
