use axum::Router;
use axum::http::Method;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/api/map", get(routes::api::map_settings))
        .route("/api/lots", get(routes::api::get_lots))
        .route("/api/lots/{lot}", get(routes::api::get_lot_selection))
        .route(
            "/api/lots/{lot}/spaces/{space}",
            get(routes::api::get_space_selection),
        )
        .route("/api/summary", get(routes::api::get_summary))
        .route("/api/spaces", get(routes::api::get_spaces))
        .route("/api/view", get(routes::api::get_view))
        .route("/api/events", get(routes::sse::lot_events))
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics));

    if state.demo_feed.is_some() {
        app = app.route(crate::config::DATA_PATH, get(routes::feed::get_data));
    }

    // The map widget is usually served from a different origin than this API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    app.layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
