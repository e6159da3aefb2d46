use std::cell::Cell;
use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use parkmap_shared::detail::select_space;
use parkmap_shared::summary::select_lot;
use parkmap_shared::{MapLayer, MapSettings, MapView};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{AppState, LiveSnapshot, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const LAYER_CACHE_CONTROL: &str = "no-cache";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (seq, lot_count, space_count) = {
        let snapshot = state.live_snapshot.read().await;
        (snapshot.seq, snapshot.lots.len(), snapshot.lots.total_spaces())
    };
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "seq": seq,
        "lots": lot_count,
        "spaces": space_count,
        "last_success": observability.last_success.map(|at| at.to_rfc3339()),
        "demo_feed": state.demo_feed.is_some(),
        "observability": {
            "polls_started_total": observability.polls_started_total,
            "polls_succeeded_total": observability.polls_succeeded_total,
            "fetch_failures_total": observability.fetch_failures_total,
            "malformed_payloads_total": observability.malformed_payloads_total,
            "stale_completions_total": observability.stale_completions_total,
            "snapshots_published_total": observability.snapshots_published_total,
            "view_requests_total": observability.view_requests_total,
        }
    }))
}

pub async fn map_settings(State(state): State<AppState>) -> Json<MapSettings> {
    Json(state.map.as_ref().clone())
}

/// Which pre-serialized layer a route serves.
#[derive(Debug, Clone, Copy)]
enum Payload {
    Lots,
    Summary,
    Spaces,
}

impl Payload {
    fn etag(self, seq: u64) -> String {
        let prefix = match self {
            Self::Lots => "lots",
            Self::Summary => "summary",
            Self::Spaces => "spaces",
        };
        format!("\"{prefix}-{seq}\"")
    }

    fn select(self, snapshot: &LiveSnapshot) -> Arc<Bytes> {
        let payloads = &snapshot.payloads;
        Arc::clone(match self {
            Self::Lots => &payloads.lots_json,
            Self::Summary => &payloads.summary_json,
            Self::Spaces => &payloads.spaces_json,
        })
    }
}

async fn serve_payload(state: &AppState, headers: &HeaderMap, payload: Payload) -> Response {
    let (etag, json) = {
        let snapshot = state.live_snapshot.read().await;
        (payload.etag(snapshot.seq), payload.select(&snapshot))
    };

    if if_none_match_matches(headers, &etag) {
        return not_modified_response(LAYER_CACHE_CONTROL, Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), LAYER_CACHE_CONTROL, Some(etag.as_str()))
}

/// Raw snapshot as last received from the feed.
pub async fn get_lots(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve_payload(&state, &headers, Payload::Lots).await
}

pub async fn get_summary(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve_payload(&state, &headers, Payload::Summary).await
}

pub async fn get_spaces(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve_payload(&state, &headers, Payload::Spaces).await
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    zoom: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewResponse {
    pub seq: u64,
    pub zoom: f64,
    #[serde(flatten)]
    pub layer: MapLayer,
}

/// The layer a widget at `zoom` should draw right now.
pub async fn get_view(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ViewResponse>, StatusCode> {
    if !query.zoom.is_finite() {
        return Err(StatusCode::BAD_REQUEST);
    }
    state.observability.record_view_request();

    let (seq, lots) = {
        let snapshot = state.live_snapshot.read().await;
        (snapshot.seq, Arc::clone(&snapshot.lots))
    };
    let mut view = MapView::new(state.map.zoom_threshold, query.zoom);
    let layer = view.on_snapshot(lots);

    Ok(Json(ViewResponse {
        seq,
        zoom: view.zoom(),
        layer,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Selection {
    pub message: String,
}

/// Availability text for a clicked lot polygon.
pub async fn get_lot_selection(
    State(state): State<AppState>,
    Path(lot_name): Path<String>,
) -> Result<Json<Selection>, StatusCode> {
    let lots = Arc::clone(&state.live_snapshot.read().await.lots);
    let lot = lots.lot(&lot_name).ok_or(StatusCode::NOT_FOUND)?;

    let message = Cell::new(None);
    let notify = |text: &str| message.set(Some(text.to_string()));
    if !select_lot(lot, &notify) {
        return Err(StatusCode::NOT_FOUND);
    }
    selection_response(message.into_inner())
}

/// Occupied/available text for a clicked space.
pub async fn get_space_selection(
    State(state): State<AppState>,
    Path((lot_name, space_id)): Path<(String, String)>,
) -> Result<Json<Selection>, StatusCode> {
    let lots = Arc::clone(&state.live_snapshot.read().await.lots);
    let lot = lots.lot(&lot_name).ok_or(StatusCode::NOT_FOUND)?;

    let message = Cell::new(None);
    let notify = |text: &str| message.set(Some(text.to_string()));
    if !select_space(lot, &space_id, &notify) {
        return Err(StatusCode::NOT_FOUND);
    }
    selection_response(message.into_inner())
}

fn selection_response(message: Option<String>) -> Result<Json<Selection>, StatusCode> {
    let message = message.ok_or(StatusCode::NOT_FOUND)?;
    debug!(%message, "selection");
    Ok(Json(Selection { message }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let (seq, lot_count, space_count, occupied_count) = {
        let snapshot = state.live_snapshot.read().await;
        let occupied = snapshot
            .lots
            .lots()
            .iter()
            .map(|lot| lot.occupied_spaces())
            .sum::<usize>();
        (
            snapshot.seq,
            snapshot.lots.len(),
            snapshot.lots.total_spaces(),
            occupied,
        )
    };
    let observability = state.observability.snapshot();

    let body = render_prometheus_metrics(
        SnapshotGauges {
            seq,
            lots: lot_count,
            spaces: space_count,
            occupied: occupied_count,
        },
        observability,
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

#[derive(Debug, Clone, Copy)]
struct SnapshotGauges {
    seq: u64,
    lots: usize,
    spaces: usize,
    occupied: usize,
}

fn write_metric(
    body: &mut String,
    name: &str,
    kind: &str,
    help: &str,
    value: impl std::fmt::Display,
) {
    let _ = writeln!(body, "# HELP {name} {help}");
    let _ = writeln!(body, "# TYPE {name} {kind}");
    let _ = writeln!(body, "{name} {value}");
}

fn render_prometheus_metrics(
    gauges: SnapshotGauges,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    write_metric(
        &mut body,
        "parkmap_snapshot_seq",
        "gauge",
        "Publication sequence of the live snapshot.",
        gauges.seq,
    );
    write_metric(
        &mut body,
        "parkmap_lots",
        "gauge",
        "Lots in the live snapshot.",
        gauges.lots,
    );
    write_metric(
        &mut body,
        "parkmap_spaces",
        "gauge",
        "Spaces in the live snapshot.",
        gauges.spaces,
    );
    write_metric(
        &mut body,
        "parkmap_occupied_spaces",
        "gauge",
        "Occupied spaces in the live snapshot.",
        gauges.occupied,
    );
    write_metric(
        &mut body,
        "parkmap_polls_started_total",
        "counter",
        "Fetches dispatched to the occupancy feed.",
        observability.polls_started_total,
    );
    write_metric(
        &mut body,
        "parkmap_polls_succeeded_total",
        "counter",
        "Fetches that returned a valid snapshot.",
        observability.polls_succeeded_total,
    );
    write_metric(
        &mut body,
        "parkmap_fetch_failures_total",
        "counter",
        "Fetches that failed in transport or returned a non-success status.",
        observability.fetch_failures_total,
    );
    write_metric(
        &mut body,
        "parkmap_malformed_payloads_total",
        "counter",
        "Fetches whose body did not match the lot schema.",
        observability.malformed_payloads_total,
    );
    write_metric(
        &mut body,
        "parkmap_stale_completions_total",
        "counter",
        "Completions discarded because a newer snapshot was already held.",
        observability.stale_completions_total,
    );
    write_metric(
        &mut body,
        "parkmap_snapshots_published_total",
        "counter",
        "Snapshots published to readers.",
        observability.snapshots_published_total,
    );
    write_metric(
        &mut body,
        "parkmap_view_requests_total",
        "counter",
        "Requests to the zoom-selected view endpoint.",
        observability.view_requests_total,
    );
    body
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
