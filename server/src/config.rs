use std::str::FromStr;
use std::time::Duration;

use parkmap_shared::MapSettings;

pub const DEFAULT_DATA_URL: &str = "http://127.0.0.1:5000";
pub const DATA_PATH: &str = "/data";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_ZOOM_THRESHOLD: f64 = 18.0;
pub const DEFAULT_MAP_CENTER: [f64; 2] = [38.0336, -78.5080];
pub const DEFAULT_INITIAL_ZOOM: f64 = 17.0;
pub const DEFAULT_MAX_ZOOM: f64 = 22.0;

pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_BROADCAST_BUFFER: usize = 64;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false)
}

/// Base URL of the occupancy feed, without a trailing slash. With the demo
/// feed on and no explicit URL, the server polls itself.
pub fn data_base_url() -> String {
    std::env::var("PARKMAP_DATA_URL")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| {
            if demo_feed_enabled() {
                format!("http://127.0.0.1:{}", server_port())
            } else {
                DEFAULT_DATA_URL.to_string()
            }
        })
}

pub fn data_url() -> String {
    format!("{}{DATA_PATH}", data_base_url())
}

pub fn poll_interval() -> Duration {
    env_value::<u64>("POLL_INTERVAL_MS")
        .filter(|value| *value > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
}

fn zoom_value(key: &str, default: f64) -> f64 {
    env_value::<f64>(key)
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(default)
}

fn map_center() -> [f64; 2] {
    let lat = env_value::<f64>("MAP_CENTER_LAT").filter(|v| (-90.0..=90.0).contains(v));
    let lng = env_value::<f64>("MAP_CENTER_LNG").filter(|v| (-180.0..=180.0).contains(v));
    match (lat, lng) {
        (Some(lat), Some(lng)) => [lat, lng],
        _ => DEFAULT_MAP_CENTER,
    }
}

pub fn map_settings() -> MapSettings {
    MapSettings {
        center: map_center(),
        initial_zoom: zoom_value("INITIAL_ZOOM", DEFAULT_INITIAL_ZOOM),
        max_zoom: zoom_value("MAX_ZOOM", DEFAULT_MAX_ZOOM),
        zoom_threshold: zoom_value("ZOOM_THRESHOLD", DEFAULT_ZOOM_THRESHOLD),
        poll_interval_ms: u64::try_from(poll_interval().as_millis())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
    }
}

pub fn server_port() -> u16 {
    env_value::<u16>("SERVER_PORT")
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Serve a simulated `/data` feed from this process.
pub fn demo_feed_enabled() -> bool {
    env_flag("DEMO_FEED")
}

pub fn sse_broadcast_buffer() -> usize {
    env_value::<usize>("SSE_BROADCAST_BUFFER")
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn upstream_http_timeout() -> Duration {
    env_value::<u64>("UPSTREAM_HTTP_TIMEOUT_SECS")
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    env_value::<u64>("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}
