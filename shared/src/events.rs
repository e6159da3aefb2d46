use serde::{Deserialize, Serialize};

use crate::lot::LotSnapshot;

/// Server-sent event payloads on `/api/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LotEvent {
    Snapshot {
        #[serde(default)]
        seq: u64,
        lots: LotSnapshot,
        timestamp: String,
    },
}

/// Static map setup the widget needs before the first snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    pub center: [f64; 2],
    pub initial_zoom: f64,
    pub max_zoom: f64,
    pub zoom_threshold: f64,
    pub poll_interval_ms: u64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center: [38.0336, -78.5080],
            initial_zoom: 17.0,
            max_zoom: 22.0,
            zoom_threshold: 18.0,
            poll_interval_ms: 5_000,
        }
    }
}
