use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detail::{DetailedSpace, render_detailed};
use crate::lot::LotSnapshot;
use crate::summary::{LotSummary, summarize};
use crate::view_mode::{ViewMode, ViewModeSelector};

/// The features a map widget should currently draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "features", rename_all = "lowercase")]
pub enum MapLayer {
    Summary(Vec<LotSummary>),
    Detailed(Vec<DetailedSpace>),
}

impl MapLayer {
    pub fn render(mode: ViewMode, snapshot: &LotSnapshot) -> Self {
        match mode {
            ViewMode::Summary => Self::Summary(summarize(snapshot)),
            ViewMode::Detailed => Self::Detailed(render_detailed(snapshot)),
        }
    }

    pub fn mode(&self) -> ViewMode {
        match self {
            Self::Summary(_) => ViewMode::Summary,
            Self::Detailed(_) => ViewMode::Detailed,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Summary(lots) => lots.len(),
            Self::Detailed(spaces) => spaces.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pairs the latest snapshot with a zoom selector.
///
/// New snapshots re-render the active path; zoom events re-render only when
/// they cross the threshold. Neither ever asks for a fetch.
#[derive(Debug, Clone)]
pub struct MapView {
    selector: ViewModeSelector,
    snapshot: Arc<LotSnapshot>,
}

impl MapView {
    /// Starts with an empty snapshot, the state before the first poll lands.
    pub fn new(threshold: f64, initial_zoom: f64) -> Self {
        Self {
            selector: ViewModeSelector::new(threshold, initial_zoom),
            snapshot: Arc::new(LotSnapshot::default()),
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.selector.current_mode()
    }

    pub fn zoom(&self) -> f64 {
        self.selector.zoom()
    }

    pub fn snapshot(&self) -> &Arc<LotSnapshot> {
        &self.snapshot
    }

    pub fn layer(&self) -> MapLayer {
        MapLayer::render(self.mode(), &self.snapshot)
    }

    pub fn on_snapshot(&mut self, snapshot: Arc<LotSnapshot>) -> MapLayer {
        self.snapshot = snapshot;
        self.layer()
    }

    /// Returns the replacement layer when the mode changed.
    pub fn on_zoom_changed(&mut self, zoom: f64) -> Option<MapLayer> {
        self.selector
            .on_zoom_changed(zoom)
            .map(|mode| MapLayer::render(mode, &self.snapshot))
    }
}
