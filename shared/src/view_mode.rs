use serde::{Deserialize, Serialize};

/// Which rendering path the map shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Summary,
    Detailed,
}

impl ViewMode {
    pub fn for_zoom(zoom: f64, threshold: f64) -> Self {
        if zoom < threshold {
            Self::Summary
        } else {
            Self::Detailed
        }
    }
}

/// Tracks the map zoom and derives the view mode from it.
///
/// Every zoom event is evaluated on its own: there is no hysteresis band or
/// debounce, so a zoom bouncing across the threshold flips the mode each time.
#[derive(Debug, Clone)]
pub struct ViewModeSelector {
    threshold: f64,
    zoom: f64,
    mode: ViewMode,
}

impl ViewModeSelector {
    /// The starting mode comes from the widget's zoom at mount.
    pub fn new(threshold: f64, initial_zoom: f64) -> Self {
        Self {
            threshold,
            zoom: initial_zoom,
            mode: ViewMode::for_zoom(initial_zoom, threshold),
        }
    }

    pub fn current_mode(&self) -> ViewMode {
        self.mode
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Record a zoom-change event. Returns the new mode when it changed.
    pub fn on_zoom_changed(&mut self, zoom: f64) -> Option<ViewMode> {
        self.zoom = zoom;
        let next = ViewMode::for_zoom(zoom, self.threshold);
        if next == self.mode {
            return None;
        }
        self.mode = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewMode, ViewModeSelector};

    #[test]
    fn initial_mode_follows_mount_zoom() {
        assert_eq!(
            ViewModeSelector::new(18.0, 17.0).current_mode(),
            ViewMode::Summary
        );
        assert_eq!(
            ViewModeSelector::new(18.0, 18.0).current_mode(),
            ViewMode::Detailed
        );
        assert_eq!(
            ViewModeSelector::new(18.0, 21.5).current_mode(),
            ViewMode::Detailed
        );
    }

    #[test]
    fn crossing_threshold_switches_both_ways() {
        let mut selector = ViewModeSelector::new(18.0, 17.0);

        assert_eq!(selector.on_zoom_changed(18.0), Some(ViewMode::Detailed));
        assert_eq!(selector.current_mode(), ViewMode::Detailed);

        assert_eq!(selector.on_zoom_changed(17.0), Some(ViewMode::Summary));
        assert_eq!(selector.current_mode(), ViewMode::Summary);
    }

    #[test]
    fn staying_on_one_side_reports_no_change() {
        let mut selector = ViewModeSelector::new(18.0, 15.0);

        assert_eq!(selector.on_zoom_changed(16.0), None);
        assert_eq!(selector.on_zoom_changed(17.99), None);
        assert_eq!(selector.zoom(), 17.99);
        assert_eq!(selector.current_mode(), ViewMode::Summary);

        assert_eq!(selector.on_zoom_changed(19.0), Some(ViewMode::Detailed));
        assert_eq!(selector.on_zoom_changed(22.0), None);
    }

    #[test]
    fn oscillation_flaps_without_damping() {
        let mut selector = ViewModeSelector::new(18.0, 17.0);
        let mut transitions = 0;
        for zoom in [18.0, 17.9, 18.0, 17.9, 18.0, 17.9] {
            if selector.on_zoom_changed(zoom).is_some() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 6);
        assert_eq!(selector.current_mode(), ViewMode::Summary);
    }
}
