use serde::{Deserialize, Serialize};

/// Occupancy band used to color a lot in the summary view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTier {
    Green,
    Orange,
    Red,
}

impl ColorTier {
    /// Classify an occupancy rate in `[0, 1]`.
    ///
    /// Thresholds are strict: a rate of exactly 0.8 is orange and exactly 0.5
    /// is green.
    pub fn from_rate(rate: f64) -> Self {
        if rate > 0.8 {
            Self::Red
        } else if rate > 0.5 {
            Self::Orange
        } else {
            Self::Green
        }
    }

    /// CSS named color, as the map widget expects.
    pub fn css_name(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
        }
    }

    pub fn color_rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Green => (0, 128, 0),
            Self::Orange => (255, 165, 0),
            Self::Red => (255, 0, 0),
        }
    }
}

pub const OCCUPIED_COLOR: &str = "red";
pub const AVAILABLE_COLOR: &str = "green";

/// Fill opacity for lot polygons in the summary view.
pub const SUMMARY_FILL_OPACITY: f64 = 0.6;
/// Fill opacity and stroke weight for individual spaces.
pub const SPACE_FILL_OPACITY: f64 = 0.5;
pub const SPACE_STROKE_WEIGHT: u8 = 1;

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}
