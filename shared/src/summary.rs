use serde::{Deserialize, Serialize};

use crate::colors::{ColorTier, SUMMARY_FILL_OPACITY, rgba_css};
use crate::detail::Notifier;
use crate::lot::{Coord, Lot, LotSnapshot};

/// Polygon styling handed to the map widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonStyle {
    pub color: String,
    pub fill_color: String,
    pub fill_opacity: f64,
    /// Same fill as a single CSS value, for widgets without an opacity option.
    pub fill_rgba: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u8>,
}

impl PolygonStyle {
    pub fn filled(rgb: (u8, u8, u8), css_name: &str, fill_opacity: f64, weight: Option<u8>) -> Self {
        let (r, g, b) = rgb;
        Self {
            color: css_name.to_string(),
            fill_color: css_name.to_string(),
            fill_opacity,
            fill_rgba: rgba_css(r, g, b, fill_opacity),
            weight,
        }
    }
}

/// Aggregated occupancy for one lot, ready to draw as polygon plus label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotSummary {
    pub name: String,
    pub coords: Vec<Coord>,
    pub total_spaces: usize,
    pub occupied_spaces: usize,
    pub available_spaces: usize,
    pub occupancy_rate: f64,
    pub color_tier: ColorTier,
    pub percentage_open: f64,
    pub centroid: Coord,
    pub label: String,
    pub style: PolygonStyle,
}

impl LotSummary {
    /// Selection text for the lot polygon.
    pub fn availability_text(&self) -> String {
        format!(
            "{}: {}/{} available",
            self.name, self.available_spaces, self.total_spaces
        )
    }
}

/// Summarize every lot that has at least one space, in snapshot order.
pub fn summarize(snapshot: &LotSnapshot) -> Vec<LotSummary> {
    snapshot.lots().iter().filter_map(summarize_lot).collect()
}

/// Returns `None` for lots without spaces; their rate is undefined.
pub fn summarize_lot(lot: &Lot) -> Option<LotSummary> {
    let total_spaces = lot.total_spaces();
    if total_spaces == 0 {
        return None;
    }
    let centroid = vertex_centroid(&lot.coords)?;

    let occupied_spaces = lot.occupied_spaces();
    let available_spaces = total_spaces - occupied_spaces;
    let occupancy_rate = occupied_spaces as f64 / total_spaces as f64;
    let percentage_open = available_spaces as f64 / total_spaces as f64 * 100.0;
    let color_tier = ColorTier::from_rate(occupancy_rate);

    Some(LotSummary {
        name: lot.name.clone(),
        coords: lot.coords.clone(),
        total_spaces,
        occupied_spaces,
        available_spaces,
        occupancy_rate,
        color_tier,
        percentage_open,
        centroid,
        label: label_text(&lot.name, percentage_open),
        style: PolygonStyle::filled(
            color_tier.color_rgb(),
            color_tier.css_name(),
            SUMMARY_FILL_OPACITY,
            None,
        ),
    })
}

/// Report availability for the selected lot; `false` for lots without spaces.
pub fn select_lot(lot: &Lot, notifier: &dyn Notifier) -> bool {
    match summarize_lot(lot) {
        Some(summary) => {
            notifier.notify(&summary.availability_text());
            true
        }
        None => false,
    }
}

/// Two-line marker text, e.g. `"Lot A\n50% Open"`.
///
/// Halves round away from zero, so 12.5 reads as "13".
pub fn label_text(name: &str, percentage_open: f64) -> String {
    format!("{name}\n{:.0}% Open", percentage_open.round())
}

/// Plain average of the polygon's vertices.
///
/// This is a label anchor, not the area centroid: it drifts toward densely
/// sampled edges and can fall outside concave shapes.
pub fn vertex_centroid(coords: &[Coord]) -> Option<Coord> {
    if coords.is_empty() {
        return None;
    }
    let n = coords.len() as f64;
    let (lat_sum, lng_sum) = coords
        .iter()
        .fold((0.0, 0.0), |(lat, lng), c| (lat + c[0], lng + c[1]));
    Some([lat_sum / n, lng_sum / n])
}
