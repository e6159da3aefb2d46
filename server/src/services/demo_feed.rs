use std::time::Duration;

use bytes::Bytes;
use parkmap_shared::layout::diagonal_spaces;
use parkmap_shared::{Coord, Lot, LotSnapshot, Space};
use rand::Rng;
use tracing::{info, warn};

use crate::state::AppState;

const STADIUM_LOT_NAME: &str = "Stadium Parking Lot";
const STADIUM_CORNERS: [Coord; 4] = [
    [38.030907, -78.511921],
    [38.031354, -78.511280],
    [38.031283, -78.511202],
    [38.030836, -78.511848],
];
const SPACES_PER_ROW: usize = 29;

/// Regenerate the simulated feed once per `period`.
pub async fn run(state: AppState, period: Duration) {
    let Some(feed) = state.demo_feed.clone() else {
        return;
    };
    let mut interval = tokio::time::interval(period);
    info!(spaces = SPACES_PER_ROW * 2, "demo feed enabled at /data");

    loop {
        interval.tick().await;

        let lots = stadium_lots(&mut rand::thread_rng());
        match serde_json::to_vec(&lots) {
            Ok(json) => *feed.write().await = Bytes::from(json),
            Err(e) => warn!("failed to serialize demo feed: {e}"),
        }
    }
}

/// The stadium lot with each space's occupancy drawn at random.
pub fn stadium_lots<R: Rng>(rng: &mut R) -> LotSnapshot {
    let [a, b, c, d] = STADIUM_CORNERS;
    let spaces = diagonal_spaces(a, b, c, d, SPACES_PER_ROW)
        .into_iter()
        .enumerate()
        .map(|(i, coords)| Space {
            id: i.to_string(),
            coords,
            occupied: rng.gen_bool(0.5),
        })
        .collect();

    LotSnapshot::new(vec![Lot {
        name: STADIUM_LOT_NAME.to_string(),
        coords: STADIUM_CORNERS.to_vec(),
        spaces,
    }])
}
