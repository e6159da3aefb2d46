use serde::{Deserialize, Serialize};

use crate::colors::{
    AVAILABLE_COLOR, ColorTier, OCCUPIED_COLOR, SPACE_FILL_OPACITY, SPACE_STROKE_WEIGHT,
};
use crate::lot::{Coord, Lot, LotSnapshot, Space};
use crate::summary::PolygonStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceState {
    Occupied,
    Available,
}

impl SpaceState {
    pub fn of(space: &Space) -> Self {
        if space.occupied {
            Self::Occupied
        } else {
            Self::Available
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Occupied => "Occupied",
            Self::Available => "Available",
        }
    }

    pub fn css_color(self) -> &'static str {
        match self {
            Self::Occupied => OCCUPIED_COLOR,
            Self::Available => AVAILABLE_COLOR,
        }
    }

    fn color_rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Occupied => ColorTier::Red.color_rgb(),
            Self::Available => ColorTier::Green.color_rgb(),
        }
    }

    pub fn style(self) -> PolygonStyle {
        PolygonStyle::filled(
            self.color_rgb(),
            self.css_color(),
            SPACE_FILL_OPACITY,
            Some(SPACE_STROKE_WEIGHT),
        )
    }
}

/// One space as drawn in the detailed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedSpace {
    pub lot: String,
    pub id: String,
    pub coords: Vec<Coord>,
    pub state: SpaceState,
    pub style: PolygonStyle,
}

/// Map every space of every lot independently; lots without spaces contribute nothing.
pub fn render_detailed(snapshot: &LotSnapshot) -> Vec<DetailedSpace> {
    snapshot
        .lots()
        .iter()
        .flat_map(|lot| lot.spaces.iter().map(move |space| detail_space(lot, space)))
        .collect()
}

fn detail_space(lot: &Lot, space: &Space) -> DetailedSpace {
    let state = SpaceState::of(space);
    DetailedSpace {
        lot: lot.name.clone(),
        id: space.id.clone(),
        coords: space.coords.clone(),
        state,
        style: state.style(),
    }
}

/// Receives selection feedback. The target UI decides how to show it.
pub trait Notifier {
    fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str),
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

pub fn space_selection_text(lot: &str, space: &Space) -> String {
    format!(
        "{lot} - Space {} ({})",
        space.id,
        SpaceState::of(space).label()
    )
}

/// Report the selected space; `false` if the lot has no such space.
pub fn select_space(lot: &Lot, space_id: &str, notifier: &dyn Notifier) -> bool {
    match lot.space(space_id) {
        Some(space) => {
            notifier.notify(&space_selection_text(&lot.name, space));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::{Notifier, SpaceState, render_detailed, select_space};
    use crate::lot::{Lot, LotSnapshot, Space};

    #[derive(Default)]
    struct RecordingNotifier {
        messages: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }
    }

    fn space(id: &str, occupied: bool) -> Space {
        Space {
            id: id.to_string(),
            coords: vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            occupied,
        }
    }

    fn snapshot() -> LotSnapshot {
        LotSnapshot::new(vec![
            Lot {
                name: "North".to_string(),
                coords: vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                spaces: vec![space("1", true), space("2", false)],
            },
            Lot {
                name: "Empty".to_string(),
                coords: vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                spaces: Vec::new(),
            },
            Lot {
                name: "South".to_string(),
                coords: vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                spaces: vec![space("7", false)],
            },
        ])
    }

    #[test]
    fn each_space_is_colored_by_its_own_state() {
        let spaces = render_detailed(&snapshot());

        assert_eq!(spaces.len(), 3);
        assert_eq!(spaces[0].lot, "North");
        assert_eq!(spaces[0].state, SpaceState::Occupied);
        assert_eq!(spaces[0].style.color, "red");
        assert_eq!(spaces[0].style.weight, Some(1));
        assert_eq!(spaces[1].state, SpaceState::Available);
        assert_eq!(spaces[1].style.fill_color, "green");
        assert_eq!(spaces[2].lot, "South");
        assert_eq!(spaces[2].id, "7");
    }

    #[test]
    fn selecting_a_space_notifies_with_lot_id_and_state() {
        let snapshot = snapshot();
        let notifier = RecordingNotifier::default();
        let north = snapshot.lot("North").expect("north lot");

        assert!(select_space(north, "1", &notifier));
        assert!(select_space(north, "2", &notifier));
        assert!(!select_space(north, "99", &notifier));

        assert_eq!(
            notifier.messages.into_inner(),
            vec![
                "North - Space 1 (Occupied)".to_string(),
                "North - Space 2 (Available)".to_string(),
            ]
        );
    }

    #[test]
    fn closures_act_as_notifiers() {
        let snapshot = snapshot();
        let seen = RefCell::new(String::new());
        let notifier = |message: &str| seen.borrow_mut().push_str(message);

        let south = snapshot.lot("South").expect("south lot");
        assert!(select_space(south, "7", &notifier));
        assert_eq!(seen.into_inner(), "South - Space 7 (Available)");
    }
}
