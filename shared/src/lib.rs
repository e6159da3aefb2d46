pub mod colors;
pub mod detail;
pub mod events;
pub mod layout;
pub mod lot;
pub mod map_view;
pub mod summary;
pub mod view_mode;

pub use colors::ColorTier;
pub use detail::{DetailedSpace, Notifier, SpaceState};
pub use events::*;
pub use lot::*;
pub use map_view::{MapLayer, MapView};
pub use summary::LotSummary;
pub use view_mode::{ViewMode, ViewModeSelector};
