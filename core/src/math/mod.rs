pub mod clock;
pub mod color;
pub mod geo;
pub mod grid;
pub mod stats;

pub use clock::LocalClock;
pub use geo::{GeoPoint, KmOffset};
pub use grid::OccupancyGrid;
pub use stats::StatsHelper;
