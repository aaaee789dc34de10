pub mod costmap;
pub mod layered;
pub mod occupancy;

pub use costmap::Costmap;
pub use layered::{Layer, LayeredCostmap};
pub use occupancy::OccupancyGrid;
