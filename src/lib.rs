//! Layered 2D occupancy costmap for mobile robot navigation.
//!
//! A costmap fuses a static occupancy prior with obstacle inflation around
//! the robot footprint into a single byte grid consumed by a path planner.
//! Ordered [`Layer`]s negotiate a dirty window each tick and successively
//! write into the shared master [`Costmap`]; the [`CostmapRunner`] drives the
//! update from periodic pose queries and republishes packed snapshots.

pub mod config;
pub mod footprint;
pub mod grid;
pub mod layers;
pub mod runner;
pub mod snapshot;
pub mod types;

pub use config::CostmapConfig;
pub use footprint::Footprint;
pub use grid::{Costmap, Layer, LayeredCostmap, OccupancyGrid};
pub use layers::{InflationConfig, InflationLayer, StaticLayer, StaticMap};
pub use runner::{CostmapPublisher, CostmapRunner, TransformClient};
pub use snapshot::{FootprintStamped, GridSnapshot, GridUpdate};
pub use types::{Bounds, CellRegion, CostmapError, MapInfo, Pose2, Transform3};
