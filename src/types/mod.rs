pub mod constants;
pub mod error;
pub mod geometry;
pub mod info;

pub use constants::*;
pub use error::CostmapError;
pub use geometry::{Bounds, CellRegion, Pose2, Transform3};
pub use info::MapInfo;
