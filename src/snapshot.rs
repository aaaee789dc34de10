//! Wire representations published to downstream consumers.
//!
//! Internal costs are translated to signed occupancy bytes through the
//! process-wide [`COST_TRANSLATION_TABLE`].

use std::time::{SystemTime, UNIX_EPOCH};

use glam::{UVec2, Vec2, Vec3};

use crate::grid::Costmap;
use crate::types::{CellRegion, COST_TRANSLATION_TABLE};

/// Microseconds since the Unix epoch, for stamping published data.
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Full packed grid. The origin is the corner of cell (0, 0); orientation is
/// identity.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub stamp_us: u64,
    pub resolution: f32,
    pub width: u32,
    pub height: u32,
    pub origin: Vec3,
    pub data: Vec<i8>,
}

impl GridSnapshot {
    /// Pack the whole grid through the forward translation table.
    pub fn from_costmap(stamp_us: u64, grid: &Costmap) -> Self {
        let info = grid.info();
        let data = grid
            .data()
            .iter()
            .map(|&cost| COST_TRANSLATION_TABLE[cost as usize])
            .collect();
        Self {
            stamp_us,
            resolution: info.resolution,
            width: info.width,
            height: info.height,
            origin: info.origin.extend(0.0),
            data,
        }
    }
}

/// Packed rectangular window of the grid, for incremental publication.
#[derive(Debug, Clone, PartialEq)]
pub struct GridUpdate {
    pub stamp_us: u64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub data: Vec<i8>,
}

impl GridUpdate {
    /// Pack the window through the forward translation table.
    pub fn from_region(stamp_us: u64, grid: &Costmap, region: CellRegion) -> Self {
        let size = region.size();
        let mut data = Vec::with_capacity((size.x as usize) * (size.y as usize));
        for y in region.min.y..region.max.y {
            let start = grid.index(UVec2::new(region.min.x, y));
            data.extend(
                grid.data()[start..start + size.x as usize]
                    .iter()
                    .map(|&cost| COST_TRANSLATION_TABLE[cost as usize]),
            );
        }
        Self {
            stamp_us,
            x: region.min.x,
            y: region.min.y,
            width: size.x,
            height: size.y,
            data,
        }
    }
}

/// Padded robot footprint in the world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintStamped {
    pub stamp_us: u64,
    pub points: Vec<Vec2>,
}
