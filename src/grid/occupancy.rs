use glam::UVec2;

use crate::types::{CostmapError, MapInfo};

/// Occupancy prior as delivered by the static map source.
///
/// Values follow the source contract: `-1` unknown, `0..=100` occupancy.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    info: MapInfo,
    data: Vec<i8>,
}

impl OccupancyGrid {
    pub fn new(info: MapInfo, data: Vec<i8>) -> Result<Self, CostmapError> {
        if data.len() != info.cell_count() {
            return Err(CostmapError::InvalidMetadata(format!(
                "data length {} does not match map size {}",
                data.len(),
                info.cell_count()
            )));
        }
        Ok(Self { info, data })
    }

    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    pub fn get(&self, pos: UVec2) -> Option<i8> {
        if pos.x >= self.info.width || pos.y >= self.info.height {
            return None;
        }
        let idx = (pos.y as usize) * (self.info.width as usize) + (pos.x as usize);
        Some(self.data[idx])
    }

    pub fn data(&self) -> &[i8] {
        &self.data
    }
}
