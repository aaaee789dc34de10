//! Dense row-major byte costmap with world/cell coordinate math.

use glam::{IVec2, UVec2, Vec2};

use crate::types::{CostmapError, MapInfo};

/// The master cost grid. Cells are stored row-major, `(x, y) -> y * width + x`.
///
/// `default_value` is what freshly allocated or reset cells hold; the layered
/// costmap picks it from the unknown-tracking setting.
#[derive(Debug, Clone)]
pub struct Costmap {
    info: MapInfo,
    default_value: u8,
    data: Vec<u8>,
}

impl Costmap {
    /// Create a grid filled with `default_value`.
    pub fn new(info: MapInfo, default_value: u8) -> Self {
        let data = vec![default_value; info.cell_count()];
        Self {
            info,
            default_value,
            data,
        }
    }

    /// Create a grid from an existing buffer. The buffer length must match
    /// the metadata.
    pub fn from_data(info: MapInfo, default_value: u8, data: Vec<u8>) -> Result<Self, CostmapError> {
        if data.len() != info.cell_count() {
            return Err(CostmapError::InvalidMetadata(format!(
                "data length {} does not match map size {}",
                data.len(),
                info.cell_count()
            )));
        }
        Ok(Self {
            info,
            default_value,
            data,
        })
    }

    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn default_value(&self) -> u8 {
        self.default_value
    }

    pub fn index(&self, pos: UVec2) -> usize {
        (pos.y as usize) * (self.info.width as usize) + (pos.x as usize)
    }

    pub fn get(&self, pos: UVec2) -> Option<&u8> {
        if pos.x >= self.info.width || pos.y >= self.info.height {
            return None;
        }
        let idx = self.index(pos);
        Some(&self.data[idx])
    }

    pub fn set(&mut self, pos: UVec2, value: u8) -> Result<(), CostmapError> {
        if pos.x >= self.info.width || pos.y >= self.info.height {
            return Err(CostmapError::OutOfBounds(format!(
                "cell ({}, {}) out of bounds for map {}x{}",
                pos.x, pos.y, self.info.width, self.info.height
            )));
        }
        let idx = self.index(pos);
        self.data[idx] = value;
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// World coordinate of the center of a cell.
    pub fn map_to_world(&self, cell: UVec2) -> Vec2 {
        self.info.origin + (cell.as_vec2() + 0.5) * self.info.resolution
    }

    /// Cell containing a world coordinate, or `None` if outside the grid.
    pub fn world_to_map(&self, pos: Vec2) -> Option<UVec2> {
        let cell = ((pos - self.info.origin) / self.info.resolution).floor();
        if cell.x < 0.0
            || cell.y < 0.0
            || cell.x >= self.info.width as f32
            || cell.y >= self.info.height as f32
        {
            return None;
        }
        Some(cell.as_uvec2())
    }

    /// Like [`world_to_map`](Self::world_to_map) but clamps out-of-range
    /// coordinates to the nearest edge cell instead of failing.
    pub fn world_to_map_enforce_bounds(&self, pos: Vec2) -> UVec2 {
        let cell = ((pos - self.info.origin) / self.info.resolution).floor();
        // `as i32` saturates, so infinite bounds clamp cleanly
        let x = (cell.x as i64).clamp(0, self.info.width as i64 - 1);
        let y = (cell.y as i64).clamp(0, self.info.height as i64 - 1);
        UVec2::new(x as u32, y as u32)
    }

    /// Reallocate to the new size and fill with `default_value`.
    pub fn resize_map(&mut self, size: UVec2, resolution: f32, origin: Vec2) {
        self.info = MapInfo {
            width: size.x,
            height: size.y,
            resolution,
            origin,
        };
        self.data.clear();
        self.data.resize(self.info.cell_count(), self.default_value);
    }

    /// Reset the region [min, max) to `default_value`.
    pub fn reset_map(&mut self, min: UVec2, max: UVec2) {
        let max = max.min(UVec2::new(self.info.width, self.info.height));
        if min.x >= max.x || min.y >= max.y {
            return;
        }
        let w = (max.x - min.x) as usize;
        for y in min.y..max.y {
            let start = self.index(UVec2::new(min.x, y));
            self.data[start..start + w].fill(self.default_value);
        }
    }

    /// Blit a rectangular window from `src` into this grid. The window is
    /// clipped against both grids.
    pub fn copy_window(&mut self, src: &Costmap, src_min: UVec2, size: UVec2, dst_min: UVec2) {
        let w = size
            .x
            .min(src.width().saturating_sub(src_min.x))
            .min(self.width().saturating_sub(dst_min.x)) as usize;
        let h = size
            .y
            .min(src.height().saturating_sub(src_min.y))
            .min(self.height().saturating_sub(dst_min.y));
        if w == 0 {
            return;
        }
        for row in 0..h {
            let s = src.index(UVec2::new(src_min.x, src_min.y + row));
            let d = self.index(UVec2::new(dst_min.x, dst_min.y + row));
            self.data[d..d + w].copy_from_slice(&src.data[s..s + w]);
        }
    }

    /// Move the grid origin, keeping the overlapping window of cell contents.
    ///
    /// The new origin snaps to the cell boundary nearest the request so the
    /// grid stays aligned with its old cells. Cells that scroll in are filled
    /// with `default_value`.
    pub fn update_origin(&mut self, new_origin: Vec2) {
        let res = self.info.resolution;
        let cell_shift = ((new_origin - self.info.origin) / res).floor().as_ivec2();
        if cell_shift == IVec2::ZERO {
            return;
        }
        let new_origin = self.info.origin + cell_shift.as_vec2() * res;

        let size = IVec2::new(self.info.width as i32, self.info.height as i32);
        // cells that survive the shift, expressed in new-grid coordinates
        let dst_min = (-cell_shift).max(IVec2::ZERO);
        let dst_max = (size - cell_shift).min(size);
        if dst_min.x >= dst_max.x || dst_min.y >= dst_max.y {
            self.info.origin = new_origin;
            self.data.fill(self.default_value);
            return;
        }

        let win = (dst_max - dst_min).as_uvec2();
        let src_min = (dst_min + cell_shift).as_uvec2();
        let mut kept = Costmap::new(
            MapInfo {
                width: win.x,
                height: win.y,
                resolution: res,
                origin: Vec2::ZERO,
            },
            self.default_value,
        );
        kept.copy_window(self, src_min, win, UVec2::ZERO);

        self.info.origin = new_origin;
        self.data.fill(self.default_value);
        self.copy_window(&kept, UVec2::ZERO, win, dst_min.as_uvec2());
    }
}
