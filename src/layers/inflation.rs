//! Obstacle inflation layer: wavefront propagation of decaying cost around
//! lethal cells.
//!
//! Every lethal cell projects cost outward up to the inflation radius. Cells
//! within the robot's inscribed radius of an obstacle become at least
//! inscribed-inflated; beyond that the cost decays exponentially. The
//! wavefront is a multi-source Dijkstra over the 4-connected grid: a min-heap
//! keyed on cell distance guarantees every cell is first reached from its
//! nearest obstacle, and a precomputed kernel turns source offsets into
//! distances and costs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use bitvec::prelude::*;
use glam::UVec2;
use log::{error, warn};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::footprint::Footprint;
use crate::grid::{Costmap, Layer};
use crate::types::{
    Bounds, CellRegion, MapInfo, Pose2, COST_INSCRIBED, COST_LETHAL, COST_UNKNOWN,
};

/// Configuration for the inflation layer.
#[derive(Debug, Clone, Deserialize)]
pub struct InflationConfig {
    /// Inflation radius in meters.
    #[serde(default = "default_inflation_radius")]
    pub inflation_radius: f32,
    /// Exponential decay weight for the cost curve.
    #[serde(default = "default_cost_scaling_factor")]
    pub cost_scaling_factor: f32,
}

impl Default for InflationConfig {
    fn default() -> Self {
        Self {
            inflation_radius: default_inflation_radius(),
            cost_scaling_factor: default_cost_scaling_factor(),
        }
    }
}

fn default_inflation_radius() -> f32 {
    0.55
}

fn default_cost_scaling_factor() -> f32 {
    10.0
}

/// Queue entry: a cell, the obstacle source that seeded it, and the distance
/// between them in cells. Ordered so the binary heap pops the smallest
/// distance first.
#[derive(Debug, Clone, Copy)]
struct CellData {
    distance: f32,
    index: usize,
    pos: UVec2,
    src: UVec2,
}

impl Ord for CellData {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance.total_cmp(&self.distance)
    }
}

impl PartialOrd for CellData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CellData {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellData {}

/// Layer that inflates lethal obstacles in the update window.
///
/// Cloning shares the underlying state: keep one clone as a handle for
/// runtime reconfiguration while the layered costmap owns another. The inner
/// mutex guards the kernel tables, the seen buffer and the parameters, so a
/// reconfiguration racing with an update never observes a half-rebuilt
/// kernel. Lock nesting is always master grid first, inflation state second.
#[derive(Clone)]
pub struct InflationLayer {
    inner: Arc<Mutex<Inner>>,
}

impl InflationLayer {
    pub fn new(config: InflationConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                enabled: true,
                inflation_radius: config.inflation_radius,
                weight: config.cost_scaling_factor,
                inscribed_radius: 0.0,
                resolution: 0.0,
                cell_inflation_radius: 0,
                cached_cell_inflation_radius: u32::MAX,
                cached_costs: Vec::new(),
                cached_distances: Vec::new(),
                seen: BitVec::new(),
                queue: BinaryHeap::new(),
                need_reinflation: true,
                last_bounds: Bounds::empty(),
            })),
        }
    }

    /// Change radius and decay weight at runtime. Rebuilds the kernel and
    /// schedules a full-grid reinflation on the next update.
    pub fn set_parameters(&self, inflation_radius: f32, cost_scaling_factor: f32) {
        let mut inner = self.inner.lock();
        if inner.inflation_radius == inflation_radius && inner.weight == cost_scaling_factor {
            return;
        }
        inner.inflation_radius = inflation_radius;
        inner.weight = cost_scaling_factor;
        inner.cell_inflation_radius = cell_distance(inflation_radius, inner.resolution);
        inner.need_reinflation = true;
        inner.compute_caches();
    }

    /// Current inflation radius in meters.
    pub fn inflation_radius(&self) -> f32 {
        self.inner.lock().inflation_radius
    }
}

impl Layer for InflationLayer {
    fn update_bounds(&mut self, _robot: Pose2, bounds: &mut Bounds) {
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return;
        }
        if inner.need_reinflation {
            inner.last_bounds = *bounds;
            *bounds = Bounds::infinite();
            inner.need_reinflation = false;
        } else {
            // a cell that left the dirty window still needs de-inflation if it
            // was lethal last tick, so the previous window is folded in
            let prev = inner.last_bounds;
            inner.last_bounds = *bounds;
            let radius = inner.inflation_radius;
            bounds.min = bounds.min.min(prev.min) - radius;
            bounds.max = bounds.max.max(prev.max) + radius;
        }
    }

    fn update_costs(&mut self, master: &mut Costmap, region: CellRegion) {
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return;
        }
        inner.inflate(master, region);
    }

    fn activate(&mut self) {
        self.inner.lock().enabled = true;
    }

    fn deactivate(&mut self) {
        self.inner.lock().enabled = false;
    }

    fn on_footprint_changed(&mut self, footprint: &Footprint) {
        let mut inner = self.inner.lock();
        inner.inscribed_radius = footprint.inscribed_radius();
        inner.cell_inflation_radius = cell_distance(inner.inflation_radius, inner.resolution);
        inner.need_reinflation = true;
        inner.compute_caches();
    }

    fn match_size(&mut self, info: &MapInfo) {
        let mut inner = self.inner.lock();
        inner.resolution = info.resolution;
        inner.cell_inflation_radius = cell_distance(inner.inflation_radius, info.resolution);
        inner.need_reinflation = true;
        inner.compute_caches();

        let size = info.cell_count();
        inner.seen.clear();
        inner.seen.resize(size, false);
    }

    fn is_current(&self) -> bool {
        !self.inner.lock().need_reinflation
    }
}

struct Inner {
    enabled: bool,
    /// Inflation radius in meters.
    inflation_radius: f32,
    /// Exponential decay weight.
    weight: f32,
    /// Inscribed radius of the current footprint, meters.
    inscribed_radius: f32,
    /// Master grid resolution the caches were built for.
    resolution: f32,
    /// Inflation radius in cells.
    cell_inflation_radius: u32,
    /// Radius the distance table was built for.
    cached_cell_inflation_radius: u32,
    /// Cost per absolute (dx, dy) source offset, side `cell_inflation_radius + 2`.
    cached_costs: Vec<u8>,
    /// Distance in cells per absolute (dx, dy) source offset.
    cached_distances: Vec<f32>,
    /// Visited bitmap over the whole grid, reused across updates.
    seen: BitVec,
    /// Wavefront priority queue, reused across updates.
    queue: BinaryHeap<CellData>,
    need_reinflation: bool,
    last_bounds: Bounds,
}

impl Inner {
    fn kernel_side(&self) -> usize {
        self.cell_inflation_radius as usize + 2
    }

    /// Cost for a cell at the given distance from an obstacle, in cells.
    fn compute_cost(&self, distance_cells: f32) -> u8 {
        if distance_cells == 0.0 {
            return COST_LETHAL;
        }
        let distance_m = distance_cells * self.resolution;
        if distance_m <= self.inscribed_radius {
            return COST_INSCRIBED;
        }
        let factor = (-self.weight * (distance_m - self.inscribed_radius)).exp();
        ((COST_INSCRIBED - 1) as f32 * factor) as u8
    }

    /// Rebuild the distance table if the cell radius changed, then recompute
    /// the cost table for the current parameters.
    fn compute_caches(&mut self) {
        if self.cell_inflation_radius == 0 {
            self.cached_costs.clear();
            self.cached_distances.clear();
            self.cached_cell_inflation_radius = u32::MAX;
            return;
        }

        let side = self.kernel_side();
        let entries = side * side;

        if self.cell_inflation_radius != self.cached_cell_inflation_radius {
            let mut distances = Vec::new();
            if distances.try_reserve_exact(entries).is_err() {
                error!("inflation kernel allocation failed ({entries} entries)");
                self.cached_costs.clear();
                self.cached_distances.clear();
                self.cached_cell_inflation_radius = u32::MAX;
                return;
            }
            for i in 0..side {
                for j in 0..side {
                    distances.push(((i * i + j * j) as f32).sqrt());
                }
            }
            self.cached_distances = distances;
            self.cached_cell_inflation_radius = self.cell_inflation_radius;
        }

        let mut costs = Vec::new();
        if costs.try_reserve_exact(entries).is_err() {
            error!("inflation cost table allocation failed ({entries} entries)");
            self.cached_costs.clear();
            return;
        }
        for idx in 0..entries {
            costs.push(self.compute_cost(self.cached_distances[idx]));
        }
        self.cached_costs = costs;
    }

    fn cost_lookup(&self, pos: UVec2, src: UVec2) -> u8 {
        let dx = pos.x.abs_diff(src.x) as usize;
        let dy = pos.y.abs_diff(src.y) as usize;
        self.cached_costs[dx * self.kernel_side() + dy]
    }

    fn distance_lookup(&self, pos: UVec2, src: UVec2) -> f32 {
        let side = self.kernel_side();
        let dx = pos.x.abs_diff(src.x) as usize;
        let dy = pos.y.abs_diff(src.y) as usize;
        if dx >= side || dy >= side {
            return f32::MAX;
        }
        self.cached_distances[dx * side + dy]
    }

    fn inflate(&mut self, master: &mut Costmap, region: CellRegion) {
        let window = region.size();
        if self.cell_inflation_radius == 0 || window.x == 0 || window.y == 0 {
            return;
        }

        let side = self.kernel_side();
        if self.cached_costs.len() != side * side {
            error!("inflation kernel unavailable, skipping inflation this update");
            return;
        }

        // the queue is drained by every run; anything left is a logic error
        debug_assert!(self.queue.is_empty());
        if !self.queue.is_empty() {
            warn!("inflation queue not empty at start of update, clearing");
            self.queue.clear();
        }

        let info = *master.info();
        let size = info.cell_count();
        if self.seen.len() != size {
            warn!("inflation seen buffer has stale size, reallocating");
            self.seen.clear();
            self.seen.resize(size, false);
        } else {
            self.seen.fill(false);
        }

        let width = info.width;
        let height = info.height;

        // obstacles outside the window but within the inflation radius still
        // influence cells inside it, so the seed scan runs over the expansion
        let radius = self.cell_inflation_radius;
        let scan_min = region.min.saturating_sub(UVec2::splat(radius));
        let scan_max = region
            .max
            .saturating_add(UVec2::splat(radius))
            .min(UVec2::new(width, height));

        for y in scan_min.y..scan_max.y {
            for x in scan_min.x..scan_max.x {
                let pos = UVec2::new(x, y);
                if master.get(pos).copied() == Some(COST_LETHAL) {
                    self.queue.push(CellData {
                        distance: 0.0,
                        index: master.index(pos),
                        pos,
                        src: pos,
                    });
                }
            }
        }

        while let Some(cell) = self.queue.pop() {
            if self.seen[cell.index] {
                continue;
            }
            self.seen.set(cell.index, true);

            let cost = self.cost_lookup(cell.pos, cell.src);
            let old = master.data()[cell.index];
            // unknown cells next to obstacles become known-dangerous instead
            // of keeping their (higher) unknown byte
            let new = if old == COST_UNKNOWN {
                if cost >= COST_INSCRIBED { cost } else { old }
            } else {
                old.max(cost)
            };
            master.data_mut()[cell.index] = new;

            let UVec2 { x: mx, y: my } = cell.pos;
            if mx > 0 {
                self.enqueue(UVec2::new(mx - 1, my), cell.src, width);
            }
            if my > 0 {
                self.enqueue(UVec2::new(mx, my - 1), cell.src, width);
            }
            if mx < width - 1 {
                self.enqueue(UVec2::new(mx + 1, my), cell.src, width);
            }
            if my < height - 1 {
                self.enqueue(UVec2::new(mx, my + 1), cell.src, width);
            }
        }
    }

    fn enqueue(&mut self, pos: UVec2, src: UVec2, width: u32) {
        let index = (pos.y as usize) * (width as usize) + (pos.x as usize);
        if self.seen[index] {
            return;
        }
        let distance = self.distance_lookup(pos, src);
        if distance > self.cell_inflation_radius as f32 {
            return;
        }
        self.queue.push(CellData {
            distance,
            index,
            pos,
            src,
        });
    }
}

/// Convert a world distance to a cell count, `ceil(distance / resolution)`.
///
/// Returns 0 for non-positive distance or resolution.
#[inline]
fn cell_distance(distance: f32, resolution: f32) -> u32 {
    if resolution <= 0.0 || distance <= 0.0 {
        return 0;
    }
    (distance / resolution).ceil() as u32
}
