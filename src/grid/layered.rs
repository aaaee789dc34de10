//! Layered costmap: ordered layers writing into a shared master grid.
//!
//! Each update aggregates a dirty window from all layers, resets the master
//! in that window, then lets every layer write its costs in registration
//! order.

use glam::{UVec2, Vec2};

use crate::footprint::Footprint;
use crate::grid::Costmap;
use crate::types::{Bounds, CellRegion, MapInfo, Pose2, COST_FREE, COST_UNKNOWN};

/// Layer plugin interface. Layers are called in order: each may expand the
/// dirty bounds, then each writes into the master grid within the computed
/// window.
pub trait Layer: Send {
    /// Expand the world bounds this layer needs to update.
    /// Called once per update; layers only expand bounds, never shrink.
    fn update_bounds(&mut self, robot: Pose2, bounds: &mut Bounds);

    /// Write into the master grid for the given window.
    fn update_costs(&mut self, master: &mut Costmap, region: CellRegion);

    /// Called when the update loop starts. Default: no-op.
    fn activate(&mut self) {}

    /// Called when the update loop stops. Default: no-op.
    fn deactivate(&mut self) {}

    /// Called when the robot footprint changes. Default: no-op.
    fn on_footprint_changed(&mut self, _footprint: &Footprint) {}

    /// Called when the master grid is resized. Default: no-op.
    fn match_size(&mut self, _info: &MapInfo) {}

    /// Dimensions this layer wants the master grid to adopt (e.g. a freshly
    /// received static prior). Polled at the top of every update.
    fn pending_resize(&mut self) -> Option<MapInfo> {
        None
    }

    /// Whether the layer has caught up with its inputs.
    fn is_current(&self) -> bool {
        true
    }
}

/// Container of layers and the master costmap. Runs `update_bounds` then
/// `update_costs` in registration order each time [`update_map`](Self::update_map)
/// is called.
pub struct LayeredCostmap {
    master: Costmap,
    layers: Vec<Box<dyn Layer>>,
    rolling_window: bool,
    footprint: Footprint,
    inscribed_radius: f32,
    circumscribed_radius: f32,
    initialized: bool,
    updated_bounds: Bounds,
    updated_region: Option<CellRegion>,
}

impl LayeredCostmap {
    /// Create a layered costmap. When `track_unknown` is set, untouched cells
    /// read as no-information instead of free.
    pub fn new(info: MapInfo, track_unknown: bool, rolling_window: bool) -> Self {
        let fill = if track_unknown {
            COST_UNKNOWN
        } else {
            COST_FREE
        };
        Self {
            master: Costmap::new(info, fill),
            layers: Vec::new(),
            rolling_window,
            footprint: Footprint::default(),
            inscribed_radius: 0.0,
            circumscribed_radius: 0.0,
            initialized: false,
            updated_bounds: Bounds::empty(),
            updated_region: None,
        }
    }

    /// Add a layer. Order matters: layers are updated in insertion order.
    pub fn add_layer(&mut self, mut layer: Box<dyn Layer>) {
        let info = *self.master.info();
        layer.match_size(&info);
        self.layers.push(layer);
    }

    pub fn master(&self) -> &Costmap {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut Costmap {
        &mut self.master
    }

    pub fn is_rolling_window(&self) -> bool {
        self.rolling_window
    }

    /// True after the first completed update.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True when every layer has caught up with its inputs.
    pub fn is_current(&self) -> bool {
        self.layers.iter().all(|layer| layer.is_current())
    }

    /// World bounds that were updated in the last `update_map` call.
    pub fn updated_bounds(&self) -> Bounds {
        self.updated_bounds
    }

    /// Cell window that was updated in the last `update_map` call.
    pub fn updated_region(&self) -> Option<CellRegion> {
        self.updated_region
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn inscribed_radius(&self) -> f32 {
        self.inscribed_radius
    }

    pub fn circumscribed_radius(&self) -> f32 {
        self.circumscribed_radius
    }

    pub fn activate(&mut self) {
        for layer in &mut self.layers {
            layer.activate();
        }
    }

    pub fn deactivate(&mut self) {
        for layer in &mut self.layers {
            layer.deactivate();
        }
    }

    /// Resize the master grid and notify every layer.
    pub fn resize_map(&mut self, size: UVec2, resolution: f32, origin: Vec2) {
        self.master.resize_map(size, resolution, origin);
        let info = *self.master.info();
        for layer in &mut self.layers {
            layer.match_size(&info);
        }
    }

    /// Store the (already padded) footprint, recompute its radii and notify
    /// every layer.
    pub fn set_footprint(&mut self, points: Vec<Vec2>) {
        let footprint = Footprint::new(points);
        self.inscribed_radius = footprint.inscribed_radius();
        self.circumscribed_radius = footprint.circumscribed_radius();
        for layer in &mut self.layers {
            layer.on_footprint_changed(&footprint);
        }
        self.footprint = footprint;
    }

    /// Run one update: adopt pending sizes, shift a rolling origin, aggregate
    /// bounds from all layers, reset the master in that window, then call each
    /// layer's `update_costs`.
    pub fn update_map(&mut self, robot: Pose2) {
        let mut requested: Option<MapInfo> = None;
        for layer in &mut self.layers {
            if let Some(info) = layer.pending_resize() {
                requested = Some(info);
            }
        }
        if let Some(info) = requested
            && !self.rolling_window
            && info != *self.master.info()
        {
            self.resize_map(
                UVec2::new(info.width, info.height),
                info.resolution,
                info.origin,
            );
        }

        if self.rolling_window {
            let info = self.master.info();
            let half = Vec2::new(info.world_width(), info.world_height()) * 0.5;
            let new_origin = robot.position - half;
            self.master.update_origin(new_origin);
        }

        let mut bounds = Bounds::empty();
        for layer in &mut self.layers {
            layer.update_bounds(robot, &mut bounds);
        }

        if bounds.is_empty() {
            self.updated_bounds = bounds;
            self.updated_region = None;
            self.initialized = true;
            return;
        }

        let min_cell = self.master.world_to_map_enforce_bounds(bounds.min);
        let max_cell = self.master.world_to_map_enforce_bounds(bounds.max);
        let region = CellRegion::new(min_cell, max_cell + UVec2::ONE);

        self.master.reset_map(region.min, region.max);
        for layer in &mut self.layers {
            layer.update_costs(&mut self.master, region);
        }

        self.updated_bounds = bounds;
        self.updated_region = Some(region);
        self.initialized = true;
    }
}
