//! Static prior layer: one-shot translation of an external occupancy map
//! into cost values.

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::{UVec2, Vec2};
use log::info;

use crate::grid::{Costmap, Layer, OccupancyGrid};
use crate::types::{
    Bounds, CellRegion, MapInfo, Pose2, COST_FREE, COST_LETHAL, COST_UNKNOWN, OCC_FREE,
    OCC_OCCUPIED, OCC_UNKNOWN,
};

/// Static map message as delivered by the map source.
#[derive(Debug, Clone)]
pub struct StaticMap {
    pub stamp_us: u64,
    pub grid: OccupancyGrid,
}

/// Layer that asserts a static occupancy prior into the master grid.
///
/// Maps arrive on a channel; the newest queued map wins. On first reception
/// the layer requests that the master adopt the prior's dimensions and marks
/// the full extent dirty; afterwards it reasserts its cells inside whatever
/// window the tick computes.
pub struct StaticLayer {
    rx: Receiver<StaticMap>,
    track_unknown: bool,
    enabled: bool,
    current: bool,
    info: Option<MapInfo>,
    costs: Vec<u8>,
    has_new_map: bool,
    resize_pending: bool,
}

impl StaticLayer {
    /// Create the layer and the sender half of its map channel.
    pub fn new(track_unknown: bool) -> (Self, Sender<StaticMap>) {
        let (tx, rx) = unbounded();
        (
            Self {
                rx,
                track_unknown,
                enabled: true,
                current: false,
                info: None,
                costs: Vec::new(),
                has_new_map: false,
                resize_pending: false,
            },
            tx,
        )
    }

    /// Translate one occupancy byte into a cost value.
    fn interpret(&self, value: i8) -> u8 {
        match value {
            OCC_FREE => COST_FREE,
            v if v >= OCC_OCCUPIED => COST_LETHAL,
            v if v > 0 => {
                // linear map of 1..=99 onto 1..=252
                (1 + (251 * (v as i32 - 1)) / 98) as u8
            }
            // OCC_UNKNOWN and anything else negative
            _ => {
                if self.track_unknown {
                    COST_UNKNOWN
                } else {
                    COST_FREE
                }
            }
        }
    }

    /// Drain the channel and adopt the newest queued map, if any.
    fn ingest(&mut self) {
        let mut latest = None;
        while let Ok(map) = self.rx.try_recv() {
            latest = Some(map);
        }
        let Some(map) = latest else { return };

        let info = *map.grid.info();
        self.costs = map.grid.data().iter().map(|&v| self.interpret(v)).collect();
        self.info = Some(info);
        self.has_new_map = true;
        self.resize_pending = true;
        self.current = true;
        info!(
            "static layer received {}x{} map at {:.3} m/cell (stamp {})",
            info.width, info.height, info.resolution, map.stamp_us
        );
    }
}

impl Layer for StaticLayer {
    fn pending_resize(&mut self) -> Option<MapInfo> {
        self.ingest();
        if self.resize_pending {
            self.resize_pending = false;
            self.info
        } else {
            None
        }
    }

    fn update_bounds(&mut self, _robot: Pose2, bounds: &mut Bounds) {
        if !self.enabled {
            return;
        }
        self.ingest();
        if !self.has_new_map {
            return;
        }
        let Some(info) = self.info else { return };
        bounds.expand_to_include(info.origin);
        bounds.expand_to_include(info.origin + Vec2::new(info.world_width(), info.world_height()));
        self.has_new_map = false;
    }

    fn update_costs(&mut self, master: &mut Costmap, region: CellRegion) {
        if !self.enabled {
            return;
        }
        let Some(info) = self.info else { return };

        // translate each master cell through world coordinates so the prior
        // stays correct even when the master geometry differs (rolling window)
        for y in region.min.y..region.max.y {
            for x in region.min.x..region.max.x {
                let cell = UVec2::new(x, y);
                let world = master.map_to_world(cell);
                let prior = ((world - info.origin) / info.resolution).floor();
                if prior.x < 0.0
                    || prior.y < 0.0
                    || prior.x >= info.width as f32
                    || prior.y >= info.height as f32
                {
                    continue;
                }
                let idx = (prior.y as usize) * (info.width as usize) + (prior.x as usize);
                let _ = master.set(cell, self.costs[idx]);
            }
        }
    }

    fn activate(&mut self) {
        self.enabled = true;
    }

    fn deactivate(&mut self) {
        self.enabled = false;
    }

    fn is_current(&self) -> bool {
        self.current
    }
}
