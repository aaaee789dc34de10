use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{UVec2, Vec2};

use layered_costmap::types::{COST_LETHAL, MapInfo};
use layered_costmap::{
    Bounds, CellRegion, Costmap, InflationConfig, InflationLayer, Layer, LayeredCostmap, Pose2,
};

/// Layer that stamps a fixed set of lethal cells, standing in for a static
/// prior while benchmarking inflation.
struct StaticLethalsLayer {
    positions: Vec<UVec2>,
    info: MapInfo,
}

impl Layer for StaticLethalsLayer {
    fn update_bounds(&mut self, _robot: Pose2, bounds: &mut Bounds) {
        bounds.expand_to_include(self.info.origin);
        bounds.expand_to_include(
            self.info.origin + Vec2::new(self.info.world_width(), self.info.world_height()),
        );
    }

    fn update_costs(&mut self, master: &mut Costmap, region: CellRegion) {
        for &pos in &self.positions {
            if region.contains(pos) {
                let _ = master.set(pos, COST_LETHAL);
            }
        }
    }
}

fn lethal_positions(size: u32, step: u32) -> Vec<UVec2> {
    (0..size)
        .step_by(step as usize)
        .flat_map(|y| (0..size).step_by(step as usize).map(move |x| UVec2::new(x, y)))
        .collect()
}

fn layered_with_lethals(size: u32, resolution: f32, positions: Vec<UVec2>, radius: f32) -> LayeredCostmap {
    let info = MapInfo {
        width: size,
        height: size,
        resolution,
        ..Default::default()
    };
    let mut layered = LayeredCostmap::new(info, false, false);
    layered.add_layer(Box::new(StaticLethalsLayer { positions, info }));
    layered.add_layer(Box::new(InflationLayer::new(InflationConfig {
        inflation_radius: radius,
        cost_scaling_factor: 3.0,
    })));
    layered.set_footprint(vec![
        Vec2::new(0.16, 0.16),
        Vec2::new(0.16, -0.16),
        Vec2::new(-0.16, -0.16),
        Vec2::new(-0.16, 0.16),
    ]);
    layered
}

fn bench_inflation(c: &mut Criterion) {
    let robot = Pose2::new(Vec2::new(6.4, 6.4), 0.0);

    // Best: no obstacles at all, the wavefront never starts
    c.bench_function("update_map_no_lethals", |b| {
        let mut layered = layered_with_lethals(256, 0.05, Vec::new(), 0.5);
        b.iter(|| {
            layered.update_map(robot);
            black_box(layered.master());
        });
    });

    // Typical: sparse lethals, 0.5 m radius
    c.bench_function("update_map_sparse_lethals", |b| {
        let mut layered = layered_with_lethals(256, 0.05, lethal_positions(256, 32), 0.5);
        b.iter(|| {
            layered.update_map(robot);
            black_box(layered.master());
        });
    });

    // Worst: dense lethals (every 4th cell)
    c.bench_function("update_map_dense_lethals", |b| {
        let mut layered = layered_with_lethals(256, 0.05, lethal_positions(256, 4), 0.5);
        b.iter(|| {
            layered.update_map(robot);
            black_box(layered.master());
        });
    });

    // Worst: large radius (50 cells at 0.02 m/cell)
    c.bench_function("update_map_large_radius", |b| {
        let mut layered = layered_with_lethals(256, 0.02, lethal_positions(256, 12), 1.0);
        b.iter(|| {
            layered.update_map(robot);
            black_box(layered.master());
        });
    });
}

criterion_group!(benches, bench_inflation);
criterion_main!(benches);
