//! End-to-end scenarios driving the full update loop with stub pose services
//! and a recording publisher.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use glam::UVec2;
use layered_costmap::{
    CostmapConfig, CostmapError, CostmapPublisher, CostmapRunner, FootprintStamped, GridSnapshot,
    GridUpdate, InflationConfig, MapInfo, OccupancyGrid, StaticMap, Transform3, TransformClient,
};

#[derive(Clone)]
struct ScriptedTransform {
    script: Arc<Mutex<VecDeque<Option<Transform3>>>>,
    fallback: Transform3,
}

impl ScriptedTransform {
    fn fixed(transform: Transform3) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: transform,
        }
    }

    /// Per-call results; `None` entries fail the call. After the script runs
    /// out, every call succeeds with the fallback.
    fn scripted(results: Vec<Option<Transform3>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(results.into())),
            fallback: Transform3::IDENTITY,
        }
    }
}

impl TransformClient for ScriptedTransform {
    fn call(&self) -> Result<Transform3, CostmapError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Some(transform)) => Ok(transform),
            Some(None) => Err(CostmapError::TransformUnavailable(
                "service returned false".into(),
            )),
            None => Ok(self.fallback),
        }
    }
}

#[derive(Default)]
struct Record {
    maps: Vec<GridSnapshot>,
    updates: Vec<GridUpdate>,
    footprints: Vec<FootprintStamped>,
}

#[derive(Clone, Default)]
struct RecordingPublisher {
    record: Arc<Mutex<Record>>,
}

impl CostmapPublisher for RecordingPublisher {
    fn publish_map(&mut self, snapshot: &GridSnapshot) {
        self.record.lock().unwrap().maps.push(snapshot.clone());
    }

    fn publish_update(&mut self, update: &GridUpdate) {
        self.record.lock().unwrap().updates.push(update.clone());
    }

    fn publish_footprint(&mut self, footprint: &FootprintStamped) {
        self.record.lock().unwrap().footprints.push(footprint.clone());
    }
}

fn occupancy(width: u32, height: u32, lethal: &[(u32, u32)], fill: i8) -> OccupancyGrid {
    let mut data = vec![fill; (width * height) as usize];
    for &(x, y) in lethal {
        data[(y * width + x) as usize] = 100;
    }
    OccupancyGrid::new(
        MapInfo {
            width,
            height,
            resolution: 1.0,
            ..Default::default()
        },
        data,
    )
    .unwrap()
}

fn make_runner(
    yaml: &str,
    inflation: InflationConfig,
    odom: ScriptedTransform,
) -> (CostmapRunner, RecordingPublisher) {
    let config = CostmapConfig::from_yaml_str(yaml).unwrap();
    let publisher = RecordingPublisher::default();
    let runner = CostmapRunner::new(
        &config,
        inflation,
        Box::new(odom),
        Box::new(ScriptedTransform::fixed(Transform3::IDENTITY)),
        Box::new(publisher.clone()),
    )
    .unwrap();
    (runner, publisher)
}

#[test]
fn single_obstacle_without_inflation() {
    let (mut runner, publisher) = make_runner(
        "map_width: 5.0\nmap_height: 5.0\nresolution: 1.0\n",
        InflationConfig {
            inflation_radius: 0.0,
            cost_scaling_factor: 10.0,
        },
        ScriptedTransform::fixed(Transform3::IDENTITY),
    );
    runner
        .static_map_sender()
        .send(StaticMap {
            stamp_us: 1,
            grid: occupancy(5, 5, &[(2, 2)], 0),
        })
        .unwrap();
    runner.update_once().unwrap();

    let layered = runner.costmap();
    let layered = layered.lock();
    let master = layered.master();
    for y in 0..5 {
        for x in 0..5 {
            let expected = if (x, y) == (2, 2) { 254 } else { 0 };
            assert_eq!(
                master.get(UVec2::new(x, y)).copied(),
                Some(expected),
                "cell ({x}, {y})"
            );
        }
    }

    // the published full snapshot packs through the wire table
    let record = publisher.record.lock().unwrap();
    let snapshot = record.maps.last().expect("full snapshot published");
    assert_eq!((snapshot.width, snapshot.height), (5, 5));
    assert_eq!(snapshot.data[2 * 5 + 2], 100);
    assert_eq!(snapshot.data.iter().filter(|&&v| v == 100).count(), 1);
    assert!(snapshot.data.iter().filter(|&&v| v == 0).count() == 24);
}

#[test]
fn small_inflation_halo() {
    let (mut runner, _publisher) = make_runner(
        concat!(
            "map_width: 7.0\nmap_height: 7.0\nresolution: 1.0\n",
            "footprint: \"[[0.5, 0.5], [0.5, -0.5], [-0.5, -0.5], [-0.5, 0.5]]\"\n",
        ),
        InflationConfig {
            inflation_radius: 2.0,
            cost_scaling_factor: 1.0,
        },
        ScriptedTransform::fixed(Transform3::IDENTITY),
    );
    runner
        .static_map_sender()
        .send(StaticMap {
            stamp_us: 1,
            grid: occupancy(7, 7, &[(3, 3)], 0),
        })
        .unwrap();
    runner.update_once().unwrap();

    let layered = runner.costmap();
    let layered = layered.lock();
    let master = layered.master();

    assert_eq!(master.get(UVec2::new(3, 3)).copied(), Some(254));
    // 4-neighbours at 1.0 m: 252 * exp(-0.5), truncated
    for neighbour in [(2, 3), (4, 3), (3, 2), (3, 4)] {
        assert_eq!(
            master.get(UVec2::from(neighbour)).copied(),
            Some(152),
            "neighbour {neighbour:?}"
        );
    }
    // diagonals at sqrt(2) m: 252 * exp(-0.914)
    for diagonal in [(2, 2), (4, 4), (2, 4), (4, 2)] {
        assert_eq!(
            master.get(UVec2::from(diagonal)).copied(),
            Some(101),
            "diagonal {diagonal:?}"
        );
    }
    // beyond the 2.0 m radius nothing is touched
    assert_eq!(master.get(UVec2::new(6, 3)).copied(), Some(0));
    assert_eq!(master.get(UVec2::new(0, 0)).copied(), Some(0));
}

#[test]
fn kernel_recompute_extends_the_halo() {
    let (mut runner, _publisher) = make_runner(
        "map_width: 11.0\nmap_height: 11.0\nresolution: 1.0\n",
        InflationConfig {
            inflation_radius: 1.0,
            cost_scaling_factor: 1.0,
        },
        ScriptedTransform::fixed(Transform3::IDENTITY),
    );
    runner
        .static_map_sender()
        .send(StaticMap {
            stamp_us: 1,
            grid: occupancy(11, 11, &[(5, 5)], 0),
        })
        .unwrap();
    runner.update_once().unwrap();

    {
        let layered = runner.costmap();
        let layered = layered.lock();
        let master = layered.master();
        assert!(master.get(UVec2::new(6, 5)).copied().unwrap() > 0);
        assert_eq!(master.get(UVec2::new(7, 5)).copied(), Some(0));
    }

    // widening the radius schedules a full-grid reinflation
    runner.set_inflation_parameters(3.0, 1.0);
    runner.update_once().unwrap();

    let layered = runner.costmap();
    let layered = layered.lock();
    let master = layered.master();
    assert!(master.get(UVec2::new(7, 5)).copied().unwrap() > 0);
    assert!(master.get(UVec2::new(8, 5)).copied().unwrap() > 0);
    assert_eq!(master.get(UVec2::new(9, 5)).copied(), Some(0));
}

#[test]
fn unknown_cell_adjacent_to_obstacle_becomes_known_dangerous() {
    let (mut runner, _publisher) = make_runner(
        concat!(
            "map_width: 8.0\nmap_height: 8.0\nresolution: 1.0\n",
            "track_unknown_space: 1\n",
            "footprint: \"[[1.0, 1.0], [1.0, -1.0], [-1.0, -1.0], [-1.0, 1.0]]\"\n",
        ),
        InflationConfig {
            inflation_radius: 2.0,
            cost_scaling_factor: 1.0,
        },
        ScriptedTransform::fixed(Transform3::IDENTITY),
    );
    runner
        .static_map_sender()
        .send(StaticMap {
            stamp_us: 1,
            grid: occupancy(8, 8, &[(4, 5)], -1),
        })
        .unwrap();
    runner.update_once().unwrap();

    let layered = runner.costmap();
    let layered = layered.lock();
    let master = layered.master();

    // (5, 5) is one cell from the lethal obstacle, inside the inscribed
    // radius: the unknown byte is overwritten with the inflation cost
    assert_eq!(master.get(UVec2::new(5, 5)).copied(), Some(253));
    // inflation below the inscribed cost leaves unknown alone
    assert_eq!(master.get(UVec2::new(6, 5)).copied(), Some(255));
    // unknown far away stays unknown
    assert_eq!(master.get(UVec2::new(0, 0)).copied(), Some(255));
}

#[test]
fn transform_failure_skips_the_tick() {
    let odom = ScriptedTransform::scripted(vec![
        Some(Transform3::IDENTITY),
        None,
        Some(Transform3::IDENTITY),
    ]);
    let (mut runner, publisher) = make_runner(
        "map_width: 5.0\nmap_height: 5.0\nresolution: 1.0\n",
        InflationConfig {
            inflation_radius: 1.0,
            cost_scaling_factor: 1.0,
        },
        odom,
    );
    runner
        .static_map_sender()
        .send(StaticMap {
            stamp_us: 1,
            grid: occupancy(5, 5, &[(1, 1)], 0),
        })
        .unwrap();

    runner.update_once().unwrap();
    let before = runner.costmap().lock().master().data().to_vec();
    assert_eq!(publisher.record.lock().unwrap().footprints.len(), 1);

    // tick 2: the odometry service fails, the grid must be byte-identical
    runner.update_once().unwrap();
    let after = runner.costmap().lock().master().data().to_vec();
    assert_eq!(before, after);
    assert_eq!(publisher.record.lock().unwrap().footprints.len(), 1);

    // tick 3: the loop carries on
    runner.update_once().unwrap();
    assert_eq!(publisher.record.lock().unwrap().footprints.len(), 2);
}

#[test]
fn metadata_change_triggers_full_snapshot_then_incremental_updates() {
    let (mut runner, publisher) = make_runner(
        "map_width: 6.0\nmap_height: 6.0\nresolution: 1.0\n",
        InflationConfig {
            inflation_radius: 1.0,
            cost_scaling_factor: 1.0,
        },
        ScriptedTransform::fixed(Transform3::IDENTITY),
    );
    runner
        .static_map_sender()
        .send(StaticMap {
            stamp_us: 1,
            grid: occupancy(6, 6, &[(2, 2)], 0),
        })
        .unwrap();

    runner.update_once().unwrap();
    {
        let record = publisher.record.lock().unwrap();
        assert_eq!(record.maps.len(), 1);
        assert!(record.updates.is_empty());
    }

    // metadata is unchanged on the next tick, so only a window goes out
    runner.update_once().unwrap();
    {
        let record = publisher.record.lock().unwrap();
        assert_eq!(record.maps.len(), 1);
        assert_eq!(record.updates.len(), 1);
        let update = &record.updates[0];
        assert_eq!(
            (update.width * update.height) as usize,
            update.data.len()
        );
    }
}
