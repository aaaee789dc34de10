//! Periodic pose-driven update loop around the layered costmap.
//!
//! The runner owns the layered costmap behind a mutex, queries the pose
//! services each tick, runs the layer update, and republishes the footprint
//! and packed grid. Readers (e.g. a planner) share the costmap through
//! [`CostmapRunner::costmap`] and must hold the lock for the whole read.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use parking_lot::Mutex;

use crate::config::CostmapConfig;
use crate::footprint::Footprint;
use crate::grid::LayeredCostmap;
use crate::layers::{InflationConfig, InflationLayer, StaticLayer, StaticMap};
use crate::snapshot::{now_us, FootprintStamped, GridSnapshot, GridUpdate};
use crate::types::{CostmapError, MapInfo, Pose2, Transform3};

/// Client for a named transform service.
///
/// An error covers both transport failure and a negative service result;
/// either skips the current tick.
pub trait TransformClient: Send {
    fn call(&self) -> Result<Transform3, CostmapError>;
}

/// Sink for packed grids and footprint polygons.
pub trait CostmapPublisher: Send {
    fn publish_map(&mut self, snapshot: &GridSnapshot);
    fn publish_update(&mut self, update: &GridUpdate);
    fn publish_footprint(&mut self, footprint: &FootprintStamped);
}

/// Builds the layered costmap from configuration and drives it at the
/// configured frequency.
pub struct CostmapRunner {
    layered: Arc<Mutex<LayeredCostmap>>,
    inflation: InflationLayer,
    static_map_tx: Sender<StaticMap>,
    frequency: f32,
    update_loop: Option<UpdateLoop>,
    worker: Option<Worker>,
}

struct Worker {
    running: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl CostmapRunner {
    /// Build the costmap with its static and inflation layers. Startup errors
    /// (bad configuration, malformed footprint) propagate to the caller.
    pub fn new(
        config: &CostmapConfig,
        inflation_config: InflationConfig,
        odom_client: Box<dyn TransformClient>,
        map_client: Box<dyn TransformClient>,
        publisher: Box<dyn CostmapPublisher>,
    ) -> Result<Self, CostmapError> {
        config.validate()?;
        let footprint = config.parse_footprint()?.padded(config.footprint_padding);

        let mut layered = LayeredCostmap::new(
            config.map_info(),
            config.track_unknown_space(),
            config.rolling_window(),
        );

        let (static_layer, static_map_tx) = StaticLayer::new(config.track_unknown_space());
        layered.add_layer(Box::new(static_layer));

        let inflation = InflationLayer::new(inflation_config);
        layered.add_layer(Box::new(inflation.clone()));

        layered.set_footprint(footprint.points().to_vec());

        let layered = Arc::new(Mutex::new(layered));
        Ok(Self {
            layered: Arc::clone(&layered),
            inflation,
            static_map_tx,
            frequency: config.map_update_frequency,
            update_loop: Some(UpdateLoop {
                layered,
                odom_client,
                map_client,
                publisher,
                footprint,
                saved_info: None,
                skipped_ticks: 0,
            }),
            worker: None,
        })
    }

    /// Shared handle to the layered costmap. Readers must hold the lock for
    /// the duration of their read.
    pub fn costmap(&self) -> Arc<Mutex<LayeredCostmap>> {
        Arc::clone(&self.layered)
    }

    /// Sender half of the static map channel, for the map source.
    pub fn static_map_sender(&self) -> Sender<StaticMap> {
        self.static_map_tx.clone()
    }

    /// Reconfigure the inflation layer at runtime.
    pub fn set_inflation_parameters(&self, inflation_radius: f32, cost_scaling_factor: f32) {
        self.inflation
            .set_parameters(inflation_radius, cost_scaling_factor);
    }

    /// Run a single update tick on the caller's thread. Only available while
    /// the background loop is not running.
    pub fn update_once(&mut self) -> Result<(), CostmapError> {
        let update_loop = self.update_loop.as_mut().ok_or_else(|| {
            CostmapError::Config("update loop is already running in the background".into())
        })?;
        update_loop.tick();
        Ok(())
    }

    /// Activate all layers and spawn the update thread.
    pub fn start(&mut self) -> Result<(), CostmapError> {
        if self.worker.is_some() {
            return Err(CostmapError::Config("costmap is already running".into()));
        }
        let mut update_loop = self
            .update_loop
            .take()
            .ok_or_else(|| CostmapError::Config("costmap was already stopped".into()))?;

        self.layered.lock().activate();
        info!("costmap update loop starting at {:.1} Hz", self.frequency);

        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let period = Duration::from_secs_f32(1.0 / self.frequency);
        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("costmap-update".into())
            .spawn(move || update_loop.run(period, thread_running, stop_rx))?;

        self.worker = Some(Worker {
            running,
            stop_tx,
            handle,
        });
        Ok(())
    }

    /// Deactivate all layers, signal the update thread and join it. The
    /// in-flight tick completes; there is no mid-tick abort.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        info!("costmap update loop stopping");
        self.layered.lock().deactivate();
        worker.running.store(false, Ordering::Relaxed);
        let _ = worker.stop_tx.try_send(());
        if worker.handle.join().is_err() {
            warn!("costmap update thread panicked");
        }
    }
}

impl Drop for CostmapRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the update thread.
struct UpdateLoop {
    layered: Arc<Mutex<LayeredCostmap>>,
    odom_client: Box<dyn TransformClient>,
    map_client: Box<dyn TransformClient>,
    publisher: Box<dyn CostmapPublisher>,
    /// Padded footprint in the robot frame.
    footprint: Footprint,
    /// Metadata of the last full snapshot; a change forces a full repack.
    saved_info: Option<MapInfo>,
    skipped_ticks: u32,
}

impl UpdateLoop {
    fn run(&mut self, period: Duration, running: Arc<AtomicBool>, stop_rx: Receiver<()>) {
        while running.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.tick();
            let elapsed = started.elapsed();
            if elapsed >= period {
                // overrun: start the next tick immediately, best-effort rate
                continue;
            }
            match stop_rx.recv_timeout(period - elapsed) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
        }
        info!("costmap update loop stopped");
    }

    fn tick(&mut self) {
        let pose = match self.robot_pose() {
            Ok(pose) => pose,
            Err(err) => {
                self.skipped_ticks += 1;
                if self.skipped_ticks < 5 || self.skipped_ticks.is_multiple_of(50) {
                    warn!("skipping costmap update (#{}): {err}", self.skipped_ticks);
                }
                return;
            }
        };

        let stamp_us = now_us();
        let mut layered = self.layered.lock();
        layered.update_map(pose);

        let world_footprint = self.footprint.transform(pose);
        self.publisher.publish_footprint(&FootprintStamped {
            stamp_us,
            points: world_footprint.points().to_vec(),
        });

        let info = *layered.master().info();
        if self.saved_info != Some(info) {
            let snapshot = GridSnapshot::from_costmap(stamp_us, layered.master());
            self.publisher.publish_map(&snapshot);
            self.saved_info = Some(info);
        } else if let Some(region) = layered.updated_region() {
            let update = GridUpdate::from_region(stamp_us, layered.master(), region);
            self.publisher.publish_update(&update);
        }
    }

    /// Compose the odometry and map transforms into the robot's world pose.
    fn robot_pose(&self) -> Result<Pose2, CostmapError> {
        let odom = self.odom_client.call()?;
        let map = self.map_client.call()?;
        Ok(odom.compose(&map).pose2())
    }
}
