//! Detection Engine.
//!
//! For every completed pose the engine walks the landmark map once, in map
//! order, and for each cone:
//!
//! 1. scales the vehicle and cone positions to metres (`units / pixels_per_meter`),
//! 2. rotates the cone offset into the vehicle body frame (rotation by −heading),
//! 3. computes range and `atan2` bearing, converting the bearing to the
//!    configured [`AngleUnit`],
//! 4. adds one independent Gaussian sample to each,
//! 5. clamps negative ranges to zero,
//! 6. drops cones beyond `detection_range` (or with a NaN range) without
//!    consuming an id,
//! 7. allocates `class base + counter` from the per-cycle
//!    [`OutboundIdAllocator`], dropping the detection once the class window
//!    is full,
//! 8. pushes the accepted [`Detection`] into a [`DetectionSink`].
//!
//! Cones of an unsupported class are skipped with a warning and never stop
//! the rest of the cycle.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use tracksense_types::{AngleUnit, Detection, FrameIds, LandmarkClass, Pose, SenseError};

use crate::geometry::{Vec2, world_to_body};
use crate::map::LandmarkMap;
use crate::noise::NoiseSource;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

fn default_pixels_per_meter() -> f64 {
    10.0
}
fn default_range_noise() -> f64 {
    0.1
}
fn default_bearing_noise() -> f64 {
    1.0
}
fn default_detection_range() -> f64 {
    5.0
}
fn default_max_per_class() -> u16 {
    128
}

/// Sensor model parameters (`[perception]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Bus and map position units per metre.
    #[serde(default = "default_pixels_per_meter")]
    pub pixels_per_meter: f64,
    /// Range noise σ, metres.
    #[serde(default = "default_range_noise")]
    pub range_noise_std_dev: f64,
    /// Bearing noise σ, in `bearing_unit`.
    #[serde(default = "default_bearing_noise")]
    pub bearing_noise_std_dev: f64,
    /// Maximum published range, metres.
    #[serde(default = "default_detection_range")]
    pub detection_range: f64,
    #[serde(default)]
    pub bearing_unit: AngleUnit,
    /// Size of each class id window.
    #[serde(default = "default_max_per_class")]
    pub max_per_class: u16,
    /// Fixed RNG seed; OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            pixels_per_meter: default_pixels_per_meter(),
            range_noise_std_dev: default_range_noise(),
            bearing_noise_std_dev: default_bearing_noise(),
            detection_range: default_detection_range(),
            bearing_unit: AngleUnit::default(),
            max_per_class: default_max_per_class(),
            seed: None,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), SenseError> {
        if !(self.pixels_per_meter.is_finite() && self.pixels_per_meter > 0.0) {
            return Err(SenseError::Config(format!(
                "pixels_per_meter must be positive, got {}",
                self.pixels_per_meter
            )));
        }
        for (name, sigma) in [
            ("range_noise_std_dev", self.range_noise_std_dev),
            ("bearing_noise_std_dev", self.bearing_noise_std_dev),
        ] {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return Err(SenseError::Config(format!(
                    "{name} must be a non-negative number, got {sigma}"
                )));
            }
        }
        if self.detection_range.is_nan() || self.detection_range < 0.0 {
            return Err(SenseError::Config(format!(
                "detection_range must be non-negative, got {}",
                self.detection_range
            )));
        }
        if self.max_per_class == 0 {
            return Err(SenseError::Config("max_per_class must be at least 1".into()));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Id allocation
// ────────────────────────────────────────────────────────────────────────────

/// Per-class counters handing out `base + counter` ids within one cycle.
#[derive(Debug, Clone)]
pub struct OutboundIdAllocator {
    bases: [u16; 2],
    counters: [u16; 2],
    limit: u16,
}

impl OutboundIdAllocator {
    pub fn new(ids: &FrameIds, limit: u16) -> Self {
        Self {
            bases: [ids.blue_base, ids.yellow_base],
            counters: [0; 2],
            limit,
        }
    }

    /// Start a new cycle.
    pub fn reset(&mut self) {
        self.counters = [0; 2];
    }

    /// Next id for `class`, or `None` if the class window is exhausted or the
    /// class has no window.
    pub fn allocate(&mut self, class: LandmarkClass) -> Option<u16> {
        let slot = class.slot()?;
        let counter = self.counters[slot];
        if counter >= self.limit {
            return None;
        }
        self.counters[slot] = counter + 1;
        Some(self.bases[slot] + counter)
    }

    /// Ids handed out to `class` so far this cycle.
    pub fn allocated(&self, class: LandmarkClass) -> u16 {
        class.slot().map_or(0, |slot| self.counters[slot])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Where accepted detections go.
pub trait DetectionSink {
    fn push(&mut self, detection: Detection);
}

impl DetectionSink for Vec<Detection> {
    fn push(&mut self, detection: Detection) {
        Vec::push(self, detection);
    }
}

/// Outcome counts for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub accepted: usize,
    pub out_of_range: usize,
    pub overflowed: usize,
    pub unsupported: usize,
}

impl std::ops::AddAssign for CycleReport {
    fn add_assign(&mut self, rhs: Self) {
        self.accepted += rhs.accepted;
        self.out_of_range += rhs.out_of_range;
        self.overflowed += rhs.overflowed;
        self.unsupported += rhs.unsupported;
    }
}

#[derive(Debug)]
pub struct DetectionEngine {
    config: DetectionConfig,
    ids: FrameIds,
    map: LandmarkMap,
    allocator: OutboundIdAllocator,
    noise: NoiseSource,
}

impl DetectionEngine {
    /// Validate the configuration and seed the noise source from
    /// `config.seed`.
    pub fn new(config: DetectionConfig, ids: FrameIds, map: LandmarkMap) -> Result<Self, SenseError> {
        let noise = NoiseSource::new(config.seed);
        Self::with_noise(config, ids, map, noise)
    }

    pub fn with_noise(
        config: DetectionConfig,
        ids: FrameIds,
        map: LandmarkMap,
        noise: NoiseSource,
    ) -> Result<Self, SenseError> {
        config.validate()?;
        ids.validate(config.max_per_class)?;
        Ok(Self {
            allocator: OutboundIdAllocator::new(&ids, config.max_per_class),
            config,
            ids,
            map,
            noise,
        })
    }

    /// The validated id layout the engine publishes with. Pose frames are
    /// read on the same ids.
    pub fn ids(&self) -> FrameIds {
        self.ids
    }

    /// Run one detection cycle for `pose`.
    pub fn process<S>(&mut self, pose: &Pose, sink: &mut S) -> CycleReport
    where
        S: DetectionSink + ?Sized,
    {
        debug!(
            x = pose.x,
            y = pose.y,
            heading_deg = f64::from(pose.heading_rad).to_degrees(),
            "received car pose"
        );
        self.allocator.reset();

        let mut report = CycleReport::default();
        let mut overflow_warned = [false; 2];
        let scale = self.config.pixels_per_meter;
        let agent = Vec2::new(f64::from(pose.x), f64::from(pose.y)).div(scale);
        let heading = f64::from(pose.heading_rad);

        for landmark in self.map.iter() {
            let Some(slot) = landmark.class.slot() else {
                warn!(x = landmark.x, y = landmark.y, class = ?landmark.class, "skipping landmark of unsupported class");
                report.unsupported += 1;
                continue;
            };

            let position = Vec2::new(f64::from(landmark.x), f64::from(landmark.y)).div(scale);
            let body = world_to_body(position.sub(agent), heading);

            let mut range = body.norm() + self.noise.gaussian(self.config.range_noise_std_dev);
            let bearing = self.config.bearing_unit.from_radians(body.bearing())
                + self.noise.gaussian(self.config.bearing_noise_std_dev);
            if range < 0.0 {
                range = 0.0;
            }

            if range.is_nan() || range > self.config.detection_range {
                report.out_of_range += 1;
                continue;
            }

            let Some(id) = self.allocator.allocate(landmark.class) else {
                if !overflow_warned[slot] {
                    warn!(
                        class = ?landmark.class,
                        limit = self.config.max_per_class,
                        "class id space exhausted; dropping further detections this cycle"
                    );
                    overflow_warned[slot] = true;
                }
                report.overflowed += 1;
                continue;
            };

            let detection = Detection {
                id,
                class: landmark.class,
                range: range as f32,
                bearing: bearing as f32,
            };
            trace!(id = %format_args!("{:#05x}", id), range, bearing, "detection");
            sink.push(detection);
            report.accepted += 1;
        }

        debug!(
            accepted = report.accepted,
            out_of_range = report.out_of_range,
            overflowed = report.overflowed,
            unsupported = report.unsupported,
            "detection cycle done"
        );
        report
    }
}
