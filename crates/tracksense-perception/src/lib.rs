//! `tracksense-perception` – simulated cone sensing.
//!
//! Rebuilds the vehicle pose from the scalars trickling in over the bus and
//! turns it, together with the static cone map, into noisy range/bearing
//! detections.
//!
//! # Modules
//!
//! - [`reconstructor`] – [`PoseReconstructor`][reconstructor::PoseReconstructor]:
//!   order-independent state machine that emits one [`Pose`][tracksense_types::Pose]
//!   per complete set of X, Y and heading.
//! - [`detection`] – [`DetectionEngine`][detection::DetectionEngine]: range,
//!   bearing, noise, range gate and per-class outbound id allocation.
//! - [`map`] – [`LandmarkMap`][map::LandmarkMap]: immutable cone list built
//!   from raw track records.
//! - [`geometry`] – 2-D world-to-body transform.
//! - [`noise`] – seedable Gaussian noise source owned by the engine.

pub mod detection;
pub mod geometry;
pub mod map;
pub mod noise;
pub mod reconstructor;

pub use detection::{CycleReport, DetectionConfig, DetectionEngine, DetectionSink, OutboundIdAllocator};
pub use map::{LandmarkMap, LandmarkRecord};
pub use noise::NoiseSource;
pub use reconstructor::{FrameOutcome, PoseReconstructor};
