//! `tracksense-types` – shared vocabulary of the perception node.
//!
//! Every other crate in the workspace speaks in terms of the values defined
//! here: raw bus [`Frame`]s, the reconstructed [`Pose`], static map
//! [`Landmark`]s and the [`Detection`]s published back onto the bus.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest identifier representable on the bus (11-bit standard frame).
pub const MAX_FRAME_ID: u16 = 0x7FF;

/// Largest payload a single frame can carry, in bytes.
pub const MAX_PAYLOAD: usize = 8;

// ────────────────────────────────────────────────────────────────────────────
// Frame
// ────────────────────────────────────────────────────────────────────────────

/// One bus transmission unit: an 11-bit identifier plus up to eight payload
/// bytes.
///
/// Unused payload bytes are always zero so two frames carrying the same
/// logical payload compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    id: u16,
    len: u8,
    data: [u8; MAX_PAYLOAD],
}

impl Frame {
    /// Build a frame, validating the identifier range and payload length.
    pub fn new(id: u16, payload: &[u8]) -> Result<Self, SenseError> {
        if id > MAX_FRAME_ID {
            return Err(SenseError::InvalidFrameId(u32::from(id)));
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(SenseError::PayloadTooLong(payload.len()));
        }
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// The frame identifier.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The meaningful payload bytes (`len` of them).
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// `true` for a frame with no payload bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// The three scalars the vehicle broadcasts independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoseField {
    X,
    Y,
    Heading,
}

impl PoseField {
    /// All fields, in the order the reconstructor stores them.
    pub const ALL: [PoseField; 3] = [PoseField::X, PoseField::Y, PoseField::Heading];

    /// Dense index for per-field tables.
    pub fn index(self) -> usize {
        match self {
            PoseField::X => 0,
            PoseField::Y => 1,
            PoseField::Heading => 2,
        }
    }
}

/// One complete snapshot of the vehicle position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World-frame X position (source units, scaled by the detection engine).
    pub x: f32,
    /// World-frame Y position (source units).
    pub y: f32,
    /// Heading, counter-clockwise from +X (radians).
    pub heading_rad: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading_rad: f32) -> Self {
        Self { x, y, heading_rad }
    }

    /// Value of a single field.
    pub fn field(&self, field: PoseField) -> f32 {
        match field {
            PoseField::X => self.x,
            PoseField::Y => self.y,
            PoseField::Heading => self.heading_rad,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Landmarks
// ────────────────────────────────────────────────────────────────────────────

/// Class label of a map landmark (cone colour).
///
/// Parsing never fails: any colour outside the supported set becomes
/// [`LandmarkClass::Unsupported`], which the loader and the detection engine
/// reject through a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkClass {
    /// Class A – left track boundary.
    Blue,
    /// Class B – right track boundary.
    Yellow,
    Unsupported,
}

impl LandmarkClass {
    /// Every class that owns an outbound id window.
    pub const SUPPORTED: [LandmarkClass; 2] = [LandmarkClass::Blue, LandmarkClass::Yellow];

    /// Map a colour name (case-insensitive, surrounding whitespace ignored).
    pub fn from_color(color: &str) -> Self {
        match color.trim().to_ascii_lowercase().as_str() {
            "blue" => LandmarkClass::Blue,
            "yellow" => LandmarkClass::Yellow,
            _ => LandmarkClass::Unsupported,
        }
    }

    /// Dense index for per-class tables, `None` for unsupported classes.
    pub fn slot(self) -> Option<usize> {
        match self {
            LandmarkClass::Blue => Some(0),
            LandmarkClass::Yellow => Some(1),
            LandmarkClass::Unsupported => None,
        }
    }

    pub fn is_supported(self) -> bool {
        self.slot().is_some()
    }
}

/// Static map entry. Coordinates are in landmark-source units (pixels) and
/// are scaled to metres by the detection engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub class: LandmarkClass,
}

impl Landmark {
    pub fn new(x: f32, y: f32, class: LandmarkClass) -> Self {
        Self { x, y, class }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detections
// ────────────────────────────────────────────────────────────────────────────

/// Angular unit used for published bearings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Convert an angle expressed in radians into this unit.
    pub fn from_radians(self, radians: f64) -> f64 {
        match self {
            AngleUnit::Degrees => radians.to_degrees(),
            AngleUnit::Radians => radians,
        }
    }
}

/// One landmark's simulated observation, ready to be published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Outbound frame identifier (`class base + per-cycle counter`).
    pub id: u16,
    pub class: LandmarkClass,
    /// Noisy range to the landmark, metres, never negative.
    pub range: f32,
    /// Noisy bearing in the configured [`AngleUnit`], positive to the left.
    pub bearing: f32,
}

// ────────────────────────────────────────────────────────────────────────────
// Identifier allocation
// ────────────────────────────────────────────────────────────────────────────

fn default_pose_x() -> u16 {
    0x200
}
fn default_pose_y() -> u16 {
    0x201
}
fn default_pose_heading() -> u16 {
    0x202
}
fn default_blue_base() -> u16 {
    0x400
}
fn default_yellow_base() -> u16 {
    0x480
}

/// Bus identifiers consumed and produced by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameIds {
    #[serde(default = "default_pose_x")]
    pub pose_x: u16,
    #[serde(default = "default_pose_y")]
    pub pose_y: u16,
    #[serde(default = "default_pose_heading")]
    pub pose_heading: u16,
    /// First detection id of the blue window.
    #[serde(default = "default_blue_base")]
    pub blue_base: u16,
    /// First detection id of the yellow window.
    #[serde(default = "default_yellow_base")]
    pub yellow_base: u16,
}

impl Default for FrameIds {
    fn default() -> Self {
        Self {
            pose_x: default_pose_x(),
            pose_y: default_pose_y(),
            pose_heading: default_pose_heading(),
            blue_base: default_blue_base(),
            yellow_base: default_yellow_base(),
        }
    }
}

impl FrameIds {
    /// Which pose field, if any, travels on `id`.
    pub fn pose_field(&self, id: u16) -> Option<PoseField> {
        PoseField::ALL.into_iter().find(|f| self.pose_id(*f) == id)
    }

    pub fn pose_id(&self, field: PoseField) -> u16 {
        match field {
            PoseField::X => self.pose_x,
            PoseField::Y => self.pose_y,
            PoseField::Heading => self.pose_heading,
        }
    }

    /// First outbound id of the class window, `None` for unsupported classes.
    pub fn class_base(&self, class: LandmarkClass) -> Option<u16> {
        match class {
            LandmarkClass::Blue => Some(self.blue_base),
            LandmarkClass::Yellow => Some(self.yellow_base),
            LandmarkClass::Unsupported => None,
        }
    }

    /// Check that every id fits the bus, the pose ids are distinct, and the
    /// class windows of `window` ids neither overlap each other nor a pose id.
    pub fn validate(&self, window: u16) -> Result<(), SenseError> {
        let pose = [self.pose_x, self.pose_y, self.pose_heading];
        for id in pose {
            if id > MAX_FRAME_ID {
                return Err(SenseError::InvalidFrameId(u32::from(id)));
            }
        }
        if pose[0] == pose[1] || pose[0] == pose[2] || pose[1] == pose[2] {
            return Err(SenseError::Config("pose ids must be distinct".to_string()));
        }
        if window == 0 {
            return Err(SenseError::Config("class window must not be empty".to_string()));
        }

        let mut windows = Vec::with_capacity(LandmarkClass::SUPPORTED.len());
        for class in LandmarkClass::SUPPORTED {
            let Some(base) = self.class_base(class) else {
                continue;
            };
            let last = u32::from(base) + u32::from(window) - 1;
            if last > u32::from(MAX_FRAME_ID) {
                return Err(SenseError::InvalidFrameId(last));
            }
            if pose.iter().any(|p| (u32::from(base)..=last).contains(&u32::from(*p))) {
                return Err(SenseError::Config(format!(
                    "{class:?} window {base:#05x}..={last:#05x} overlaps a pose id"
                )));
            }
            windows.push((u32::from(base), last));
        }
        for (i, a) in windows.iter().enumerate() {
            for b in &windows[i + 1..] {
                if a.0 <= b.1 && b.0 <= a.1 {
                    return Err(SenseError::Config("class id windows overlap".to_string()));
                }
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failures of the bus transport.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("failed to open bus on {addr}: {source}")]
    Open {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("bus closed")]
    Closed,
}

/// Crate-wide error type of the perception node.
#[derive(Error, Debug)]
pub enum SenseError {
    #[error("frame id {0:#x} exceeds the 11-bit identifier range")]
    InvalidFrameId(u32),

    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLong(usize),

    #[error("malformed payload: expected {expected} bytes, got {actual}")]
    Format { expected: usize, actual: usize },

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}
