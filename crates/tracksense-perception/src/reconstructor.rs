//! Pose Reconstructor.
//!
//! The vehicle broadcasts X, Y and heading as three separate 4-byte frames.
//! [`PoseReconstructor`] stores each value as it arrives and emits one
//! [`Pose`] as soon as all three have been seen since the last emission,
//! whatever the arrival order. A repeated field before completion simply
//! overwrites the stored value.
//!
//! ```text
//!            field frame (valid)           all three arrived
//!   WAITING ─────────────────────▶ WAITING ─────────────────▶ emit Pose, clear flags
//!      │
//!      └── unknown id / bad length: no change
//! ```

use tracing::debug;
use tracksense_middleware::codec::decode_f32;
use tracksense_types::{Frame, FrameIds, Pose, PoseField};

/// What a single inbound frame did to the reconstructor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The id is not a pose-field id.
    Ignored,
    /// Pose-field id with a payload that is not 4 bytes; dropped.
    Malformed,
    /// Field stored; the pose is still incomplete.
    Updated(PoseField),
    /// Field stored and it completed the pose.
    Completed(Pose),
}

#[derive(Debug, Clone)]
pub struct PoseReconstructor {
    ids: FrameIds,
    values: [f32; 3],
    arrived: [bool; 3],
    last_pose: Option<Pose>,
}

impl PoseReconstructor {
    pub fn new(ids: FrameIds) -> Self {
        Self {
            ids,
            values: [0.0; 3],
            arrived: [false; 3],
            last_pose: None,
        }
    }

    /// Feed one bus frame.
    pub fn accept(&mut self, frame: &Frame) -> FrameOutcome {
        let Some(field) = self.ids.pose_field(frame.id()) else {
            return FrameOutcome::Ignored;
        };
        let value = match decode_f32(frame.payload()) {
            Ok(v) => v,
            Err(e) => {
                debug!(id = %format_args!("{:#05x}", frame.id()), error = %e, "dropping pose frame");
                return FrameOutcome::Malformed;
            }
        };

        self.values[field.index()] = value;
        self.arrived[field.index()] = true;

        if !self.arrived.iter().all(|a| *a) {
            return FrameOutcome::Updated(field);
        }

        let [x, y, heading_rad] = self.values;
        let pose = Pose { x, y, heading_rad };
        self.arrived = [false; 3];
        self.last_pose = Some(pose);
        FrameOutcome::Completed(pose)
    }

    /// `true` if `field` arrived since the last completed pose.
    pub fn has_arrived(&self, field: PoseField) -> bool {
        self.arrived[field.index()]
    }

    /// Most recent completed pose, kept for diagnostics.
    pub fn last_pose(&self) -> Option<Pose> {
        self.last_pose
    }
}
