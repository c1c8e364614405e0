//! Frame Codec.
//!
//! Payloads are one or two IEEE-754 single-precision values in their natural
//! little-endian byte layout, concatenated with no padding:
//!
//! | Frame kind | Payload |
//! |---|---|
//! | pose field | `f32` value (4 bytes) |
//! | detection | `f32` range, `f32` bearing (8 bytes) |
//!
//! Decoding checks the payload length only. NaN and infinities pass through
//! untouched.
//!
//! On datagram transports each frame travels as a 16-byte record laid out
//! like a SocketCAN `can_frame`:
//!
//! ```text
//! 0..4   identifier, u32 little-endian
//! 4      payload length (0..=8)
//! 5..8   padding (zero)
//! 8..16  payload, zero-filled past the length
//! ```

use tracksense_types::{
    Detection, Frame, FrameIds, LandmarkClass, MAX_FRAME_ID, MAX_PAYLOAD, SenseError,
};

/// Payload length of a pose-field frame.
pub const POSE_FIELD_LEN: usize = 4;

/// Payload length of a detection frame.
pub const DETECTION_LEN: usize = 8;

/// Size of one frame on a datagram transport.
pub const WIRE_FRAME_LEN: usize = 16;

// ────────────────────────────────────────────────────────────────────────────
// Scalar payloads
// ────────────────────────────────────────────────────────────────────────────

pub fn encode_f32(value: f32) -> [u8; POSE_FIELD_LEN] {
    value.to_le_bytes()
}

/// Pack two values back to back, `a` first.
pub fn encode_f32_pair(a: f32, b: f32) -> [u8; DETECTION_LEN] {
    let mut out = [0u8; DETECTION_LEN];
    out[..4].copy_from_slice(&a.to_le_bytes());
    out[4..].copy_from_slice(&b.to_le_bytes());
    out
}

/// Inverse of [`encode_f32`]. Fails unless the payload is exactly 4 bytes.
pub fn decode_f32(payload: &[u8]) -> Result<f32, SenseError> {
    let bytes: [u8; POSE_FIELD_LEN] = payload.try_into().map_err(|_| SenseError::Format {
        expected: POSE_FIELD_LEN,
        actual: payload.len(),
    })?;
    Ok(f32::from_le_bytes(bytes))
}

/// Inverse of [`encode_f32_pair`]. Fails unless the payload is exactly 8 bytes.
pub fn decode_f32_pair(payload: &[u8]) -> Result<(f32, f32), SenseError> {
    if payload.len() != DETECTION_LEN {
        return Err(SenseError::Format {
            expected: DETECTION_LEN,
            actual: payload.len(),
        });
    }
    let (a, b) = payload.split_at(4);
    Ok((decode_f32(a)?, decode_f32(b)?))
}

// ────────────────────────────────────────────────────────────────────────────
// Typed frames
// ────────────────────────────────────────────────────────────────────────────

/// Single-scalar frame as broadcast by the vehicle for each pose field.
pub fn pose_field_frame(id: u16, value: f32) -> Result<Frame, SenseError> {
    Frame::new(id, &encode_f32(value))
}

/// Outbound detection frame: range then bearing.
pub fn detection_frame(detection: &Detection) -> Result<Frame, SenseError> {
    Frame::new(
        detection.id,
        &encode_f32_pair(detection.range, detection.bearing),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Datagram layout
// ────────────────────────────────────────────────────────────────────────────

pub fn encode_wire(frame: &Frame) -> [u8; WIRE_FRAME_LEN] {
    let mut out = [0u8; WIRE_FRAME_LEN];
    out[..4].copy_from_slice(&u32::from(frame.id()).to_le_bytes());
    out[4] = frame.len() as u8;
    out[8..8 + frame.len()].copy_from_slice(frame.payload());
    out
}

/// Parse one 16-byte datagram record.
pub fn decode_wire(buf: &[u8]) -> Result<Frame, SenseError> {
    if buf.len() != WIRE_FRAME_LEN {
        return Err(SenseError::Format {
            expected: WIRE_FRAME_LEN,
            actual: buf.len(),
        });
    }
    let raw_id = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if raw_id > u32::from(MAX_FRAME_ID) {
        return Err(SenseError::InvalidFrameId(raw_id));
    }
    let len = usize::from(buf[4]);
    if len > MAX_PAYLOAD {
        return Err(SenseError::PayloadTooLong(len));
    }
    Frame::new(raw_id as u16, &buf[8..8 + len])
}

// ────────────────────────────────────────────────────────────────────────────
// Consumer side
// ────────────────────────────────────────────────────────────────────────────

/// A detection frame as seen by a downstream consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedDetection {
    pub class: LandmarkClass,
    /// Offset inside the class window (the per-cycle counter value).
    pub slot: u16,
    pub range: f32,
    pub bearing: f32,
}

/// Maps detection frames back onto their class windows.
#[derive(Debug, Clone, Copy)]
pub struct DetectionDecoder {
    ids: FrameIds,
    window: u16,
}

impl DetectionDecoder {
    /// `window` is the number of ids owned by each class.
    pub fn new(ids: FrameIds, window: u16) -> Self {
        Self { ids, window }
    }

    /// Returns `Ok(None)` for frames outside every class window and a format
    /// error for in-window frames whose payload is not 8 bytes.
    pub fn decode(&self, frame: &Frame) -> Result<Option<DecodedDetection>, SenseError> {
        let id = frame.id();
        let hit = LandmarkClass::SUPPORTED.into_iter().find_map(|class| {
            let base = self.ids.class_base(class)?;
            let slot = id.checked_sub(base)?;
            (slot < self.window).then_some((class, slot))
        });
        let Some((class, slot)) = hit else {
            return Ok(None);
        };
        let (range, bearing) = decode_f32_pair(frame.payload())?;
        Ok(Some(DecodedDetection {
            class,
            slot,
            range,
            bearing,
        }))
    }
}
