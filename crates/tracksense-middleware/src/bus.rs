//! The transport seam.
//!
//! The pipeline never touches sockets directly. It reads and writes through a
//! [`BusTransport`], so the same loops run over the in-process
//! [`LoopbackBus`][crate::loopback::LoopbackBus] in tests and over
//! [`UdpBus`][crate::udp::UdpBus] next to the real simulator.

use tracksense_types::{BusError, Frame, FrameIds, Pose, PoseField, SenseError};

use crate::codec::pose_field_frame;

/// A handle onto the shared bus.
///
/// # Contract
///
/// * `send` performs exactly one write of `frame`. A failed or partial write
///   is reported as an error and never retried by the transport.
/// * `try_recv` never blocks. `Ok(None)` means nothing is available right now
///   (would-block) and is not an error; `Err` is a genuine transport fault.
pub trait BusTransport: Send {
    fn send(&mut self, frame: &Frame) -> Result<(), BusError>;

    fn try_recv(&mut self) -> Result<Option<Frame>, BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        (**self).send(frame)
    }

    fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
        (**self).try_recv()
    }
}

/// Broadcast `pose` the way the vehicle does: one 4-byte frame per field,
/// X first, then Y, then heading.
pub fn publish_pose<B>(bus: &mut B, ids: &FrameIds, pose: Pose) -> Result<(), SenseError>
where
    B: BusTransport + ?Sized,
{
    for field in PoseField::ALL {
        let frame = pose_field_frame(ids.pose_id(field), pose.field(field))?;
        bus.send(&frame)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_f32;

    #[derive(Default)]
    struct RecordingBus {
        sent: Vec<Frame>,
    }

    impl BusTransport for RecordingBus {
        fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
            self.sent.push(*frame);
            Ok(())
        }

        fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
            Ok(None)
        }
    }

    #[test]
    fn publish_pose_sends_three_scalar_frames() {
        let mut bus = RecordingBus::default();
        let ids = FrameIds::default();
        publish_pose(&mut bus, &ids, Pose::new(1.0, -2.0, 0.5)).unwrap();

        let got: Vec<(u16, f32)> = bus
            .sent
            .iter()
            .map(|f| (f.id(), decode_f32(f.payload()).unwrap()))
            .collect();
        assert_eq!(got, vec![(0x200, 1.0), (0x201, -2.0), (0x202, 0.5)]);
    }

    #[test]
    fn boxed_transport_forwards_calls() {
        let mut bus: Box<dyn BusTransport> = Box::new(RecordingBus::default());
        publish_pose(&mut bus, &FrameIds::default(), Pose::new(0.0, 0.0, 0.0)).unwrap();
        assert!(bus.try_recv().unwrap().is_none());
    }

    #[test]
    fn publish_pose_rejects_ids_outside_the_bus() {
        let mut bus = RecordingBus::default();
        let ids = FrameIds {
            pose_y: 0x900,
            ..FrameIds::default()
        };
        let err = publish_pose(&mut bus, &ids, Pose::new(0.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, SenseError::InvalidFrameId(0x900)));
        // X went out before Y was rejected.
        assert_eq!(bus.sent.len(), 1);
    }
}
