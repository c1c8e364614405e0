//! Ingest Loop.
//!
//! Polls the inbound transport one frame at a time. An empty poll sleeps for
//! the configured backoff; any transport error ends the loop and is returned
//! to the owner. Completed poses run through the detection engine on this
//! thread, before the next poll.
//!
//! The publish queue is closed whenever the loop exits, so the writer can
//! finish draining and stop.

use std::thread;
use std::time::Duration;

use tracing::{error, info};
use tracksense_middleware::BusTransport;
use tracksense_perception::{CycleReport, DetectionEngine, FrameOutcome, PoseReconstructor};
use tracksense_types::{Frame, Pose, SenseError};

use crate::pipeline::ShutdownSignal;
use crate::publish_queue::{CloseOnDrop, PublishQueue};

/// Frame and cycle counters for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IngestSummary {
    pub frames: u64,
    pub malformed: u64,
    pub ignored: u64,
    pub poses: u64,
    pub detections: CycleReport,
    pub last_pose: Option<Pose>,
}

pub struct IngestLoop<B> {
    bus: B,
    reconstructor: PoseReconstructor,
    engine: DetectionEngine,
    queue: PublishQueue,
    backoff: Duration,
    shutdown: ShutdownSignal,
    summary: IngestSummary,
}

impl<B: BusTransport> IngestLoop<B> {
    pub fn new(
        bus: B,
        reconstructor: PoseReconstructor,
        engine: DetectionEngine,
        queue: PublishQueue,
        backoff: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            bus,
            reconstructor,
            engine,
            queue,
            backoff,
            shutdown,
            summary: IngestSummary::default(),
        }
    }

    /// Process one inbound frame.
    pub fn handle_frame(&mut self, frame: &Frame) {
        self.summary.frames += 1;
        match self.reconstructor.accept(frame) {
            FrameOutcome::Ignored => self.summary.ignored += 1,
            FrameOutcome::Malformed => self.summary.malformed += 1,
            FrameOutcome::Updated(_) => {}
            FrameOutcome::Completed(pose) => {
                self.summary.poses += 1;
                self.summary.last_pose = Some(pose);
                self.summary.detections += self.engine.process(&pose, &mut self.queue);
            }
        }
    }

    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    /// Poll until shutdown is signalled or the transport fails.
    pub fn run(mut self) -> Result<IngestSummary, SenseError> {
        let _close = CloseOnDrop(self.queue.clone());
        info!(backoff_ms = self.backoff.as_millis() as u64, "ingest loop started");

        while !self.shutdown.is_triggered() {
            match self.bus.try_recv() {
                Ok(Some(frame)) => self.handle_frame(&frame),
                Ok(None) => thread::sleep(self.backoff),
                Err(e) => {
                    error!(error = %e, frames = self.summary.frames, "bus read failed; stopping ingest loop");
                    return Err(e.into());
                }
            }
        }

        info!(
            frames = self.summary.frames,
            poses = self.summary.poses,
            detections = self.summary.detections.accepted,
            malformed = self.summary.malformed,
            "ingest loop stopped"
        );
        Ok(self.summary)
    }
}
