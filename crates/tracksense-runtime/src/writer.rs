//! Bus Writer.
//!
//! Owns the outbound transport. Each dequeued detection becomes exactly one
//! 8-byte frame (range, then bearing). A failed write is logged and counted;
//! the item is not retried.

use tracing::{info, trace, warn};
use tracksense_middleware::BusTransport;
use tracksense_middleware::codec::detection_frame;
use tracksense_types::{Detection, SenseError};

use crate::publish_queue::PublishQueue;

/// What the writer did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub written: u64,
    pub failed: u64,
}

pub struct BusWriter<B> {
    bus: B,
    queue: PublishQueue,
    summary: WriterSummary,
}

impl<B: BusTransport> BusWriter<B> {
    pub fn new(bus: B, queue: PublishQueue) -> Self {
        Self {
            bus,
            queue,
            summary: WriterSummary::default(),
        }
    }

    /// Encode and send one detection.
    pub fn publish(&mut self, detection: &Detection) -> Result<(), SenseError> {
        let frame = detection_frame(detection)?;
        self.bus.send(&frame)?;
        Ok(())
    }

    /// Drain the queue until it is closed and empty.
    pub fn run(mut self) -> WriterSummary {
        info!("bus writer started");
        while let Some(batch) = self.queue.dequeue_all() {
            for detection in &batch {
                match self.publish(detection) {
                    Ok(()) => {
                        trace!(id = %format_args!("{:#05x}", detection.id), "detection written");
                        self.summary.written += 1;
                    }
                    Err(e) => {
                        warn!(id = %format_args!("{:#05x}", detection.id), error = %e, "bus write failed; dropping detection");
                        self.summary.failed += 1;
                    }
                }
            }
        }
        info!(
            written = self.summary.written,
            failed = self.summary.failed,
            "bus writer stopped"
        );
        self.summary
    }
}
