//! Pipeline orchestration.
//!
//! [`Pipeline::spawn`] starts two named threads:
//!
//! ```text
//!   inbound bus ──▶ tracksense-ingest ──▶ PublishQueue ──▶ tracksense-writer ──▶ outbound bus
//! ```
//!
//! Both threads observe one [`ShutdownSignal`]. The ingest thread checks it
//! before every poll; when it exits (signal or fatal read error) it closes the
//! queue, and the writer stops once the queue is drained.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use tracksense_middleware::BusTransport;
use tracksense_perception::{DetectionEngine, PoseReconstructor};
use tracksense_types::SenseError;

use crate::ingest::{IngestLoop, IngestSummary};
use crate::publish_queue::PublishQueue;
use crate::writer::{BusWriter, WriterSummary};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

fn default_poll_backoff_ms() -> u64 {
    1
}

/// `[runtime]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Sleep between polls of an idle bus.
    #[serde(default = "default_poll_backoff_ms")]
    pub poll_backoff_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_backoff_ms: default_poll_backoff_ms(),
        }
    }
}

impl RuntimeConfig {
    /// A zero backoff would turn an idle bus into a busy spin.
    pub fn validate(&self) -> Result<(), SenseError> {
        if self.poll_backoff_ms == 0 {
            return Err(SenseError::Config("poll_backoff_ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn poll_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_backoff_ms)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shutdown
// ────────────────────────────────────────────────────────────────────────────

/// One-way stop flag shared by every clone.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineReport {
    pub ingest: IngestSummary,
    pub writer: WriterSummary,
}

/// Handle to the running ingest and writer threads.
pub struct Pipeline {
    ingest: JoinHandle<Result<IngestSummary, SenseError>>,
    writer: JoinHandle<WriterSummary>,
    shutdown: ShutdownSignal,
}

impl Pipeline {
    /// Start both loops. `inbound` is polled by the ingest thread; `outbound`
    /// is owned by the writer thread. Pose frames are read on the engine's
    /// ids.
    pub fn spawn<I, O>(
        inbound: I,
        outbound: O,
        engine: DetectionEngine,
        runtime: &RuntimeConfig,
    ) -> Result<Self, SenseError>
    where
        I: BusTransport + 'static,
        O: BusTransport + 'static,
    {
        runtime.validate()?;
        let queue = PublishQueue::new();
        let shutdown = ShutdownSignal::new();

        let writer = {
            let queue = queue.clone();
            thread::Builder::new()
                .name("tracksense-writer".into())
                .spawn(move || BusWriter::new(outbound, queue).run())
                .map_err(|source| SenseError::Spawn {
                    name: "writer",
                    source,
                })?
        };

        let ingest_loop = IngestLoop::new(
            inbound,
            PoseReconstructor::new(engine.ids()),
            engine,
            queue.clone(),
            runtime.poll_backoff(),
            shutdown.clone(),
        );
        let ingest = match thread::Builder::new()
            .name("tracksense-ingest".into())
            .spawn(move || ingest_loop.run())
        {
            Ok(handle) => handle,
            Err(source) => {
                queue.close();
                join_or_resume(writer);
                return Err(SenseError::Spawn {
                    name: "ingest",
                    source,
                });
            }
        };

        info!("pipeline running");
        Ok(Self {
            ingest,
            writer,
            shutdown,
        })
    }

    /// A clone of the stop flag, e.g. for a signal handler.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Ask both loops to stop. Returns immediately; use [`join`][Self::join]
    /// to wait.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// `true` once the ingest loop has exited.
    pub fn is_finished(&self) -> bool {
        self.ingest.is_finished()
    }

    /// Wait for both threads. Blocks until shutdown is signalled or the
    /// ingest loop hits a fatal read error.
    pub fn join(self) -> Result<PipelineReport, SenseError> {
        let ingest = join_or_resume(self.ingest);
        let writer = join_or_resume(self.writer);
        let ingest = ingest?;
        info!(
            poses = ingest.poses,
            written = writer.written,
            failed = writer.failed,
            "pipeline stopped"
        );
        Ok(PipelineReport { ingest, writer })
    }
}

/// Join `handle`, re-raising its panic on the calling thread.
fn join_or_resume<T>(handle: JoinHandle<T>) -> T {
    handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tracksense_middleware::{DetectionDecoder, LoopbackBus, LoopbackEndpoint, publish_pose};
    use tracksense_perception::{DetectionConfig, LandmarkMap, LandmarkRecord};
    use tracksense_types::{BusError, Frame, FrameIds, LandmarkClass, Pose};

    fn noiseless_engine(records: Vec<LandmarkRecord>) -> DetectionEngine {
        noiseless_engine_on(FrameIds::default(), records)
    }

    fn noiseless_engine_on(ids: FrameIds, records: Vec<LandmarkRecord>) -> DetectionEngine {
        let config = DetectionConfig {
            pixels_per_meter: 1.0,
            range_noise_std_dev: 0.0,
            bearing_noise_std_dev: 0.0,
            detection_range: 10.0,
            seed: Some(11),
            ..DetectionConfig::default()
        };
        let (map, _) = LandmarkMap::from_records(records);
        DetectionEngine::new(config, ids, map).unwrap()
    }

    fn collect_detections(
        rx: &mut LoopbackEndpoint,
        decoder: &DetectionDecoder,
        want: usize,
    ) -> Result<Vec<tracksense_middleware::DecodedDetection>, BusError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < want && Instant::now() < deadline {
            match rx.try_recv()? {
                Some(frame) => {
                    if let Ok(Some(d)) = decoder.decode(&frame) {
                        out.push(d);
                    }
                }
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        Ok(out)
    }

    #[test]
    fn pose_in_detections_out_over_the_loopback_bus() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LoopbackBus::default();
        let mut vehicle = bus.endpoint();
        let mut consumer = bus.endpoint();
        let ids = FrameIds::default();

        let engine = noiseless_engine(vec![
            LandmarkRecord::new(3.0, 4.0, "blue"),
            LandmarkRecord::new(0.0, 2.0, "yellow"),
            LandmarkRecord::new(100.0, 0.0, "blue"),
            LandmarkRecord::new(1.0, 1.0, "orange"),
        ]);
        let pipeline = Pipeline::spawn(bus.endpoint(), bus.endpoint(), engine, &RuntimeConfig::default())?;

        publish_pose(&mut vehicle, &ids, Pose::new(0.0, 0.0, 0.0))?;

        let decoder = DetectionDecoder::new(ids, 128);
        let got = collect_detections(&mut consumer, &decoder, 2)?;
        assert_eq!(got.len(), 2, "expected two in-range detections, got {got:?}");

        assert_eq!(got[0].class, LandmarkClass::Blue);
        assert_eq!(got[0].slot, 0);
        assert!((got[0].range - 5.0).abs() < 1e-5);
        assert!((got[0].bearing - 53.130_1).abs() < 1e-3, "bearing={}", got[0].bearing);

        assert_eq!(got[1].class, LandmarkClass::Yellow);
        assert!((got[1].range - 2.0).abs() < 1e-5);
        assert!((got[1].bearing - 90.0).abs() < 1e-3);

        pipeline.shutdown();
        let report = pipeline.join()?;
        assert_eq!(report.ingest.poses, 1);
        assert_eq!(report.ingest.detections.accepted, 2);
        assert_eq!(report.ingest.detections.out_of_range, 1);
        assert_eq!(report.writer, WriterSummary { written: 2, failed: 0 });
        assert_eq!(report.ingest.last_pose, Some(Pose::new(0.0, 0.0, 0.0)));
        Ok(())
    }

    #[test]
    fn second_cycle_reuses_the_class_base() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LoopbackBus::default();
        let mut vehicle = bus.endpoint();
        let mut consumer = bus.endpoint();
        let ids = FrameIds::default();

        let engine = noiseless_engine(vec![LandmarkRecord::new(1.0, 0.0, "blue")]);
        let pipeline = Pipeline::spawn(bus.endpoint(), bus.endpoint(), engine, &RuntimeConfig::default())?;
        let decoder = DetectionDecoder::new(ids, 128);

        publish_pose(&mut vehicle, &ids, Pose::new(0.0, 0.0, 0.0))?;
        let first = collect_detections(&mut consumer, &decoder, 1)?;
        publish_pose(&mut vehicle, &ids, Pose::new(0.5, 0.0, 0.0))?;
        let second = collect_detections(&mut consumer, &decoder, 1)?;

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].slot, 0);
        assert_eq!(second[0].slot, 0);
        assert!((second[0].range - 0.5).abs() < 1e-5);

        pipeline.shutdown();
        pipeline.join()?;
        Ok(())
    }

    #[test]
    fn pose_ids_come_from_the_engine() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LoopbackBus::default();
        let mut vehicle = bus.endpoint();
        let mut consumer = bus.endpoint();
        let ids = FrameIds {
            pose_x: 0x10,
            pose_y: 0x11,
            pose_heading: 0x12,
            ..FrameIds::default()
        };

        let engine = noiseless_engine_on(ids, vec![LandmarkRecord::new(2.0, 0.0, "blue")]);
        let pipeline = Pipeline::spawn(bus.endpoint(), bus.endpoint(), engine, &RuntimeConfig::default())?;

        // Frames on the default pose ids are not this node's pose.
        publish_pose(&mut vehicle, &FrameIds::default(), Pose::new(0.0, 0.0, 0.0))?;
        publish_pose(&mut vehicle, &ids, Pose::new(0.0, 0.0, 0.0))?;

        let decoder = DetectionDecoder::new(ids, 128);
        let got = collect_detections(&mut consumer, &decoder, 1)?;
        assert_eq!(got.len(), 1, "got {got:?}");
        assert!((got[0].range - 2.0).abs() < 1e-5);

        pipeline.shutdown();
        let report = pipeline.join()?;
        assert_eq!(report.ingest.poses, 1);
        Ok(())
    }

    #[test]
    fn zero_backoff_is_rejected_before_any_thread_starts() {
        let bus = LoopbackBus::default();
        let runtime = RuntimeConfig { poll_backoff_ms: 0 };
        assert!(matches!(runtime.validate(), Err(SenseError::Config(_))));

        let result = Pipeline::spawn(bus.endpoint(), bus.endpoint(), noiseless_engine(Vec::new()), &runtime);
        assert!(matches!(result, Err(SenseError::Config(_))));
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn worker_panics_are_re_raised_on_join() {
        let handle = thread::spawn(|| -> u32 { panic!("writer blew up") });
        let joined = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| join_or_resume(handle)));
        assert!(joined.is_err());

        let handle = thread::spawn(|| 7u32);
        assert_eq!(join_or_resume(handle), 7);
    }

    #[test]
    fn shutdown_joins_an_idle_pipeline() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LoopbackBus::default();
        let runtime = RuntimeConfig { poll_backoff_ms: 5 };
        let pipeline = Pipeline::spawn(
            bus.endpoint(),
            bus.endpoint(),
            noiseless_engine(Vec::new()),
            &runtime,
        )?;
        let signal = pipeline.shutdown_signal();
        thread::sleep(Duration::from_millis(20));
        assert!(!pipeline.is_finished());

        signal.trigger();
        let report = pipeline.join()?;
        assert_eq!(report.ingest.frames, 0);
        assert_eq!(report.writer, WriterSummary::default());
        Ok(())
    }

    /// Inbound transport that fails on the first poll.
    struct BrokenBus;

    impl BusTransport for BrokenBus {
        fn send(&mut self, _frame: &Frame) -> Result<(), BusError> {
            Ok(())
        }

        fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
            Err(BusError::Closed)
        }
    }

    #[test]
    fn fatal_read_error_surfaces_from_join() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LoopbackBus::default();
        let pipeline = Pipeline::spawn(
            BrokenBus,
            bus.endpoint(),
            noiseless_engine(Vec::new()),
            &RuntimeConfig::default(),
        )?;
        // No shutdown requested: the writer must still stop on its own.
        let result = pipeline.join();
        assert!(matches!(result, Err(SenseError::Bus(BusError::Closed))));
        Ok(())
    }

    #[test]
    fn runtime_table_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config: RuntimeConfig = toml::from_str("")?;
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.poll_backoff(), Duration::from_millis(1));
        Ok(())
    }
}
