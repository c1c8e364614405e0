//! `tracksense-runtime` – the two-thread perception pipeline.
//!
//! # Modules
//!
//! - [`publish_queue`] – [`PublishQueue`][publish_queue::PublishQueue]:
//!   unbounded FIFO (mutex + condition variable) between the ingest thread
//!   and the bus writer.
//! - [`writer`] – [`BusWriter`][writer::BusWriter]: drains the queue and
//!   performs one bus write per detection.
//! - [`ingest`] – [`IngestLoop`][ingest::IngestLoop]: polls the bus, drives
//!   the pose reconstructor and runs the detection engine on completion.
//! - [`pipeline`] – [`Pipeline`][pipeline::Pipeline]: spawns both loops and
//!   joins them after a [`ShutdownSignal`][pipeline::ShutdownSignal].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber setup.

pub mod ingest;
pub mod pipeline;
pub mod publish_queue;
pub mod telemetry;
pub mod writer;

pub use ingest::{IngestLoop, IngestSummary};
pub use pipeline::{Pipeline, PipelineReport, RuntimeConfig, ShutdownSignal};
pub use publish_queue::PublishQueue;
pub use writer::{BusWriter, WriterSummary};
