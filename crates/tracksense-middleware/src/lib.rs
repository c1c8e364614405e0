//! `tracksense-middleware` – the wire.
//!
//! Moves fixed-format frames between the perception node and the rest of the
//! car without caring what the numbers mean.
//!
//! # Modules
//!
//! - [`codec`] – packs and unpacks little-endian `f32` payloads, the 16-byte
//!   datagram layout, and detection frames for downstream consumers.
//! - [`bus`] – the [`BusTransport`] seam every transport implements, plus
//!   [`publish_pose`] for feeding a pose onto the bus.
//! - [`loopback`] – in-process point-to-multipoint bus built on Tokio
//!   broadcast channels, used by tests and single-process simulation.
//! - [`udp`] – non-blocking UDP transport for talking to the out-of-process
//!   vehicle simulator and GUI.

pub mod bus;
pub mod codec;
pub mod loopback;
pub mod udp;

pub use bus::{BusTransport, publish_pose};
pub use codec::{DecodedDetection, DetectionDecoder};
pub use loopback::{LoopbackBus, LoopbackEndpoint};
pub use udp::UdpBus;
