//! In-process bus.
//!
//! Uses a [`tokio::sync::broadcast`] channel so every endpoint sees every
//! frame, the way every node on a CAN segment sees every transmission. An
//! endpoint does not receive the frames it sent itself, matching SocketCAN's
//! default for raw sockets.
//!
//! No async runtime is needed: endpoints only use the synchronous `send` and
//! `try_recv` halves of the channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::broadcast;
use tracing::warn;
use tracksense_types::{BusError, Frame};

use crate::bus::BusTransport;

/// Default number of frames buffered before slow endpoints start lagging.
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Envelope {
    origin: u32,
    frame: Frame,
}

/// Shared bus. Clone it cheaply – all clones share one channel.
#[derive(Clone, Debug)]
pub struct LoopbackBus {
    sender: broadcast::Sender<Envelope>,
    next_endpoint: Arc<AtomicU32>,
}

impl LoopbackBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_endpoint: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Attach a new endpoint. It receives every frame sent by any other
    /// endpoint from this point on.
    pub fn endpoint(&self) -> LoopbackEndpoint {
        LoopbackEndpoint {
            id: self.next_endpoint.fetch_add(1, Ordering::Relaxed),
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One node's view of a [`LoopbackBus`].
pub struct LoopbackEndpoint {
    id: u32,
    sender: broadcast::Sender<Envelope>,
    receiver: broadcast::Receiver<Envelope>,
}

impl BusTransport for LoopbackEndpoint {
    fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        let envelope = Envelope {
            origin: self.id,
            frame: *frame,
        };
        // Our own receiver keeps the channel open, so this only fails once
        // every endpoint is gone. Nobody listening is fine on a bus.
        let _ = self.sender.send(envelope);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) if envelope.origin == self.id => continue,
                Ok(envelope) => return Ok(Some(envelope.frame)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(endpoint = self.id, lagged_by = n, "loopback endpoint lagged; frames lost");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }
}
