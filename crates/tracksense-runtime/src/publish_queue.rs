//! Publish Queue.
//!
//! Single-producer, single-consumer handoff between the ingest thread and
//! the bus writer. [`enqueue`][PublishQueue::enqueue] never blocks and never
//! drops; [`dequeue_all`][PublishQueue::dequeue_all] blocks while the queue is
//! empty and then takes everything at once, in FIFO order.
//!
//! Closing the queue is how the consumer learns that no more items will
//! come: once closed and drained, `dequeue_all` returns `None`.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracksense_perception::DetectionSink;
use tracksense_types::Detection;

#[derive(Debug, Default)]
struct State {
    items: VecDeque<Detection>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    ready: Condvar,
}

/// Cloneable handle; all clones refer to the same queue.
#[derive(Debug, Clone, Default)]
pub struct PublishQueue {
    shared: Arc<Shared>,
}

impl PublishQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic on the other side must not take the queue down with it; the
    // state is a plain deque plus a flag, so it is consistent at every
    // unlock.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `detection` and wake the consumer.
    pub fn enqueue(&self, detection: Detection) {
        self.lock().items.push_back(detection);
        self.shared.ready.notify_one();
    }

    /// Block until at least one item is queued, then remove and return all
    /// queued items. Returns `None` once the queue is closed and empty.
    pub fn dequeue_all(&self) -> Option<Vec<Detection>> {
        let mut state = self
            .shared
            .ready
            .wait_while(self.lock(), |s| s.items.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if state.items.is_empty() {
            return None;
        }
        Some(state.items.drain(..).collect())
    }

    /// Mark the end of the stream and wake the consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DetectionSink for PublishQueue {
    fn push(&mut self, detection: Detection) {
        self.enqueue(detection);
    }
}

/// Closes the queue when dropped, whichever way the owner exits.
#[derive(Debug)]
pub(crate) struct CloseOnDrop(pub(crate) PublishQueue);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}
