use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;

/// Per-session queue of raw capture chunks.
///
/// The route callback is the single producer, the control plane the single
/// consumer. Pushing is lock-free and never blocks; the queue is unbounded
/// and only emptied by [`stop`](Self::stop) or [`clear`](Self::clear).
///
/// Draining does not rendezvous with an in-flight callback: a chunk pushed
/// while `stop` runs may land after the drain and is discarded by the next
/// `start` or `clear`.
#[derive(Debug, Default)]
pub struct RecordingBuffer {
    chunks: SegQueue<Vec<u8>>,
    armed: AtomicBool,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard anything queued and arm recording.
    pub fn start(&self) {
        self.drain_discard();
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Disarm and return every queued chunk concatenated in arrival order.
    pub fn stop(&self) -> Vec<u8> {
        self.armed.store(false, Ordering::SeqCst);
        let mut payload = Vec::new();
        while let Some(chunk) = self.chunks.pop() {
            payload.extend_from_slice(&chunk);
        }
        payload
    }

    /// Disarm and discard anything queued.
    pub fn clear(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.drain_discard();
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Relaxed)
    }

    /// Enqueue a copy of `frames` if recording is armed. Called from the
    /// audio thread.
    pub fn push(&self, frames: &[u8]) {
        if self.is_armed() && !frames.is_empty() {
            self.chunks.push(frames.to_vec());
        }
    }

    /// Number of queued chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn drain_discard(&self) {
        while self.chunks.pop().is_some() {}
    }
}
