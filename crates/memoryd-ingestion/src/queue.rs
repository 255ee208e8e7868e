//! Bounded in-memory backpressure queue of claimed upload manifest
//! keys, shared by every worker (spec §5: "default capacity = 4 x
//! worker_count... When full, discovery pauses").

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

pub struct UploadQueue {
    sender: Sender<String>,
    receiver: Receiver<String>,
}

impl UploadQueue {
    pub fn new(worker_count: usize) -> Self {
        Self::with_capacity((4 * worker_count.max(1)).max(1))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self { sender, receiver }
    }

    /// Returns `false` without blocking if the queue is full — the
    /// caller (discovery) treats that as the pause signal.
    pub fn try_push(&self, manifest_key: String) -> bool {
        !matches!(self.sender.try_send(manifest_key), Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)))
    }

    pub fn pop(&self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_full(&self) -> bool {
        self.sender.capacity().map(|cap| self.len() >= cap).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_beyond_capacity_pauses_discovery() {
        let queue = UploadQueue::with_capacity(2);
        assert!(queue.try_push("a".to_string()));
        assert!(queue.try_push("b".to_string()));
        assert!(!queue.try_push("c".to_string()));
        assert!(queue.is_full());
    }

    #[test]
    fn pop_drains_in_fifo_order() {
        let queue = UploadQueue::with_capacity(4);
        queue.try_push("a".to_string());
        queue.try_push("b".to_string());
        assert_eq!(queue.pop(), Some("a".to_string()));
        assert_eq!(queue.pop(), Some("b".to_string()));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn default_capacity_is_four_times_worker_count() {
        let queue = UploadQueue::new(3);
        for i in 0..12 {
            assert!(queue.try_push(i.to_string()));
        }
        assert!(!queue.try_push("overflow".to_string()));
    }
}
