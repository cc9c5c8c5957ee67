//! In-process frame queues shared between the emulation thread and a host-side thread.
//!
//! [`FrameQueueBackend`] is the [`NetworkBackend`] half handed to the pump. [`FrameQueueHandle`] is
//! the cloneable, `Send` half used by whatever feeds frames in (a tap device, a test harness, a
//! packet replayer) and collects the frames the guest transmits.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::NetworkBackend;

/// Default number of frames each direction may hold before new frames are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default maximum accepted frame length (including an FCS, if present).
pub const DEFAULT_MAX_FRAME_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameQueueError {
    #[error("frame queue full: capacity={capacity}")]
    Full { capacity: usize },
    #[error("frame too large: len={len} max={max}")]
    TooLarge { len: usize, max: usize },
}

/// Counters for [`FrameQueueBackend`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameQueueStats {
    pub tx_frames: u64,
    pub tx_bytes: u64,
    pub tx_dropped_full: u64,
    pub tx_dropped_oversize: u64,

    pub rx_injected_frames: u64,
    pub rx_delivered_frames: u64,
    pub rx_dropped_full: u64,
    pub rx_dropped_oversize: u64,
}

#[derive(Debug)]
struct Queues {
    rx: VecDeque<Vec<u8>>,
    tx: VecDeque<Vec<u8>>,
    stats: FrameQueueStats,
}

#[derive(Debug)]
struct Shared {
    queues: Mutex<Queues>,
    capacity: usize,
    max_frame_len: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Backend half of a pair of bounded in-memory frame queues.
#[derive(Debug)]
pub struct FrameQueueBackend {
    shared: Arc<Shared>,
}

/// Host half of a [`FrameQueueBackend`].
#[derive(Debug, Clone)]
pub struct FrameQueueHandle {
    shared: Arc<Shared>,
}

impl FrameQueueBackend {
    /// Creates a backend/handle pair with default bounds.
    pub fn new() -> (Self, FrameQueueHandle) {
        Self::with_limits(DEFAULT_QUEUE_CAPACITY, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_limits(capacity: usize, max_frame_len: usize) -> (Self, FrameQueueHandle) {
        let shared = Arc::new(Shared {
            queues: Mutex::new(Queues {
                rx: VecDeque::new(),
                tx: VecDeque::new(),
                stats: FrameQueueStats::default(),
            }),
            capacity,
            max_frame_len,
        });
        (
            Self {
                shared: shared.clone(),
            },
            FrameQueueHandle { shared },
        )
    }

    pub fn stats(&self) -> FrameQueueStats {
        self.shared.lock().stats
    }
}

impl NetworkBackend for FrameQueueBackend {
    fn transmit(&mut self, frame: Vec<u8>) {
        let mut q = self.shared.lock();
        if frame.len() > self.shared.max_frame_len {
            q.stats.tx_dropped_oversize += 1;
            return;
        }
        if q.tx.len() >= self.shared.capacity {
            q.stats.tx_dropped_full += 1;
            return;
        }
        q.stats.tx_frames += 1;
        q.stats.tx_bytes += frame.len() as u64;
        q.tx.push_back(frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        let mut q = self.shared.lock();
        let frame = q.rx.pop_front()?;
        q.stats.rx_delivered_frames += 1;
        Some(frame)
    }

    fn queue_stats(&self) -> Option<FrameQueueStats> {
        Some(self.stats())
    }
}

impl FrameQueueHandle {
    /// Queues a host → guest frame.
    pub fn inject(&self, frame: Vec<u8>) -> Result<(), FrameQueueError> {
        let mut q = self.shared.lock();
        if frame.len() > self.shared.max_frame_len {
            q.stats.rx_dropped_oversize += 1;
            return Err(FrameQueueError::TooLarge {
                len: frame.len(),
                max: self.shared.max_frame_len,
            });
        }
        if q.rx.len() >= self.shared.capacity {
            q.stats.rx_dropped_full += 1;
            return Err(FrameQueueError::Full {
                capacity: self.shared.capacity,
            });
        }
        q.stats.rx_injected_frames += 1;
        q.rx.push_back(frame);
        Ok(())
    }

    /// Pops the oldest guest → host frame.
    pub fn pop_transmitted(&self) -> Option<Vec<u8>> {
        self.shared.lock().tx.pop_front()
    }

    /// Takes every guest → host frame queued so far, oldest first.
    pub fn drain_transmitted(&self) -> Vec<Vec<u8>> {
        self.shared.lock().tx.drain(..).collect()
    }

    pub fn pending_rx(&self) -> usize {
        self.shared.lock().rx.len()
    }

    pub fn stats(&self) -> FrameQueueStats {
        self.shared.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_frames_are_received_in_order() {
        let (mut backend, handle) = FrameQueueBackend::new();
        handle.inject(vec![1]).unwrap();
        handle.inject(vec![2]).unwrap();

        assert_eq!(backend.poll_receive(), Some(vec![1]));
        assert_eq!(backend.poll_receive(), Some(vec![2]));
        assert_eq!(backend.poll_receive(), None);
        assert_eq!(handle.stats().rx_delivered_frames, 2);
    }

    #[test]
    fn full_queues_drop_and_count() {
        let (mut backend, handle) = FrameQueueBackend::with_limits(1, 16);
        handle.inject(vec![1]).unwrap();
        assert_eq!(
            handle.inject(vec![2]),
            Err(FrameQueueError::Full { capacity: 1 })
        );

        backend.transmit(vec![3]);
        backend.transmit(vec![4]);

        let stats = backend.stats();
        assert_eq!(stats.rx_dropped_full, 1);
        assert_eq!(stats.tx_dropped_full, 1);
        assert_eq!(handle.drain_transmitted(), vec![vec![3]]);
    }

    #[test]
    fn oversize_frames_are_rejected_in_both_directions() {
        let (mut backend, handle) = FrameQueueBackend::with_limits(4, 8);
        assert_eq!(
            handle.inject(vec![0; 9]),
            Err(FrameQueueError::TooLarge { len: 9, max: 8 })
        );
        backend.transmit(vec![0; 9]);
        assert_eq!(handle.pop_transmitted(), None);
        assert_eq!(handle.stats().tx_dropped_oversize, 1);
    }
}
