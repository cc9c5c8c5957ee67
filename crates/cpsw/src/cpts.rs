//! Common platform time sync (CPTS) event FIFO.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CpswError, Result};

/// CPTS event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    EthernetReceive = 4,
    EthernetTransmit = 5,
}

/// Decoded form of the `EVENT_HIGH` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMetadata {
    pub port: u8,
    pub event_type: EventType,
    pub message_type: u8,
    pub sequence_id: u16,
}

impl EventMetadata {
    /// Packs into `port[28:24] | event_type[23:20] | message_type[19:16] | sequence_id[15:0]`.
    pub fn to_word(self) -> u32 {
        (u32::from(self.port & 0x1F) << 24)
            | ((self.event_type as u32 & 0xF) << 20)
            | (u32::from(self.message_type & 0xF) << 16)
            | u32::from(self.sequence_id)
    }
}

/// One queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampEvent {
    pub metadata: u32,
    pub timestamp: u32,
}

/// Source of the timestamp latched into each event.
pub trait CptsClock: Send {
    /// Current counter value. Only the low 32 bits are reported to software.
    fn now(&self) -> u64;
}

/// Clock that never advances. Events carry a zero timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrozenClock;

impl CptsClock for FrozenClock {
    fn now(&self) -> u64 {
        0
    }
}

impl<F: Fn() -> u64 + Send> CptsClock for F {
    fn now(&self) -> u64 {
        self()
    }
}

/// FIFO of timestamp events.
///
/// Cloning yields another handle to the same queue, so host-side code can observe events without
/// borrowing the device.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<TimestampEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TimestampEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, metadata: u32, timestamp: u32) {
        self.lock().push_back(TimestampEvent {
            metadata,
            timestamp,
        });
    }

    pub fn peek(&self) -> Result<TimestampEvent> {
        self.lock().front().copied().ok_or(CpswError::EmptyQueueRead)
    }

    pub fn peek_metadata(&self) -> Result<u32> {
        self.peek().map(|event| event.metadata)
    }

    pub fn peek_timestamp(&self) -> Result<u32> {
        self.peek().map(|event| event.timestamp)
    }

    /// Drops the oldest event. Popping an empty queue does nothing.
    pub fn pop(&self) -> Option<TimestampEvent> {
        self.lock().pop_front()
    }

    pub fn pending(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.pending()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_come_out_in_fifo_order() {
        let queue = EventQueue::new();
        for i in 0..5 {
            queue.push(i, 100 + i);
        }

        for i in 0..5 {
            assert_eq!(queue.peek_metadata().unwrap(), i);
            assert_eq!(queue.peek_timestamp().unwrap(), 100 + i);
            assert_eq!(
                queue.pop(),
                Some(TimestampEvent {
                    metadata: i,
                    timestamp: 100 + i
                })
            );
        }
        assert!(!queue.pending());
    }

    #[test]
    fn empty_queue_peek_is_an_error_and_pop_is_not() {
        let queue = EventQueue::new();
        assert_eq!(queue.peek_metadata(), Err(CpswError::EmptyQueueRead));
        assert_eq!(queue.peek_timestamp(), Err(CpswError::EmptyQueueRead));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn peek_does_not_consume() {
        let queue = EventQueue::new();
        queue.push(7, 8);
        assert_eq!(queue.peek_metadata().unwrap(), 7);
        assert_eq!(queue.peek_metadata().unwrap(), 7);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn metadata_packs_documented_fields() {
        let meta = EventMetadata {
            port: 1,
            event_type: EventType::EthernetReceive,
            message_type: 0x3,
            sequence_id: 0xBEEF,
        };
        assert_eq!(meta.to_word(), 0x0143_BEEF);
    }

    #[test]
    fn closures_act_as_clocks() {
        let clock = || 0x1_2345_6789u64;
        assert_eq!(CptsClock::now(&clock), 0x1_2345_6789);
        assert_eq!(FrozenClock.now(), 0);
    }
}
