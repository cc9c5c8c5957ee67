use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use memory::GuestMemory;
use tracing::{trace, warn};

use crate::cpts::{EventMetadata, EventType};
use crate::descriptor::{RxFlags, MAX_PACKET_LEN};
use crate::device::CpswDevice;
use crate::error::{CpswError, Result};
use crate::frame::{classify, ptp_message_type, ptp_sequence_id, FrameClass, RxFrame};
use crate::regs::{RX_ERR_CODE_NOT_OWNED, RX_ERR_CODE_NO_DESCRIPTOR};
use crate::ring::{plan_rx_fill, RxFillPlan};

/// Port number reported for every received frame.
const RX_PORT: u8 = 1;

/// Flags the engine owns in word 3 of a receive descriptor.
const RX_STATUS_FLAGS: RxFlags = RxFlags::SOP
    .union(RxFlags::EOP)
    .union(RxFlags::EOQ)
    .union(RxFlags::TD_COMPLETE)
    .union(RxFlags::PASS_CRC)
    .union(RxFlags::VLAN_ENCAP)
    .union(RxFlags::OVERRUN)
    .union(RxFlags::MAC_CTL)
    .union(RxFlags::SHORT)
    .union(RxFlags::LONG);

#[derive(Debug)]
struct Shared {
    frames: Mutex<VecDeque<RxFrame>>,
    capacity: usize,
    accepting: AtomicBool,
    dropped: AtomicU64,
}

/// Cloneable producer side of the device's pending receive queue.
///
/// Frames handed over here wait until the device next drains the queue: on delivery through
/// [`CpswDevice::receive_frame`], on an RX head pointer write, when the guest reads CPPI RAM, or
/// on [`CpswDevice::poll`].
#[derive(Debug, Clone)]
pub struct RxInjector {
    shared: Arc<Shared>,
}

impl RxInjector {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                frames: Mutex::new(VecDeque::new()),
                capacity,
                accepting: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RxFrame>> {
        self.shared
            .frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn drop_frame(&self, len: usize, err: CpswError) -> Result<()> {
        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        trace!(len, %err, "dropping rx frame");
        Err(err)
    }

    /// Queues a frame. Returns `false` if it was dropped because receive is disabled, the queue
    /// is full, or its length cannot be described by a descriptor.
    pub fn deliver(&self, frame: impl Into<RxFrame>) -> bool {
        self.try_deliver(frame.into()).is_ok()
    }

    /// Like [`RxInjector::deliver`], but reports why a frame was dropped.
    pub(crate) fn try_deliver(&self, frame: RxFrame) -> Result<()> {
        let len = frame.data.len();
        if !self.is_accepting() {
            return self.drop_frame(len, CpswError::RxDisabled);
        }
        if len == 0 || len > MAX_PACKET_LEN {
            return self.drop_frame(
                len,
                CpswError::FrameLength {
                    len,
                    max: MAX_PACKET_LEN,
                },
            );
        }
        let mut frames = self.lock();
        if frames.len() >= self.shared.capacity {
            drop(frames);
            return self.drop_frame(
                len,
                CpswError::QueueFull {
                    capacity: self.shared.capacity,
                },
            );
        }
        frames.push_back(frame);
        Ok(())
    }

    /// Frames waiting for their channel.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Mirrors `CPDMA_RX_CONTROL.RX_EN`.
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::Acquire)
    }

    pub(crate) fn set_accepting(&self, accepting: bool) {
        self.shared.accepting.store(accepting, Ordering::Release);
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Discards pending frames and stops accepting new ones. Drop counts are kept.
    pub(crate) fn clear(&self) {
        self.lock().clear();
        self.set_accepting(false);
    }

    pub(crate) fn reset(&self) {
        self.clear();
        self.shared.dropped.store(0, Ordering::Relaxed);
    }

    /// Removes the oldest frame if `ready` accepts it.
    fn pop_front_if(&self, ready: impl FnOnce(&RxFrame) -> bool) -> Option<RxFrame> {
        let mut frames = self.lock();
        if ready(frames.front()?) {
            frames.pop_front()
        } else {
            None
        }
    }
}

impl CpswDevice {
    /// Shared handle for delivering frames from other threads.
    pub fn rx_injector(&self) -> RxInjector {
        self.rx_queue.clone()
    }

    /// Delivers a frame from the network and immediately tries to place it.
    ///
    /// Frames for a channel whose head pointer is 0 stay queued. A frame refused outright
    /// (`RxDisabled`, `QueueFull`, `FrameLength`) is counted as dropped and its error returned.
    /// Otherwise returns the first failure of the resulting drain; the failing frame has been
    /// dropped and counted by then.
    pub fn receive_frame(
        &mut self,
        frame: impl Into<RxFrame>,
        mem: &mut dyn GuestMemory,
    ) -> Result<()> {
        self.rx_queue.try_deliver(frame.into())?;
        self.drain_pending(mem)
    }

    /// Retries pending receive frames. Returns the number written into rings.
    pub fn poll(&mut self, mem: &mut dyn GuestMemory) -> usize {
        let before = self.stats.rx_frames;
        // Failures are logged and counted where they happen.
        let _ = self.drain_pending(mem);
        (self.stats.rx_frames - before) as usize
    }

    fn frame_class(&self, frame: &RxFrame) -> FrameClass {
        frame
            .class
            .unwrap_or_else(|| classify(&frame.data, self.config.ptp_ethertype, self.ts_ltypes()))
    }

    fn rx_channel_for(&self, class: FrameClass) -> usize {
        match class {
            FrameClass::Ptp => self.config.ptp_rx_channel,
            FrameClass::Normal => self.config.default_rx_channel,
        }
    }

    /// Moves pending frames into their rings in arrival order, stopping at the first frame whose
    /// channel is idle.
    pub(crate) fn drain_pending(&mut self, mem: &mut dyn GuestMemory) -> Result<()> {
        if !self.rx_enabled() {
            return Ok(());
        }
        let mut first_error = None;
        loop {
            let ready = |frame: &RxFrame| {
                let channel = self.rx_channel_for(self.frame_class(frame));
                self.channels.rx(channel).head != 0
            };
            let Some(frame) = self.rx_queue.pop_front_if(ready) else {
                break;
            };
            let class = self.frame_class(&frame);
            let channel = self.rx_channel_for(class);
            if let Err(err) = self.fill_rx(channel, class, &frame, mem) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn fill_rx(
        &mut self,
        channel: usize,
        class: FrameClass,
        frame: &RxFrame,
        mem: &mut dyn GuestMemory,
    ) -> Result<()> {
        let rx = *self.channels.rx(channel);
        let start = rx.current.unwrap_or(rx.head);
        let result = plan_rx_fill(
            &self.cppi_ram,
            mem,
            channel,
            start,
            rx.head,
            frame.data.len(),
            self.config.max_descriptor_walk,
        )
        .and_then(|plan| self.commit_rx(channel, frame, &plan, mem));

        if let Err(err) = &result {
            self.record_rx_failure(channel, err);
            return result;
        }

        self.stats.rx_frames += 1;
        trace!(channel, len = frame.data.len(), ?class, "rx frame delivered");
        if class == FrameClass::Ptp && self.timestamps_enabled() {
            self.push_timestamp(EventMetadata {
                port: RX_PORT,
                event_type: EventType::EthernetReceive,
                message_type: ptp_message_type(&frame.data),
                sequence_id: ptp_sequence_id(&frame.data),
            });
        }
        Ok(())
    }

    /// Copies the payload, hands the descriptors back to software and advances the channel.
    fn commit_rx(
        &mut self,
        channel: usize,
        frame: &RxFrame,
        plan: &RxFillPlan,
        mem: &mut dyn GuestMemory,
    ) -> Result<()> {
        let Some(first) = plan.segments.first().map(|seg| seg.descriptor) else {
            return Ok(());
        };
        let last = plan.segments.len() - 1;

        for segment in &plan.segments {
            let bytes = &frame.data[segment.frame_offset..segment.frame_offset + segment.len];
            mem.write_from(segment.descriptor.data_address(), bytes)?;
        }

        for (i, segment) in plan.segments.iter().enumerate() {
            let mut descriptor = segment.descriptor;
            descriptor.buffer_length = segment.len as u16;
            descriptor.flags.remove(RX_STATUS_FLAGS);
            if i == 0 {
                // Software polls the SOP descriptor; the rest of the chain stays marked owned.
                descriptor.flags.remove(RxFlags::OWNER);
                descriptor.flags.insert(RxFlags::SOP);
                descriptor.flags.set(RxFlags::PASS_CRC, frame.has_fcs);
                descriptor.packet_length = frame.data.len() as u16;
                descriptor.from_port = RX_PORT;
                descriptor.pkt_err = 0;
            }
            if i == last {
                descriptor.flags.insert(RxFlags::EOP | RxFlags::EOQ);
            }
            descriptor.encode_partial(&mut self.cppi_ram)?;
        }

        let rx = self.channels.rx_mut(channel);
        rx.current = plan.next;
        rx.completion = first.buffer_pointer;
        Ok(())
    }

    fn record_rx_failure(&mut self, channel: usize, err: &CpswError) {
        match err {
            CpswError::Overrun { .. } => {
                self.stats.rx_overruns += 1;
                self.latch_rx_error(channel, RX_ERR_CODE_NOT_OWNED);
            }
            CpswError::RingExhausted { .. } => {
                self.stats.rx_overruns += 1;
                self.latch_rx_error(channel, RX_ERR_CODE_NO_DESCRIPTOR);
            }
            _ => self.stats.rx_errors += 1,
        }
        warn!(channel, %err, "rx frame dropped");
    }
}
