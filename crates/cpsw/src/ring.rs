//! Descriptor ring traversal.
//!
//! Both directions walk the whole chain a frame needs before anything is committed, so a
//! failure part way through never leaves a half-written frame or a half-returned chain behind.

use memory::GuestMemory;

use crate::descriptor::{CppiRam, RxDescriptor, TxDescriptor};
use crate::error::{ChainFault, CpswError, Result};

/// Resolves a descriptor's next pointer. Zero wraps to the channel head; a zero head as well
/// means the ring has nothing more to offer.
pub fn next_descriptor(next: u32, head: u32) -> Option<u32> {
    match (next, head) {
        (0, 0) => None,
        (0, head) => Some(head),
        (next, _) => Some(next),
    }
}

/// One receive descriptor and the slice of the frame that lands in its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxSegment {
    pub descriptor: RxDescriptor,
    /// Offset of the first byte within the frame.
    pub frame_offset: usize,
    pub len: usize,
}

/// Where a frame will be written, computed before any byte moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFillPlan {
    pub segments: Vec<RxSegment>,
    /// Descriptor the following fill starts at.
    pub next: Option<u32>,
}

/// Walks an Rx ring from `start` and maps `frame_len` bytes onto owned descriptors.
///
/// Fails with [`CpswError::Overrun`] when a needed descriptor still belongs to software, and with
/// [`CpswError::RingExhausted`] when the ring runs out (end of list with an idle head, a cycle
/// back onto a descriptor this fill already uses, or more than `max_walk` descriptors).
pub fn plan_rx_fill(
    ram: &CppiRam,
    mem: &dyn GuestMemory,
    channel: usize,
    start: u32,
    head: u32,
    frame_len: usize,
    max_walk: usize,
) -> Result<RxFillPlan> {
    let mut segments: Vec<RxSegment> = Vec::new();
    let mut cursor = start;
    let mut written = 0usize;

    loop {
        if segments.len() >= max_walk
            || segments.iter().any(|seg| seg.descriptor.address == cursor)
        {
            return Err(CpswError::RingExhausted { channel });
        }

        let descriptor = RxDescriptor::decode(ram, cursor)?;
        if !descriptor.is_owned() {
            return Err(CpswError::Overrun {
                channel,
                address: cursor,
            });
        }

        let len = usize::from(descriptor.buffer_length).min(frame_len - written);
        mem.check_range(descriptor.data_address(), len)?;
        segments.push(RxSegment {
            descriptor,
            frame_offset: written,
            len,
        });
        written += len;

        let next = next_descriptor(descriptor.next, head);
        if written == frame_len {
            return Ok(RxFillPlan { segments, next });
        }
        cursor = next.ok_or(CpswError::RingExhausted { channel })?;
    }
}

/// A transmit frame gathered from its descriptor chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxGather {
    /// Every descriptor that contributed, start of packet first.
    pub descriptors: Vec<TxDescriptor>,
    pub frame: Vec<u8>,
}

impl TxGather {
    pub fn first(&self) -> Option<&TxDescriptor> {
        self.descriptors.first()
    }
}

/// Collects one frame starting at `head`.
///
/// The start-of-packet descriptor's packet length says how many bytes to take; each descriptor
/// contributes at most its buffer length. Reads only: neither ring nor guest memory is modified.
pub fn gather_tx_frame(
    ram: &CppiRam,
    mem: &dyn GuestMemory,
    channel: usize,
    head: u32,
    max_walk: usize,
) -> Result<TxGather> {
    let fault = |fault| CpswError::ProtocolError { channel, fault };

    let first = TxDescriptor::decode(ram, head)?;
    if !first.is_owned() {
        return Err(fault(ChainFault::NotOwned { address: head }));
    }
    let packet_len = usize::from(first.packet_length);
    if packet_len == 0 {
        return Err(fault(ChainFault::EmptyPacket));
    }

    let mut descriptors = vec![first];
    let mut frame = Vec::with_capacity(packet_len);
    let mut descriptor = first;

    loop {
        let len = usize::from(descriptor.buffer_length).min(packet_len - frame.len());
        let start = frame.len();
        frame.resize(start + len, 0);
        mem.read_into(descriptor.data_address(), &mut frame[start..])?;

        if frame.len() == packet_len {
            return Ok(TxGather { descriptors, frame });
        }

        let missing = packet_len - frame.len();
        let Some(next) = next_descriptor(descriptor.next, head) else {
            return Err(fault(ChainFault::Truncated { missing }));
        };
        if descriptors.iter().any(|d| d.address == next) {
            return Err(fault(ChainFault::Truncated { missing }));
        }
        if descriptors.len() >= max_walk {
            return Err(fault(ChainFault::WalkLimit { limit: max_walk }));
        }

        descriptor = TxDescriptor::decode(ram, next)?;
        if !descriptor.is_owned() {
            return Err(fault(ChainFault::NotOwned { address: next }));
        }
        descriptors.push(descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::{DenseMemory, SparseMemory};

    const BASE: u32 = 0x4848_6000;
    const OWNER: u32 = 1 << 29;
    const SOP: u32 = 1 << 31;

    fn ram() -> CppiRam {
        CppiRam::new(u64::from(BASE), DenseMemory::new(0x2000).unwrap())
    }

    fn put(ram: &mut CppiRam, addr: u32, words: [u32; 4]) {
        for (i, w) in words.iter().enumerate() {
            ram.write_u32_le(u64::from(addr) + 4 * i as u64, *w).unwrap();
        }
    }

    #[test]
    fn zero_next_wraps_to_head() {
        assert_eq!(next_descriptor(0, BASE), Some(BASE));
        assert_eq!(next_descriptor(BASE + 0x10, BASE), Some(BASE + 0x10));
        assert_eq!(next_descriptor(0, 0), None);
    }

    #[test]
    fn rx_plan_splits_across_descriptors() {
        let mut ram = ram();
        let mem = SparseMemory::new(1 << 20).unwrap();
        put(&mut ram, BASE, [BASE + 0x10, 0x1000, 1024, OWNER]);
        put(&mut ram, BASE + 0x10, [0, 0x2000, 600, OWNER]);

        let plan = plan_rx_fill(&ram, &mem, 1, BASE, BASE, 1514, 16).unwrap();
        assert_eq!(plan.segments.len(), 2);
        assert_eq!(plan.segments[0].len, 1024);
        assert_eq!(plan.segments[1].frame_offset, 1024);
        assert_eq!(plan.segments[1].len, 490);
        assert_eq!(plan.next, Some(BASE));
    }

    #[test]
    fn rx_plan_stops_at_software_owned_descriptor() {
        let mut ram = ram();
        let mem = SparseMemory::new(1 << 20).unwrap();
        put(&mut ram, BASE, [BASE + 0x10, 0x1000, 64, OWNER]);
        put(&mut ram, BASE + 0x10, [0, 0x2000, 64, 0]);

        assert_eq!(
            plan_rx_fill(&ram, &mem, 1, BASE, BASE, 100, 16),
            Err(CpswError::Overrun {
                channel: 1,
                address: BASE + 0x10
            })
        );
    }

    #[test]
    fn rx_plan_detects_a_ring_too_small_for_the_frame() {
        let mut ram = ram();
        let mem = SparseMemory::new(1 << 20).unwrap();
        put(&mut ram, BASE, [0, 0x1000, 64, OWNER]);

        assert_eq!(
            plan_rx_fill(&ram, &mem, 0, BASE, BASE, 100, 16),
            Err(CpswError::RingExhausted { channel: 0 })
        );
        // Same chain, but the head has been cleared: end of list.
        assert_eq!(
            plan_rx_fill(&ram, &mem, 0, BASE, 0, 100, 16),
            Err(CpswError::RingExhausted { channel: 0 })
        );
    }

    #[test]
    fn rx_plan_rejects_buffers_outside_system_memory() {
        let mut ram = ram();
        let mem = SparseMemory::new(0x1000).unwrap();
        put(&mut ram, BASE, [0, 0x0F00, 1024, OWNER]);

        assert!(matches!(
            plan_rx_fill(&ram, &mem, 1, BASE, BASE, 512, 16),
            Err(CpswError::OutOfRange(_))
        ));
    }

    #[test]
    fn tx_gather_follows_the_chain() {
        let mut ram = ram();
        let mut mem = SparseMemory::new(1 << 20).unwrap();
        mem.write_from(0x1000, &[1u8; 8]).unwrap();
        mem.write_from(0x2004, &[2u8; 8]).unwrap();
        put(&mut ram, BASE, [BASE + 0x10, 0x1000, 8, OWNER | SOP | 12]);
        put(&mut ram, BASE + 0x10, [0, 0x2000, 8 | (4 << 16), OWNER]);

        let gathered = gather_tx_frame(&ram, &mem, 0, BASE, 16).unwrap();
        assert_eq!(gathered.descriptors.len(), 2);
        assert_eq!(gathered.frame, [[1u8; 8].as_slice(), &[2u8; 4]].concat());
    }

    #[test]
    fn tx_gather_reports_malformed_chains() {
        let mut ram = ram();
        let mem = SparseMemory::new(1 << 20).unwrap();

        put(&mut ram, BASE, [0, 0x1000, 8, OWNER | SOP]);
        assert_eq!(
            gather_tx_frame(&ram, &mem, 2, BASE, 16),
            Err(CpswError::ProtocolError {
                channel: 2,
                fault: ChainFault::EmptyPacket
            })
        );

        put(&mut ram, BASE, [0, 0x1000, 8, SOP | 8]);
        assert_eq!(
            gather_tx_frame(&ram, &mem, 2, BASE, 16),
            Err(CpswError::ProtocolError {
                channel: 2,
                fault: ChainFault::NotOwned { address: BASE }
            })
        );

        put(&mut ram, BASE, [0, 0x1000, 8, OWNER | SOP | 20]);
        assert_eq!(
            gather_tx_frame(&ram, &mem, 2, BASE, 16),
            Err(CpswError::ProtocolError {
                channel: 2,
                fault: ChainFault::Truncated { missing: 12 }
            })
        );
    }

    #[test]
    fn tx_gather_is_bounded() {
        let mut ram = ram();
        let mem = SparseMemory::new(1 << 20).unwrap();
        for i in 0..8u32 {
            let addr = BASE + i * 0x10;
            let word3 = if i == 0 { OWNER | SOP | 64 } else { OWNER };
            put(&mut ram, addr, [addr + 0x10, 0x1000, 1, word3]);
        }

        assert_eq!(
            gather_tx_frame(&ram, &mem, 0, BASE, 4),
            Err(CpswError::ProtocolError {
                channel: 0,
                fault: ChainFault::WalkLimit { limit: 4 }
            })
        );
    }
}
