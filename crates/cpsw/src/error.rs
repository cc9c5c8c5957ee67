use memory::GuestMemoryError;
use thiserror::Error;

/// Why a descriptor chain was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainFault {
    /// The walk visited more descriptors than the configured bound.
    #[error("descriptor walk exceeded {limit} steps")]
    WalkLimit { limit: usize },
    /// The start-of-packet descriptor advertises a zero packet length.
    #[error("start-of-packet descriptor has zero length")]
    EmptyPacket,
    /// A descriptor of a Tx chain is not owned by the DMA engine.
    #[error("descriptor 0x{address:08x} is not owned by the DMA engine")]
    NotOwned { address: u32 },
    /// The chain ended (next pointer 0 with an idle head) before the packet length was reached.
    #[error("descriptor chain ended {missing} bytes short of the packet length")]
    Truncated { missing: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpswError {
    /// A descriptor or buffer address lies outside its backing store.
    #[error("out of range: {0}")]
    OutOfRange(#[from] GuestMemoryError),

    /// A receive descriptor needed for the frame is still owned by software.
    #[error("rx overrun on channel {channel}: descriptor 0x{address:08x} not owned by DMA")]
    Overrun { channel: usize, address: u32 },

    /// The receive ring ran out of descriptors before the frame fit.
    #[error("rx ring exhausted on channel {channel}")]
    RingExhausted { channel: usize },

    /// A malformed descriptor chain.
    #[error("protocol error on channel {channel}: {fault}")]
    ProtocolError { channel: usize, fault: ChainFault },

    /// A timestamp event register was read while the event queue was empty.
    #[error("timestamp event read with empty queue")]
    EmptyQueueRead,

    /// A frame arrived while receive DMA is disabled.
    #[error("rx frame dropped: receive is disabled")]
    RxDisabled,

    /// The pending receive queue is at capacity.
    #[error("rx frame dropped: pending queue full ({capacity} frames)")]
    QueueFull { capacity: usize },

    /// The frame cannot be described by an 11-bit packet length, or is empty.
    #[error("frame length {len} is not representable (max {max})")]
    FrameLength { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, CpswError>;
