//! CPPI buffer descriptors.
//!
//! Both directions share one 16-byte slot of four little-endian words:
//!
//! | word | contents                                          |
//! |------|---------------------------------------------------|
//! | 0    | next descriptor pointer (bus address, 0 = end)    |
//! | 1    | buffer pointer                                    |
//! | 2    | buffer length / buffer offset                     |
//! | 3    | packet length, port and status flags              |
//!
//! The engine only ever writes word 3 back for Tx, and words 2 and 3 for Rx. Bits that no field
//! covers are carried through untouched.

use bitflags::bitflags;
use memory::{DenseMemory, GuestMemoryWindow};

use crate::error::Result;

/// Device-private descriptor memory, addressed by bus address.
pub type CppiRam = GuestMemoryWindow<DenseMemory>;

pub const DESCRIPTOR_LEN: usize = 16;

/// Largest value the 11-bit packet/buffer length fields can hold.
pub const MAX_PACKET_LEN: usize = 0x7FF;

const LEN_MASK: u32 = 0x7FF;

const TX_WORD2_LEN_MASK: u32 = 0xFFFF;
const TX_TO_PORT_SHIFT: u32 = 16;
const TX_TO_PORT_MASK: u32 = 0x3;

const RX_OFFSET_SHIFT: u32 = 16;
const RX_FROM_PORT_SHIFT: u32 = 16;
const RX_FROM_PORT_MASK: u32 = 0x7;
const RX_PKT_ERR_SHIFT: u32 = 20;
const RX_PKT_ERR_MASK: u32 = 0x3;

bitflags! {
    /// Word 3 status bits of a transmit descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxFlags: u32 {
        const TO_PORT_EN = 1 << 20;
        const PASS_CRC = 1 << 26;
        const TD_COMPLETE = 1 << 27;
        const EOQ = 1 << 28;
        const OWNER = 1 << 29;
        const EOP = 1 << 30;
        const SOP = 1 << 31;
    }
}

bitflags! {
    /// Word 3 status bits of a receive descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RxFlags: u32 {
        const VLAN_ENCAP = 1 << 19;
        const OVERRUN = 1 << 22;
        const MAC_CTL = 1 << 23;
        const SHORT = 1 << 24;
        const LONG = 1 << 25;
        const PASS_CRC = 1 << 26;
        const TD_COMPLETE = 1 << 27;
        const EOQ = 1 << 28;
        const OWNER = 1 << 29;
        const EOP = 1 << 30;
        const SOP = 1 << 31;
    }
}

fn read_words(ram: &CppiRam, address: u32) -> Result<[u32; 4]> {
    let mut raw = [0u8; DESCRIPTOR_LEN];
    ram.read_into(u64::from(address), &mut raw)?;
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}

/// Transmit descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxDescriptor {
    /// Bus address the descriptor was decoded from.
    pub address: u32,
    pub next: u32,
    pub buffer_pointer: u32,
    pub buffer_offset: u16,
    pub buffer_length: u16,
    pub packet_length: u16,
    pub to_port: u8,
    pub flags: TxFlags,
    reserved: u32,
}

impl TxDescriptor {
    const WORD3_FIELDS: u32 = LEN_MASK | (TX_TO_PORT_MASK << TX_TO_PORT_SHIFT);

    pub fn from_words(address: u32, words: [u32; 4]) -> Self {
        let w3 = words[3];
        Self {
            address,
            next: words[0],
            buffer_pointer: words[1],
            buffer_length: (words[2] & TX_WORD2_LEN_MASK) as u16,
            buffer_offset: (words[2] >> 16) as u16,
            packet_length: (w3 & LEN_MASK) as u16,
            to_port: ((w3 >> TX_TO_PORT_SHIFT) & TX_TO_PORT_MASK) as u8,
            flags: TxFlags::from_bits_truncate(w3),
            reserved: w3 & !(Self::WORD3_FIELDS | TxFlags::all().bits()),
        }
    }

    pub fn to_words(&self) -> [u32; 4] {
        [
            self.next,
            self.buffer_pointer,
            u32::from(self.buffer_length) | (u32::from(self.buffer_offset) << 16),
            self.word3(),
        ]
    }

    fn word3(&self) -> u32 {
        (u32::from(self.packet_length) & LEN_MASK)
            | ((u32::from(self.to_port) & TX_TO_PORT_MASK) << TX_TO_PORT_SHIFT)
            | self.flags.bits()
            | self.reserved
    }

    /// Reads the descriptor at bus address `address`.
    pub fn decode(ram: &CppiRam, address: u32) -> Result<Self> {
        Ok(Self::from_words(address, read_words(ram, address)?))
    }

    /// Writes back word 3, the only word the engine owns on transmit.
    pub fn encode_partial(&self, ram: &mut CppiRam) -> Result<()> {
        ram.write_u32_le(u64::from(self.address) + 12, self.word3())?;
        Ok(())
    }

    /// Bus address of the first payload byte.
    pub fn data_address(&self) -> u64 {
        u64::from(self.buffer_pointer) + u64::from(self.buffer_offset)
    }

    pub fn is_owned(&self) -> bool {
        self.flags.contains(TxFlags::OWNER)
    }

    pub fn sop(&self) -> bool {
        self.flags.contains(TxFlags::SOP)
    }

    pub fn eop(&self) -> bool {
        self.flags.contains(TxFlags::EOP)
    }

    pub fn eoq(&self) -> bool {
        self.flags.contains(TxFlags::EOQ)
    }

    pub fn pass_crc(&self) -> bool {
        self.flags.contains(TxFlags::PASS_CRC)
    }
}

/// Receive descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxDescriptor {
    /// Bus address the descriptor was decoded from.
    pub address: u32,
    pub next: u32,
    pub buffer_pointer: u32,
    pub buffer_offset: u16,
    pub buffer_length: u16,
    pub packet_length: u16,
    pub from_port: u8,
    pub pkt_err: u8,
    pub flags: RxFlags,
    reserved_w2: u32,
    reserved_w3: u32,
}

impl RxDescriptor {
    const WORD2_FIELDS: u32 = LEN_MASK | (LEN_MASK << RX_OFFSET_SHIFT);
    const WORD3_FIELDS: u32 = LEN_MASK
        | (RX_FROM_PORT_MASK << RX_FROM_PORT_SHIFT)
        | (RX_PKT_ERR_MASK << RX_PKT_ERR_SHIFT);

    pub fn from_words(address: u32, words: [u32; 4]) -> Self {
        let (w2, w3) = (words[2], words[3]);
        Self {
            address,
            next: words[0],
            buffer_pointer: words[1],
            buffer_length: (w2 & LEN_MASK) as u16,
            buffer_offset: ((w2 >> RX_OFFSET_SHIFT) & LEN_MASK) as u16,
            packet_length: (w3 & LEN_MASK) as u16,
            from_port: ((w3 >> RX_FROM_PORT_SHIFT) & RX_FROM_PORT_MASK) as u8,
            pkt_err: ((w3 >> RX_PKT_ERR_SHIFT) & RX_PKT_ERR_MASK) as u8,
            flags: RxFlags::from_bits_truncate(w3),
            reserved_w2: w2 & !Self::WORD2_FIELDS,
            reserved_w3: w3 & !(Self::WORD3_FIELDS | RxFlags::all().bits()),
        }
    }

    pub fn to_words(&self) -> [u32; 4] {
        [self.next, self.buffer_pointer, self.word2(), self.word3()]
    }

    fn word2(&self) -> u32 {
        (u32::from(self.buffer_length) & LEN_MASK)
            | ((u32::from(self.buffer_offset) & LEN_MASK) << RX_OFFSET_SHIFT)
            | self.reserved_w2
    }

    fn word3(&self) -> u32 {
        (u32::from(self.packet_length) & LEN_MASK)
            | ((u32::from(self.from_port) & RX_FROM_PORT_MASK) << RX_FROM_PORT_SHIFT)
            | ((u32::from(self.pkt_err) & RX_PKT_ERR_MASK) << RX_PKT_ERR_SHIFT)
            | self.flags.bits()
            | self.reserved_w3
    }

    /// Reads the descriptor at bus address `address`.
    pub fn decode(ram: &CppiRam, address: u32) -> Result<Self> {
        Ok(Self::from_words(address, read_words(ram, address)?))
    }

    /// Writes back words 2 and 3. Next and buffer pointers are never rewritten.
    pub fn encode_partial(&self, ram: &mut CppiRam) -> Result<()> {
        let base = u64::from(self.address);
        // Check the whole slot first so a failure cannot leave word 2 updated without word 3.
        ram.translate(base, DESCRIPTOR_LEN)?;
        ram.write_u32_le(base + 8, self.word2())?;
        ram.write_u32_le(base + 12, self.word3())?;
        Ok(())
    }

    /// Bus address of the first payload byte.
    pub fn data_address(&self) -> u64 {
        u64::from(self.buffer_pointer) + u64::from(self.buffer_offset)
    }

    pub fn is_owned(&self) -> bool {
        self.flags.contains(RxFlags::OWNER)
    }

    pub fn sop(&self) -> bool {
        self.flags.contains(RxFlags::SOP)
    }

    pub fn eop(&self) -> bool {
        self.flags.contains(RxFlags::EOP)
    }

    pub fn eoq(&self) -> bool {
        self.flags.contains(RxFlags::EOQ)
    }

    pub fn pass_crc(&self) -> bool {
        self.flags.contains(RxFlags::PASS_CRC)
    }
}
