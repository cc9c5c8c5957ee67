#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use cpsw::regs::{CPDMA_RX_CONTROL, CPDMA_TX_CONTROL, CPPI_RAM_BUS_BASE, CPPI_RAM_OFFSET};
use cpsw::{CpswConfig, CpswDevice, IrqRecorder};
use memory::SparseMemory;

pub const BASE: u32 = CPPI_RAM_BUS_BASE;

pub const PASS_CRC: u32 = 1 << 26;
pub const EOQ: u32 = 1 << 28;
pub const OWNER: u32 = 1 << 29;
pub const EOP: u32 = 1 << 30;
pub const SOP: u32 = 1 << 31;

pub struct Harness {
    pub dev: CpswDevice,
    pub mem: SparseMemory,
    pub irq: Arc<Mutex<IrqRecorder>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CpswConfig::default())
    }

    pub fn with_config(config: CpswConfig) -> Self {
        init_tracing();
        let irq = Arc::new(Mutex::new(IrqRecorder::default()));
        let dev = CpswDevice::new(config).unwrap().with_irq(irq.clone());
        Self {
            dev,
            mem: SparseMemory::new(0x10_0000).unwrap(),
            irq,
        }
    }

    /// Device with both DMA directions enabled.
    pub fn enabled() -> Self {
        let mut h = Self::new();
        h.write_reg(CPDMA_TX_CONTROL, 1);
        h.write_reg(CPDMA_RX_CONTROL, 1);
        h
    }

    pub fn write_reg(&mut self, offset: u32, value: u32) {
        self.dev
            .mmio_write(u64::from(offset), 4, u64::from(value), &mut self.mem);
    }

    pub fn read_reg(&mut self, offset: u32) -> u32 {
        self.dev.mmio_read(u64::from(offset), 4, &mut self.mem) as u32
    }

    /// Writes a descriptor through the bus, the way a driver would.
    pub fn write_desc(&mut self, addr: u32, words: [u32; 4]) {
        let offset = u64::from(addr - BASE + CPPI_RAM_OFFSET);
        for (i, word) in words.iter().enumerate() {
            self.dev
                .mmio_write(offset + 4 * i as u64, 4, u64::from(*word), &mut self.mem);
        }
    }

    /// Reads a descriptor without going through the bus, so no pending frame is retried.
    pub fn read_desc(&self, addr: u32) -> [u32; 4] {
        let ram = self.dev.cppi_ram();
        std::array::from_fn(|i| ram.read_u32_le(u64::from(addr) + 4 * i as u64).unwrap())
    }

    pub fn write_mem(&mut self, addr: u64, bytes: &[u8]) {
        use memory::GuestMemory;
        self.mem.write_from(addr, bytes).unwrap();
    }

    pub fn read_mem(&self, addr: u64, len: usize) -> Vec<u8> {
        use memory::GuestMemory;
        self.mem.read_vec(addr, len).unwrap()
    }

    pub fn irq_pulses(&self) -> usize {
        self.irq.lock().unwrap().pulses()
    }
}

/// Receive descriptor owned by the DMA engine with an empty buffer of `len` bytes.
pub fn rx_desc(next: u32, buffer: u32, len: u16) -> [u32; 4] {
    [next, buffer, u32::from(len), OWNER]
}

/// Start-of-packet transmit descriptor.
pub fn tx_sop(next: u32, buffer: u32, buffer_len: u16, packet_len: u16, flags: u32) -> [u32; 4] {
    [
        next,
        buffer,
        u32::from(buffer_len),
        OWNER | SOP | flags | u32::from(packet_len),
    ]
}

/// Continuation transmit descriptor.
pub fn tx_more(next: u32, buffer: u32, buffer_len: u16, flags: u32) -> [u32; 4] {
    [next, buffer, u32::from(buffer_len), OWNER | flags]
}

pub fn eth_frame(ethertype: u16, len: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(len);
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend((frame.len()..len).map(|i| i as u8));
    frame
}

/// PTP event frame with the given `messageType` and `sequenceId`.
pub fn ptp_frame(message_type: u8, sequence_id: u16, len: usize) -> Vec<u8> {
    let mut frame = eth_frame(0x88F7, len.max(46));
    frame[14] = message_type;
    frame[44..46].copy_from_slice(&sequence_id.to_be_bytes());
    frame
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
