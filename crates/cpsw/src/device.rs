use std::collections::VecDeque;
use std::fmt;

use memory::{DenseMemory, GuestMemory, GuestMemoryError};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::ale::AleTable;
use crate::channel::ChannelTable;
use crate::config::{ConfigError, CpswConfig};
use crate::cpts::{CptsClock, EventMetadata, EventQueue, FrozenClock};
use crate::descriptor::CppiRam;
use crate::error::{CpswError, Result};
use crate::irq::IrqLine;
use crate::regs::*;
use crate::rx::RxInjector;

const REG_WORDS: usize = (CPPI_RAM_OFFSET / 4) as usize;

/// Counters kept by the device. Never reset except by [`CpswDevice::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpswStats {
    /// Frames written into a receive ring.
    pub rx_frames: u64,
    /// Frames dropped before reaching a ring: receive disabled, pending queue full, or bad length.
    pub rx_dropped: u64,
    /// Frames dropped because the ring had no owned descriptor for them.
    pub rx_overruns: u64,
    /// Frames dropped because a descriptor or buffer lay outside memory.
    pub rx_errors: u64,
    pub tx_frames: u64,
    /// Transmit triggers rejected because of a malformed chain.
    pub tx_errors: u64,
    /// Transmitted frames dropped because the host never collected the egress queue.
    pub tx_dropped: u64,
    pub cpts_events: u64,
}

/// Which state RAM bank a register offset falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateRam {
    TxHead,
    RxHead,
    TxCompletion,
    RxCompletion,
}

fn decode_state_ram(offset: u32) -> Option<(StateRam, usize)> {
    if !(TX_HDP..STATE_RAM_END).contains(&offset) {
        return None;
    }
    let rel = offset - TX_HDP;
    let bank = match rel / 0x20 {
        0 => StateRam::TxHead,
        1 => StateRam::RxHead,
        2 => StateRam::TxCompletion,
        _ => StateRam::RxCompletion,
    };
    Some((bank, ((rel % 0x20) / 4) as usize))
}

fn lane_mask(size: usize) -> u64 {
    match size {
        1 => 0xFF,
        2 => 0xFFFF,
        4 => 0xFFFF_FFFF,
        _ => u64::MAX,
    }
}

/// The CPSW subsystem: register file, DMA engine, address table and timestamp unit.
pub struct CpswDevice {
    pub(crate) config: CpswConfig,
    regs: Box<[u32]>,
    pub(crate) channels: ChannelTable,
    ale: AleTable,
    cpts: EventQueue,
    pub(crate) cppi_ram: CppiRam,
    pub(crate) rx_queue: RxInjector,
    pub(crate) tx_out: VecDeque<Vec<u8>>,
    irq: Box<dyn IrqLine>,
    clock: Box<dyn CptsClock>,
    pub(crate) stats: CpswStats,
}

impl fmt::Debug for CpswDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpswDevice")
            .field("config", &self.config)
            .field("channels", &self.channels)
            .field("cpts_events", &self.cpts.len())
            .field("rx_pending", &self.rx_queue.pending())
            .field("tx_out", &self.tx_out.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl CpswDevice {
    pub fn new(config: CpswConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let cppi_ram = CppiRam::new(
            u64::from(config.cppi_ram_base),
            DenseMemory::new(u64::from(config.cppi_ram_size))?,
        );
        let rx_queue = RxInjector::new(config.max_pending_rx_frames);
        Ok(Self {
            config,
            regs: vec![0u32; REG_WORDS].into_boxed_slice(),
            channels: ChannelTable::new(),
            ale: AleTable::new(),
            cpts: EventQueue::new(),
            cppi_ram,
            rx_queue,
            tx_out: VecDeque::new(),
            irq: Box::new(()),
            clock: Box::new(FrozenClock),
            stats: CpswStats::default(),
        })
    }

    /// Connects the subsystem interrupt output.
    pub fn with_irq(mut self, irq: impl IrqLine + 'static) -> Self {
        self.irq = Box::new(irq);
        self
    }

    /// Sets the counter CPTS events are stamped with.
    pub fn with_clock(mut self, clock: impl CptsClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &CpswConfig {
        &self.config
    }

    pub fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    pub fn ale(&self) -> &AleTable {
        &self.ale
    }

    /// Handle to the timestamp event FIFO.
    pub fn cpts(&self) -> &EventQueue {
        &self.cpts
    }

    pub fn cppi_ram(&self) -> &CppiRam {
        &self.cppi_ram
    }

    pub fn cppi_ram_mut(&mut self) -> &mut CppiRam {
        &mut self.cppi_ram
    }

    pub fn stats(&self) -> CpswStats {
        let mut stats = self.stats;
        stats.rx_dropped += self.rx_queue.dropped();
        stats
    }

    /// Next frame transmitted by the guest, oldest first.
    pub fn pop_tx_frame(&mut self) -> Option<Vec<u8>> {
        self.tx_out.pop_front()
    }

    pub fn tx_queue_len(&self) -> usize {
        self.tx_out.len()
    }

    /// Returns the device to its power-on state. Connected IRQ line and clock are kept.
    pub fn reset(&mut self) {
        self.regs.fill(0);
        self.channels.reset();
        self.ale = AleTable::new();
        self.cpts.clear();
        self.cppi_ram.inner_mut().clear();
        self.rx_queue.reset();
        self.tx_out.clear();
        self.stats = CpswStats::default();
        self.irq.set_level(false);
    }

    /// CPDMA soft reset. Statistics survive; only a full reset clears them.
    fn reset_dma(&mut self) {
        self.channels.reset();
        self.rx_queue.clear();
        for offset in [CPDMA_TX_CONTROL, CPDMA_RX_CONTROL, CPDMA_DMASTATUS] {
            self.set_reg(offset, 0);
        }
    }

    pub(crate) fn reg(&self, offset: u32) -> u32 {
        self.regs
            .get((offset / 4) as usize)
            .copied()
            .unwrap_or(0)
    }

    fn set_reg(&mut self, offset: u32, value: u32) {
        if let Some(slot) = self.regs.get_mut((offset / 4) as usize) {
            *slot = value;
        }
    }

    pub(crate) fn rx_enabled(&self) -> bool {
        self.reg(CPDMA_RX_CONTROL) & CPDMA_CONTROL_EN != 0
    }

    pub(crate) fn timestamps_enabled(&self) -> bool {
        self.reg(CPTS_INT_ENABLE) & CPTS_TS_PEND != 0
    }

    /// Programmable timestamp EtherTypes (LTYPE1, LTYPE2).
    pub(crate) fn ts_ltypes(&self) -> [u16; 2] {
        let value = self.reg(CPSW_TS_LTYPE);
        [(value & 0xFFFF) as u16, (value >> 16) as u16]
    }

    /// Queues a CPTS event and announces it on the interrupt line.
    pub(crate) fn push_timestamp(&mut self, metadata: EventMetadata) {
        let timestamp = self.clock.now() as u32;
        trace!(?metadata, timestamp, "CPTS event");
        self.cpts.push(metadata.to_word(), timestamp);
        self.set_reg(WR_C0_MISC_STAT, WR_MISC_EVNT_PEND);
        self.stats.cpts_events += 1;
        self.irq.pulse();
    }

    /// Records a receive fault in `CPDMA_DMASTATUS`.
    pub(crate) fn latch_rx_error(&mut self, channel: usize, code: u32) {
        let value = ((code & 0xF) << DMASTATUS_RX_ERR_CODE_SHIFT)
            | ((channel as u32 & 0x7) << DMASTATUS_RX_ERR_CH_SHIFT);
        self.set_reg(CPDMA_DMASTATUS, value);
    }

    fn register_out_of_range(offset: u32) -> CpswError {
        CpswError::OutOfRange(GuestMemoryError::OutOfRange {
            paddr: u64::from(offset),
            len: 4,
            size: u64::from(CPPI_RAM_OFFSET),
        })
    }

    /// Reads the 32-bit register at `offset` (dword aligned, below the CPPI RAM).
    pub fn read_register(&self, offset: u32) -> Result<u32> {
        if offset % 4 != 0 || offset >= CPPI_RAM_OFFSET {
            return Err(Self::register_out_of_range(offset));
        }
        if is_soft_reset(offset) {
            return Ok(0);
        }
        if let Some((bank, channel)) = decode_state_ram(offset) {
            return Ok(match bank {
                StateRam::TxHead => self.channels.tx(channel).head,
                StateRam::RxHead => self.channels.rx(channel).head,
                StateRam::TxCompletion => self.channels.tx_completion(channel),
                StateRam::RxCompletion => self.channels.rx_completion(channel),
            });
        }

        Ok(match offset {
            CPTS_INTSTAT_RAW => u32::from(self.cpts.pending()),
            CPTS_INTSTAT_MASKED => u32::from(self.cpts.pending()) & self.reg(CPTS_INT_ENABLE),
            CPTS_EVENT_POP => 0,
            CPTS_EVENT_LOW => self.cpts.peek_timestamp()?,
            CPTS_EVENT_HIGH => self.cpts.peek_metadata()?,
            ALE_TBLW0 => self.ale.read_word(0),
            ALE_TBLW1 => self.ale.read_word(1),
            ALE_TBLW2 => self.ale.read_word(2),
            MDIO_USERACCESS0 | MDIO_USERACCESS1 => self.reg(offset) & !MDIO_USERACCESS_DATA_MASK,
            _ => self.reg(offset),
        })
    }

    /// Writes the 32-bit register at `offset` and runs its side effects.
    ///
    /// Head pointer writes run the DMA pass they trigger before returning; the error of that
    /// pass, if any, is returned after the device state has been settled.
    pub fn write_register(
        &mut self,
        offset: u32,
        value: u32,
        mem: &mut dyn GuestMemory,
    ) -> Result<()> {
        if offset % 4 != 0 || offset >= CPPI_RAM_OFFSET {
            return Err(Self::register_out_of_range(offset));
        }
        if is_soft_reset(offset) {
            if value & SOFT_RESET_BIT != 0 {
                debug!(offset = format_args!("{offset:#x}"), "soft reset");
                if offset == CPDMA_SOFT_RESET {
                    self.reset_dma();
                }
            }
            return Ok(());
        }
        if let Some((bank, channel)) = decode_state_ram(offset) {
            return match bank {
                StateRam::TxHead => {
                    debug!(channel, head = format_args!("{value:#010x}"), "TX HDP write");
                    self.channels.set_tx_head(channel, value);
                    if value == 0 {
                        return Ok(());
                    }
                    self.transmit(channel, mem)
                }
                StateRam::RxHead => {
                    debug!(channel, head = format_args!("{value:#010x}"), "RX HDP write");
                    self.channels.set_rx_head(channel, value);
                    self.drain_pending(mem)
                }
                StateRam::TxCompletion | StateRam::RxCompletion => {
                    trace!(channel, "ignoring write to completion pointer");
                    Ok(())
                }
            };
        }

        match offset {
            CPDMA_RX_CONTROL => {
                self.set_reg(offset, value);
                let enabled = value & CPDMA_CONTROL_EN != 0;
                self.rx_queue.set_accepting(enabled);
                if enabled {
                    self.drain_pending(mem)?;
                }
            }
            CPDMA_DMASTATUS | CPTS_INTSTAT_RAW | CPTS_INTSTAT_MASKED | CPTS_EVENT_LOW
            | CPTS_EVENT_HIGH => {
                trace!(offset = format_args!("{offset:#x}"), "ignoring write to read-only register");
            }
            CPTS_EVENT_POP => {
                if value & CPTS_EVENT_POP_BIT != 0 {
                    self.cpts.pop();
                }
            }
            ALE_CONTROL => {
                if value & ALE_CONTROL_CLEAR_TABLE != 0 {
                    debug!("clearing ALE table");
                    self.ale.clear_all();
                }
                self.set_reg(offset, value & !ALE_CONTROL_CLEAR_TABLE);
            }
            ALE_TBLCTL => {
                self.set_reg(offset, value);
                self.ale.set_index(value & !ALE_TBLCTL_WRITE_RDZ);
            }
            ALE_TBLW0 => self.ale.write_word(0, value),
            ALE_TBLW1 => self.ale.write_word(1, value),
            ALE_TBLW2 => self.ale.write_word(2, value),
            MDIO_USERACCESS0 | MDIO_USERACCESS1 => {
                // No PHY answers, so the transaction completes immediately.
                self.set_reg(offset, value & !MDIO_USERACCESS_GO);
            }
            _ => self.set_reg(offset, value),
        }
        Ok(())
    }

    /// Bus read of `size` bytes at `offset` within the device window.
    ///
    /// Register reads return the addressed lane of the containing dword. Accesses outside the
    /// window, misaligned accesses and unsupported sizes read as all-ones.
    pub fn mmio_read(&mut self, offset: u64, size: usize, mem: &mut dyn GuestMemory) -> u64 {
        let mask = lane_mask(size);
        if !matches!(size, 1 | 2 | 4) || offset % size as u64 != 0 {
            warn!(offset, size, "unsupported CPSW read");
            return mask;
        }
        let Ok(offset) = u32::try_from(offset) else {
            return mask;
        };
        if offset >= REGION_SIZE {
            warn!(offset, size, "CPSW read outside the register window");
            return mask;
        }

        if offset >= CPPI_RAM_OFFSET {
            // The driver polls descriptors here; give waiting frames a chance to land first.
            self.poll(mem);
            let mut buf = [0u8; 4];
            let inner = u64::from(offset - CPPI_RAM_OFFSET);
            return match self.cppi_ram.inner().read_into(inner, &mut buf[..size]) {
                Ok(()) => u64::from(u32::from_le_bytes(buf)),
                Err(err) => {
                    warn!(%err, "CPPI RAM read outside the configured RAM");
                    mask
                }
            };
        }

        let aligned = offset & !3;
        let shift = (offset - aligned) * 8;
        let value = match self.read_register(aligned) {
            Ok(value) => value,
            Err(err) => {
                warn!(offset = format_args!("{aligned:#x}"), %err, "register read failed");
                0
            }
        };
        (u64::from(value) >> shift) & mask
    }

    /// Bus write of `size` bytes at `offset` within the device window.
    ///
    /// A byte or halfword register write is applied as a dword write with the value in its lane
    /// and every other lane zero.
    pub fn mmio_write(&mut self, offset: u64, size: usize, value: u64, mem: &mut dyn GuestMemory) {
        if !matches!(size, 1 | 2 | 4) || offset % size as u64 != 0 {
            warn!(offset, size, "unsupported CPSW write");
            return;
        }
        let Ok(offset) = u32::try_from(offset) else {
            return;
        };
        if offset >= REGION_SIZE {
            warn!(offset, size, "CPSW write outside the register window");
            return;
        }
        let value = value & lane_mask(size);

        if offset >= CPPI_RAM_OFFSET {
            let bytes = (value as u32).to_le_bytes();
            let inner = u64::from(offset - CPPI_RAM_OFFSET);
            if let Err(err) = self.cppi_ram.inner_mut().write_from(inner, &bytes[..size]) {
                warn!(%err, "CPPI RAM write outside the configured RAM");
            }
            return;
        }

        let aligned = offset & !3;
        let shift = (offset - aligned) * 8;
        let value = (value as u32) << shift;
        if let Err(err) = self.write_register(aligned, value, mem) {
            warn!(offset = format_args!("{aligned:#x}"), %err, "register write failed");
        }
    }
}
