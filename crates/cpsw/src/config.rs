use memory::GuestMemoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::CHANNEL_COUNT;
use crate::frame::ETHERTYPE_PTP;
use crate::regs::{CPPI_RAM_BUS_BASE, CPPI_RAM_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be a channel number below {CHANNEL_COUNT}, got {value}")]
    BadChannel { field: &'static str, value: usize },
    #[error("{field} must be non-zero")]
    Zero { field: &'static str },
    #[error("CPPI RAM at 0x{base:08x} with size 0x{size:x} does not fit in a 32-bit bus")]
    CppiRamOverflow { base: u32, size: u32 },
    #[error(transparent)]
    Memory(#[from] GuestMemoryError),
}

/// Static configuration of a [`crate::CpswDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CpswConfig {
    /// Bus address descriptor pointers use for the first byte of CPPI RAM.
    pub cppi_ram_base: u32,
    pub cppi_ram_size: u32,
    /// Frames that may wait for an armed receive channel before new arrivals are dropped.
    pub max_pending_rx_frames: usize,
    /// Upper bound on descriptors visited by a single fill or drain.
    pub max_descriptor_walk: usize,
    /// Transmitted frames held for the pump before new ones are dropped.
    pub max_tx_queue_frames: usize,
    pub ptp_ethertype: u16,
    /// Receive channel for PTP frames.
    pub ptp_rx_channel: usize,
    /// Receive channel for everything else.
    pub default_rx_channel: usize,
}

impl Default for CpswConfig {
    fn default() -> Self {
        Self {
            cppi_ram_base: CPPI_RAM_BUS_BASE,
            cppi_ram_size: CPPI_RAM_SIZE,
            max_pending_rx_frames: 256,
            max_descriptor_walk: 1024,
            max_tx_queue_frames: 256,
            ptp_ethertype: ETHERTYPE_PTP,
            ptp_rx_channel: 0,
            default_rx_channel: 1,
        }
    }
}

impl CpswConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("ptp_rx_channel", self.ptp_rx_channel),
            ("default_rx_channel", self.default_rx_channel),
        ] {
            if value >= CHANNEL_COUNT {
                return Err(ConfigError::BadChannel { field, value });
            }
        }
        for (field, value) in [
            ("cppi_ram_size", self.cppi_ram_size as usize),
            ("max_pending_rx_frames", self.max_pending_rx_frames),
            ("max_descriptor_walk", self.max_descriptor_walk),
            ("max_tx_queue_frames", self.max_tx_queue_frames),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.cppi_ram_base.checked_add(self.cppi_ram_size).is_none() {
            return Err(ConfigError::CppiRamOverflow {
                base: self.cppi_ram_base,
                size: self.cppi_ram_size,
            });
        }
        Ok(())
    }
}
