//! CPSW/CPDMA Ethernet switch subsystem model.
//!
//! The device exposes a 16 KiB MMIO window: switch, DMA, timestamp and address-table registers in
//! the first half and the private CPPI descriptor RAM in the second. Guest software builds linked
//! lists of buffer descriptors in that RAM and arms a channel by writing its head descriptor
//! pointer:
//!
//! - Receive frames are queued through [`CpswDevice::receive_frame`] or an [`RxInjector`] and
//!   copied into the first armed descriptors of their channel.
//! - Transmit runs synchronously inside the head pointer write; the reassembled frame is queued
//!   for the host ([`CpswDevice::pop_tx_frame`]).
//!
//! PTP frames in either direction produce CPTS events, each announced with one pulse on the
//! subsystem interrupt line.
#![forbid(unsafe_code)]

pub mod ale;
pub mod channel;
pub mod config;
pub mod cpts;
pub mod descriptor;
mod device;
pub mod error;
pub mod frame;
pub mod irq;
pub mod regs;
pub mod ring;
mod rx;
mod tx;

pub use ale::{AleEntry, AleTable, ALE_ENTRY_COUNT};
pub use channel::{ChannelTable, RxChannel, TxChannel, CHANNEL_COUNT};
pub use config::{ConfigError, CpswConfig};
pub use cpts::{CptsClock, EventMetadata, EventQueue, EventType, FrozenClock, TimestampEvent};
pub use descriptor::{CppiRam, RxDescriptor, RxFlags, TxDescriptor, TxFlags, DESCRIPTOR_LEN};
pub use device::{CpswDevice, CpswStats};
pub use error::{ChainFault, CpswError, Result};
pub use frame::{FrameClass, RxFrame};
pub use irq::{IrqLine, IrqRecorder};
pub use rx::RxInjector;
