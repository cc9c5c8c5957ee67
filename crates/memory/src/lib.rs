//! Byte-addressable memory backends shared by the device models.
//!
//! Devices receive system memory as `&mut dyn GuestMemory` for DMA and keep their own private RAM
//! (e.g. descriptor memory) in a [`GuestMemoryWindow`] so it can be addressed by bus address.
#![forbid(unsafe_code)]

mod phys;
mod window;

pub use phys::{DenseMemory, GuestMemory, GuestMemoryError, GuestMemoryResult, SparseMemory};
pub use window::GuestMemoryWindow;
