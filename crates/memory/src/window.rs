use crate::phys::{GuestMemory, GuestMemoryError, GuestMemoryResult};

/// A bus-address window over a zero-based backing store.
///
/// Device-private RAM is usually addressed two ways: by offset from the device's MMIO base when the
/// CPU pokes it, and by absolute bus address when the same memory is referenced from inside a data
/// structure (for example a DMA descriptor's next pointer). The window owns the backing store and
/// translates bus addresses in `[base, base + inner.size())` to inner offsets.
#[derive(Debug, Clone)]
pub struct GuestMemoryWindow<M> {
    base: u64,
    inner: M,
}

impl<M: GuestMemory> GuestMemoryWindow<M> {
    pub fn new(base: u64, inner: M) -> Self {
        Self { base, inner }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> u64 {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.size() == 0
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.inner
    }

    /// Returns `true` if the whole range `[addr, addr + len)` lies inside the window.
    pub fn contains(&self, addr: u64, len: usize) -> bool {
        self.translate(addr, len).is_ok()
    }

    /// Translates a bus address into an offset in the backing store.
    ///
    /// The error reports the original bus address and the window's end so callers can log
    /// something a driver developer recognises.
    pub fn translate(&self, addr: u64, len: usize) -> GuestMemoryResult<u64> {
        let out_of_range = GuestMemoryError::OutOfRange {
            paddr: addr,
            len,
            size: self.base.saturating_add(self.inner.size()),
        };
        let offset = addr.checked_sub(self.base).ok_or(out_of_range.clone())?;
        self.inner
            .check_range(offset, len)
            .map_err(|_| out_of_range)?;
        Ok(offset)
    }

    pub fn read_into(&self, addr: u64, dst: &mut [u8]) -> GuestMemoryResult<()> {
        let offset = self.translate(addr, dst.len())?;
        self.inner.read_into(offset, dst)
    }

    pub fn write_from(&mut self, addr: u64, src: &[u8]) -> GuestMemoryResult<()> {
        let offset = self.translate(addr, src.len())?;
        self.inner.write_from(offset, src)
    }

    pub fn read_u32_le(&self, addr: u64) -> GuestMemoryResult<u32> {
        let mut buf = [0u8; 4];
        self.read_into(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn write_u32_le(&mut self, addr: u64, value: u32) -> GuestMemoryResult<()> {
        self.write_from(addr, &value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DenseMemory;

    #[test]
    fn translates_bus_addresses_relative_to_base() {
        let mut win = GuestMemoryWindow::new(0x4848_6000, DenseMemory::new(0x2000).unwrap());

        win.write_u32_le(0x4848_6010, 0xdead_beef).unwrap();
        assert_eq!(win.inner().read_u32_le(0x10).unwrap(), 0xdead_beef);
        assert_eq!(win.read_u32_le(0x4848_6010).unwrap(), 0xdead_beef);
        assert_eq!(win.translate(0x4848_7ffc, 4).unwrap(), 0x1ffc);
    }

    #[test]
    fn rejects_addresses_below_and_above_the_window() {
        let win = GuestMemoryWindow::new(0x1000, DenseMemory::new(0x100).unwrap());

        assert!(!win.contains(0x0ffc, 4));
        assert!(!win.contains(0x10fd, 4));
        assert!(win.contains(0x10fc, 4));
        assert_eq!(
            win.translate(0, 16).unwrap_err(),
            GuestMemoryError::OutOfRange {
                paddr: 0,
                len: 16,
                size: 0x1100
            }
        );
    }
}
