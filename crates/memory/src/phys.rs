use thiserror::Error;

/// Errors returned by [`GuestMemory`] backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuestMemoryError {
    /// The requested address range is outside the backing store.
    #[error("guest memory access out of range: paddr=0x{paddr:x} len={len} size=0x{size:x}")]
    OutOfRange { paddr: u64, len: usize, size: u64 },
    /// The requested size cannot be represented by the current platform's `usize`.
    #[error("guest memory size {size} does not fit in usize")]
    SizeTooLarge { size: u64 },
    /// The chosen chunk size is invalid (e.g. zero).
    #[error("invalid guest memory chunk size {chunk_size}")]
    InvalidChunkSize { chunk_size: usize },
}

pub type GuestMemoryResult<T> = Result<T, GuestMemoryError>;

/// Byte-addressable memory that a device model can DMA into and out of.
///
/// Addresses are `u64` even though the modelled SoC bus is 32-bit, so the same trait can back both
/// the device-private descriptor RAM and the wider system address space.
pub trait GuestMemory {
    fn size(&self) -> u64;

    /// Reads bytes starting at `paddr` into `dst`.
    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()>;

    /// Writes `src` starting at `paddr`.
    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()>;

    /// Returns `Ok(())` if `[paddr, paddr + len)` lies inside the backing store.
    fn check_range(&self, paddr: u64, len: usize) -> GuestMemoryResult<()> {
        check_range(self.size(), paddr, len)
    }

    fn read_vec(&self, paddr: u64, len: usize) -> GuestMemoryResult<Vec<u8>> {
        self.check_range(paddr, len)?;
        let mut buf = vec![0u8; len];
        self.read_into(paddr, &mut buf)?;
        Ok(buf)
    }

    fn read_u8(&self, paddr: u64) -> GuestMemoryResult<u8> {
        let mut buf = [0u8; 1];
        self.read_into(paddr, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&self, paddr: u64) -> GuestMemoryResult<u16> {
        let mut buf = [0u8; 2];
        self.read_into(paddr, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32_le(&self, paddr: u64) -> GuestMemoryResult<u32> {
        let mut buf = [0u8; 4];
        self.read_into(paddr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_u8(&mut self, paddr: u64, value: u8) -> GuestMemoryResult<()> {
        self.write_from(paddr, &[value])
    }

    fn write_u16_le(&mut self, paddr: u64, value: u16) -> GuestMemoryResult<()> {
        self.write_from(paddr, &value.to_le_bytes())
    }

    fn write_u32_le(&mut self, paddr: u64, value: u32) -> GuestMemoryResult<()> {
        self.write_from(paddr, &value.to_le_bytes())
    }
}

impl<T: GuestMemory + ?Sized> GuestMemory for &mut T {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()> {
        (**self).read_into(paddr, dst)
    }

    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()> {
        (**self).write_from(paddr, src)
    }
}

impl<T: GuestMemory + ?Sized> GuestMemory for Box<T> {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()> {
        (**self).read_into(paddr, dst)
    }

    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()> {
        (**self).write_from(paddr, src)
    }
}

pub(crate) fn check_range(size: u64, paddr: u64, len: usize) -> GuestMemoryResult<()> {
    let end = paddr
        .checked_add(len as u64)
        .ok_or(GuestMemoryError::OutOfRange { paddr, len, size })?;
    if end > size {
        return Err(GuestMemoryError::OutOfRange { paddr, len, size });
    }
    Ok(())
}

/// Dense (contiguous) memory.
#[derive(Debug, Clone)]
pub struct DenseMemory {
    data: Box<[u8]>,
}

impl DenseMemory {
    pub fn new(size: u64) -> GuestMemoryResult<Self> {
        let size_usize =
            usize::try_from(size).map_err(|_| GuestMemoryError::SizeTooLarge { size })?;
        Ok(Self {
            data: vec![0u8; size_usize].into_boxed_slice(),
        })
    }

    /// Zeroes the whole backing store.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn range_to_usize(&self, paddr: u64, len: usize) -> GuestMemoryResult<(usize, usize)> {
        check_range(self.size(), paddr, len)?;
        // `check_range` guarantees `paddr + len <= data.len()`, which fits in usize.
        let start = paddr as usize;
        Ok((start, start + len))
    }
}

impl GuestMemory for DenseMemory {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()> {
        let (start, end) = self.range_to_usize(paddr, dst.len())?;
        dst.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()> {
        let (start, end) = self.range_to_usize(paddr, src.len())?;
        self.data[start..end].copy_from_slice(src);
        Ok(())
    }
}

/// Sparse memory backed by lazily-allocated fixed-size chunks.
///
/// Useful for modelling a full 32-bit system address space in tests where only a handful of
/// buffers are ever touched.
#[derive(Debug, Clone)]
pub struct SparseMemory {
    size: u64,
    chunk_size: usize,
    chunks: Vec<Option<Box<[u8]>>>,
}

impl SparseMemory {
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    pub fn new(size: u64) -> GuestMemoryResult<Self> {
        Self::with_chunk_size(size, Self::DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(size: u64, chunk_size: usize) -> GuestMemoryResult<Self> {
        if chunk_size == 0 {
            return Err(GuestMemoryError::InvalidChunkSize { chunk_size });
        }
        let chunk_size_u64 = chunk_size as u64;
        let chunk_count = size
            .checked_add(chunk_size_u64 - 1)
            .ok_or(GuestMemoryError::SizeTooLarge { size })?
            / chunk_size_u64;
        let chunk_count = usize::try_from(chunk_count)
            .map_err(|_| GuestMemoryError::SizeTooLarge { size })?;
        Ok(Self {
            size,
            chunk_size,
            chunks: vec![None; chunk_count],
        })
    }

    /// Number of chunks that have been materialised by writes.
    pub fn allocated_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    #[inline]
    fn split(&self, paddr: u64) -> (usize, usize) {
        let chunk_size_u64 = self.chunk_size as u64;
        // Callers range-check first, so both halves fit in usize.
        (
            (paddr / chunk_size_u64) as usize,
            (paddr % chunk_size_u64) as usize,
        )
    }
}

impl GuestMemory for SparseMemory {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()> {
        check_range(self.size, paddr, dst.len())?;
        let mut remaining = dst;
        let mut cur = paddr;

        while !remaining.is_empty() {
            let (chunk_idx, chunk_off) = self.split(cur);
            let take = (self.chunk_size - chunk_off).min(remaining.len());

            match self.chunks.get(chunk_idx).and_then(|c| c.as_ref()) {
                Some(chunk) => {
                    remaining[..take].copy_from_slice(&chunk[chunk_off..chunk_off + take])
                }
                None => remaining[..take].fill(0),
            }

            cur += take as u64;
            remaining = &mut remaining[take..];
        }

        Ok(())
    }

    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()> {
        check_range(self.size, paddr, src.len())?;
        let mut remaining = src;
        let mut cur = paddr;

        while !remaining.is_empty() {
            let (chunk_idx, chunk_off) = self.split(cur);
            let take = (self.chunk_size - chunk_off).min(remaining.len());

            let chunk_size = self.chunk_size;
            let slot = self
                .chunks
                .get_mut(chunk_idx)
                .ok_or(GuestMemoryError::OutOfRange {
                    paddr: cur,
                    len: take,
                    size: self.size,
                })?;
            let chunk = slot.get_or_insert_with(|| vec![0u8; chunk_size].into_boxed_slice());
            chunk[chunk_off..chunk_off + take].copy_from_slice(&remaining[..take]);

            cur += take as u64;
            remaining = &remaining[take..];
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_read_write_primitives() {
        let mut mem = DenseMemory::new(64).unwrap();

        mem.write_u16_le(2, 0x1122).unwrap();
        mem.write_u32_le(5, 0x3344_5566).unwrap();
        mem.write_u8(12, 0x77).unwrap();

        assert_eq!(mem.read_u16_le(2).unwrap(), 0x1122);
        assert_eq!(mem.read_u32_le(5).unwrap(), 0x3344_5566);
        assert_eq!(mem.read_u8(12).unwrap(), 0x77);
        assert_eq!(mem.read_vec(5, 4).unwrap(), vec![0x66, 0x55, 0x44, 0x33]);

        mem.clear();
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn sparse_unallocated_reads_return_zero() {
        let mem = SparseMemory::with_chunk_size(128, 16).unwrap();
        assert_eq!(mem.read_u32_le(4).unwrap(), 0);
        assert_eq!(mem.allocated_chunks(), 0);
    }

    #[test]
    fn sparse_write_crossing_chunk_boundary_allocates_both_chunks() {
        let mut mem = SparseMemory::with_chunk_size(64, 16).unwrap();

        let src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        mem.write_from(12, &src).unwrap();

        let mut dst = [0u8; 8];
        mem.read_into(12, &mut dst).unwrap();
        assert_eq!(dst, src);
        assert_eq!(mem.allocated_chunks(), 2);
    }

    #[test]
    fn out_of_range_returns_error_without_panicking() {
        let mut dense = DenseMemory::new(16).unwrap();
        assert!(matches!(
            dense.read_u32_le(14),
            Err(GuestMemoryError::OutOfRange { .. })
        ));
        assert!(matches!(
            dense.write_from(u64::MAX, &[0]),
            Err(GuestMemoryError::OutOfRange { .. })
        ));

        let mut sparse = SparseMemory::with_chunk_size(16, 8).unwrap();
        assert!(matches!(
            sparse.read_into(15, &mut [0u8; 2]),
            Err(GuestMemoryError::OutOfRange { .. })
        ));
        assert!(matches!(
            sparse.write_from(16, &[1u8]),
            Err(GuestMemoryError::OutOfRange { .. })
        ));
        assert_eq!(sparse.allocated_chunks(), 0);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert_eq!(
            SparseMemory::with_chunk_size(16, 0).unwrap_err(),
            GuestMemoryError::InvalidChunkSize { chunk_size: 0 }
        );
    }
}
