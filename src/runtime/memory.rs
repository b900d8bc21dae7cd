//! Linear memory
//!
//! Memory is a zero-initialised byte vector sized in 64KiB pages. Every
//! access is bounds-checked against the current length before the data is
//! touched; effective addresses are computed in 64 bits so `base + offset`
//! can never wrap.

use super::{RuntimeError, Trap};

/// WebAssembly page size in bytes (64KB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages for a 32-bit memory
pub const MAX_PAGES: u32 = 65536;

#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    max_pages: Option<u32>,
}

/// `base + offset` without wrapping
pub fn effective_address(base: u32, offset: u32) -> u64 {
    base as u64 + offset as u64
}

impl Memory {
    /// Create a memory of `initial_pages`. Limits beyond the 32-bit address
    /// space or an initial size above the maximum are engine faults, since
    /// validation rejects such modules.
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, RuntimeError> {
        if initial_pages > MAX_PAGES {
            return Err(RuntimeError::fault(format!(
                "initial memory size {initial_pages} pages exceeds maximum {MAX_PAGES} pages"
            )));
        }
        if let Some(max) = max_pages {
            if initial_pages > max || max > MAX_PAGES {
                return Err(RuntimeError::fault(format!(
                    "invalid memory limits: min {initial_pages}, max {max}"
                )));
            }
        }

        Ok(Memory {
            data: vec![0u8; initial_pages as usize * PAGE_SIZE],
            max_pages,
        })
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Current size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that `[ea, ea + size)` lies within memory, returning the start
    /// as an index
    #[inline]
    fn check_bounds(&self, ea: u64, size: usize) -> Result<usize, RuntimeError> {
        let end = ea.checked_add(size as u64).ok_or(Trap::MemoryOutOfBounds)?;
        if end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds.into());
        }
        Ok(ea as usize)
    }

    /// Borrow `len` bytes at an effective address
    pub fn slice(&self, ea: u64, len: usize) -> Result<&[u8], RuntimeError> {
        let start = self.check_bounds(ea, len)?;
        Ok(&self.data[start..start + len])
    }

    /// Read `N` bytes at an effective address
    pub fn load<const N: usize>(&self, ea: u64) -> Result<[u8; N], RuntimeError> {
        let start = self.check_bounds(ea, N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[start..start + N]);
        Ok(bytes)
    }

    /// Write `bytes` at an effective address
    pub fn store(&mut self, ea: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        let start = self.check_bounds(ea, bytes.len())?;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_bytes(&self, addr: u32, len: usize) -> Result<Vec<u8>, RuntimeError> {
        let start = self.check_bounds(addr as u64, len)?;
        Ok(self.data[start..start + len].to_vec())
    }

    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.store(addr as u64, bytes)
    }
}
