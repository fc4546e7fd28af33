//! WebAssembly linear memory implementation
//!
//! All access is bounds-checked before touching the underlying data; an
//! out-of-bounds access is a trap, never a panic.
//!
//! - Page size: 64KB (65,536 bytes)
//! - Address space: 32-bit, plus a 32-bit static offset per access
//! - Little-endian multi-byte access

use super::Trap;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::TryReserveError;

/// WebAssembly page size in bytes (64KB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages (2^16 = 64K pages = 4GB total)
pub const MAX_PAGES: u32 = 65536;

#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    current_pages: u32,
    /// Growth ceiling in pages; already clamped to the engine's page limit
    max_pages: u32,
}

impl Memory {
    /// Create a zeroed memory of `initial_pages`.
    ///
    /// `max_pages` is the effective ceiling for `memory.grow`; callers clamp
    /// the module's declared maximum against their configured limit.
    ///
    /// Fails instead of aborting when the initial pages cannot be allocated.
    pub fn new(initial_pages: u32, max_pages: u32) -> Result<Self, TryReserveError> {
        let max_pages = max_pages.min(MAX_PAGES).max(initial_pages);
        let len = initial_pages as usize * PAGE_SIZE;
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);
        Ok(Memory {
            data,
            current_pages: initial_pages,
            max_pages,
        })
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow memory by `delta_pages`.
    ///
    /// Returns the previous size in pages, or -1 if growth fails
    pub fn grow(&mut self, delta_pages: u32) -> i32 {
        let current = self.current_pages;

        let Some(new_pages) = current.checked_add(delta_pages) else {
            return -1;
        };
        if new_pages > self.max_pages {
            return -1;
        }

        let new_bytes = new_pages as usize * PAGE_SIZE;
        match self.data.try_reserve(new_bytes - self.data.len()) {
            Ok(()) => {
                self.data.resize(new_bytes, 0);
                self.current_pages = new_pages;
                current as i32
            }
            Err(_) => -1,
        }
    }

    /// Resolve `addr + offset` for an access of `size` bytes.
    #[inline]
    fn check_bounds(&self, addr: u32, offset: u32, size: usize) -> Result<usize, Trap> {
        let start = addr as u64 + offset as u64;
        let end = start + size as u64;
        if end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        Ok(start as usize)
    }

    fn slice(&self, addr: u32, offset: u32, size: usize) -> Result<&[u8], Trap> {
        let start = self.check_bounds(addr, offset, size)?;
        Ok(&self.data[start..start + size])
    }

    fn slice_mut(&mut self, addr: u32, offset: u32, size: usize) -> Result<&mut [u8], Trap> {
        let start = self.check_bounds(addr, offset, size)?;
        Ok(&mut self.data[start..start + size])
    }

    pub fn read_u8(&self, addr: u32, offset: u32) -> Result<u8, Trap> {
        Ok(self.slice(addr, offset, 1)?[0])
    }

    pub fn read_u16(&self, addr: u32, offset: u32) -> Result<u16, Trap> {
        Ok(LittleEndian::read_u16(self.slice(addr, offset, 2)?))
    }

    pub fn read_u32(&self, addr: u32, offset: u32) -> Result<u32, Trap> {
        Ok(LittleEndian::read_u32(self.slice(addr, offset, 4)?))
    }

    pub fn read_u64(&self, addr: u32, offset: u32) -> Result<u64, Trap> {
        Ok(LittleEndian::read_u64(self.slice(addr, offset, 8)?))
    }

    pub fn write_u8(&mut self, addr: u32, offset: u32, value: u8) -> Result<(), Trap> {
        self.slice_mut(addr, offset, 1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u32, offset: u32, value: u16) -> Result<(), Trap> {
        LittleEndian::write_u16(self.slice_mut(addr, offset, 2)?, value);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u32, offset: u32, value: u32) -> Result<(), Trap> {
        LittleEndian::write_u32(self.slice_mut(addr, offset, 4)?, value);
        Ok(())
    }

    pub fn write_u64(&mut self, addr: u32, offset: u32, value: u64) -> Result<(), Trap> {
        LittleEndian::write_u64(self.slice_mut(addr, offset, 8)?, value);
        Ok(())
    }

    /// Read `len` bytes starting at `addr`.
    pub fn read_bytes(&self, addr: u32, len: usize) -> Result<&[u8], Trap> {
        self.slice(addr, 0, len)
    }

    /// Copy `bytes` into memory at `addr`. Nothing is written if any byte
    /// would land out of bounds.
    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), Trap> {
        self.slice_mut(addr, 0, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let memory = Memory::new(1, 2).unwrap();
        assert_eq!(memory.size(), 1);
        assert_eq!(memory.len(), PAGE_SIZE);
        assert_eq!(memory.read_u64(0, 0).unwrap(), 0);
        assert!(Memory::new(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_little_endian_access() {
        let mut memory = Memory::new(1, 1).unwrap();
        memory.write_u32(0, 4, 0x1234_5678).unwrap();
        assert_eq!(memory.read_u8(4, 0).unwrap(), 0x78);
        assert_eq!(memory.read_u16(0, 6).unwrap(), 0x1234);
        assert_eq!(memory.read_bytes(4, 4).unwrap(), &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_bounds() {
        let mut memory = Memory::new(1, 1).unwrap();
        let last = (PAGE_SIZE - 4) as u32;
        assert!(memory.write_u32(last, 0, 1).is_ok());
        assert_eq!(memory.write_u32(last + 1, 0, 1), Err(Trap::MemoryOutOfBounds));
        assert_eq!(memory.read_u8(u32::MAX, u32::MAX), Err(Trap::MemoryOutOfBounds));
        assert_eq!(memory.write_bytes(last, &[0; 5]), Err(Trap::MemoryOutOfBounds));
        assert_eq!(memory.read_u32(last, 0).unwrap(), 1);
    }

    #[test]
    fn test_grow() {
        let mut memory = Memory::new(1, 3).unwrap();
        assert_eq!(memory.grow(1), 1);
        assert_eq!(memory.size(), 2);
        assert_eq!(memory.read_u8((PAGE_SIZE * 2 - 1) as u32, 0).unwrap(), 0);
        assert_eq!(memory.grow(2), -1);
        assert_eq!(memory.grow(u32::MAX), -1);
        assert_eq!(memory.grow(0), 2);
    }
}
