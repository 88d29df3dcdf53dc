//! Guest linear memory.
//!
//! Host functions only see guest memory through [`GuestMemory`], which
//! bounds-checks every access. An out-of-range access is a fatal
//! [`VmError::MemoryFault`] for the whole invocation.

use polyvm_types::{Address, Hash};

use crate::error::VmError;

/// Size of one linear-memory page.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Bounds-checked view of an engine's linear memory.
pub trait GuestMemory {
    /// Current size in bytes.
    fn size(&self) -> usize;

    fn read(&self, offset: u32, len: u32) -> Result<&[u8], VmError>;

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), VmError>;

    fn read_address(&self, offset: u32) -> Result<Address, VmError> {
        let bytes = self.read(offset, Address::LEN as u32)?;
        let mut raw = [0u8; Address::LEN];
        raw.copy_from_slice(bytes);
        Ok(Address::from_bytes(raw))
    }

    fn write_address(&mut self, offset: u32, address: &Address) -> Result<(), VmError> {
        self.write(offset, address.as_bytes())
    }

    fn write_hash(&mut self, offset: u32, hash: &Hash) -> Result<(), VmError> {
        self.write(offset, hash.as_bytes())
    }
}

fn check_range(offset: u32, len: usize, size: usize) -> Result<std::ops::Range<usize>, VmError> {
    let start = offset as usize;
    match start.checked_add(len) {
        Some(end) if end <= size => Ok(start..end),
        _ => Err(VmError::MemoryFault {
            offset: u64::from(offset),
            len: len as u64,
            size: size as u64,
        }),
    }
}

/// Vec-backed linear memory in whole pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearMemory {
    data: Vec<u8>,
    max_pages: u32,
}

impl LinearMemory {
    /// Zeroed memory of `pages` pages, growable up to `max_pages`.
    pub fn new(pages: u32, max_pages: u32) -> Self {
        Self {
            data: vec![0u8; pages as usize * PAGE_SIZE],
            max_pages: max_pages.max(pages),
        }
    }

    pub fn pages(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    /// Grow by `delta` pages, returning the previous page count.
    pub fn grow(&mut self, delta: u32) -> Option<u32> {
        let previous = self.pages();
        let target = previous.checked_add(delta)?;
        if target > self.max_pages {
            return None;
        }
        self.data.resize(target as usize * PAGE_SIZE, 0);
        Some(previous)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl GuestMemory for LinearMemory {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: u32, len: u32) -> Result<&[u8], VmError> {
        let range = check_range(offset, len as usize, self.data.len())?;
        Ok(&self.data[range])
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), VmError> {
        let range = check_range(offset, data.len(), self.data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}
