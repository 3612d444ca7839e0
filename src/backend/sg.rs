//! Scatter-gather lists and host memory access

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transfer direction, seen from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Host memory into the store (writes)
    ToDevice,
    /// Store into host memory (reads)
    FromDevice,
}

/// One contiguous host memory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SgSegment {
    pub addr: u64,
    pub len: u64,
}

/// Host memory segments of one command, in transfer order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScatterList {
    segments: Vec<SgSegment>,
}

impl ScatterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list of `len` bytes at `addr` split into segments of at most
    /// `segment_len` bytes.
    pub fn contiguous(addr: u64, len: u64, segment_len: u64) -> Self {
        let mut sg = Self::new();
        let mut offset = 0;
        while offset < len {
            let chunk = segment_len.min(len - offset);
            sg.push(addr + offset, chunk);
            offset += chunk;
        }
        sg
    }

    pub fn push(&mut self, addr: u64, len: u64) {
        self.segments.push(SgSegment { addr, len });
    }

    pub fn segments(&self) -> &[SgSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total bytes described.
    pub fn total_len(&self) -> u64 {
        self.segments.iter().map(|s| s.len).sum()
    }
}

/// Host memory as seen through DMA.
pub trait HostMemory {
    /// Copy `buf.len()` bytes at `addr` into `buf`.
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<()>;

    /// Copy `data` to `addr`.
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<()>;
}

/// One flat window of host memory starting at `base`.
#[derive(Debug, Clone)]
pub struct FlatHostMemory {
    base: u64,
    bytes: BytesMut,
}

impl FlatHostMemory {
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            bytes: BytesMut::zeroed(size),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn range(&self, addr: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let start = addr
            .checked_sub(self.base)
            .and_then(|off| usize::try_from(off).ok())
            .filter(|&off| off + len <= self.bytes.len())
            .ok_or_else(|| {
                Error::Internal(format!(
                    "host address {:#x}+{} outside window {:#x}+{}",
                    addr,
                    len,
                    self.base,
                    self.bytes.len()
                ))
            })?;
        Ok(start..start + len)
    }
}

impl HostMemory for FlatHostMemory {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let range = self.range(addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_split() {
        let sg = ScatterList::contiguous(0x1000, 10_000, 4096);
        assert_eq!(sg.len(), 3);
        assert_eq!(sg.segments()[2], SgSegment { addr: 0x1000 + 8192, len: 1808 });
        assert_eq!(sg.total_len(), 10_000);
        assert!(ScatterList::contiguous(0, 0, 4096).is_empty());
    }

    #[test]
    fn test_flat_host_memory_window() {
        let mut host = FlatHostMemory::new(0x1000, 16);
        host.write(0x1004, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 4];
        host.read(0x1003, &mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);

        assert!(host.read(0xfff, &mut buf).is_err());
        assert!(host.write(0x100e, &[0; 4]).is_err());
    }
}
