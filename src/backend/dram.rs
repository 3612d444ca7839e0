//! In-memory backend store
//!
//! The store is one flat byte array holding the namespace's logical space.
//! A transfer walks the scatter-gather list segment by segment and copies
//! each one between host memory and the store at the current store offset.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sg::{Direction, HostMemory, ScatterList};
use super::{DeviceMode, FailurePolicy};
use crate::error::{Error, Result};

/// Result of a completed transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    /// Bytes moved successfully
    pub bytes: u64,
    /// Segments walked
    pub segments: usize,
    /// Segments that failed (best-effort transfers only)
    pub failed: Vec<usize>,
}

/// DRAM-backed logical space.
#[derive(Debug)]
pub struct DramBackend {
    store: BytesMut,
    mode: DeviceMode,
    policy: FailurePolicy,
}

impl DramBackend {
    /// Allocate a zeroed store of `size` bytes.
    pub fn new(size: usize, mode: DeviceMode, policy: FailurePolicy) -> Self {
        debug!("Allocating {}B backend store ({:?} mode)", size, mode);
        Self {
            store: BytesMut::zeroed(size),
            mode,
            policy,
        }
    }

    pub fn size(&self) -> u64 {
        self.store.len() as u64
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Raw view of the store.
    pub fn as_slice(&self) -> &[u8] {
        &self.store
    }

    fn store_range(&self, offset: u64, len: u64) -> Option<std::ops::Range<usize>> {
        let end = offset.checked_add(len)?;
        if end > self.size() {
            return None;
        }
        Some(offset as usize..end as usize)
    }

    /// Move the bytes described by `sg` between `host` and the store.
    ///
    /// `offsets` holds the store byte offset of the first segment; in
    /// open-channel mode it holds one offset per segment. Sequential modes
    /// advance the offset by each segment's length.
    pub fn rw(
        &mut self,
        host: &mut dyn HostMemory,
        sg: &ScatterList,
        offsets: &[u64],
        dir: Direction,
    ) -> Result<TransferReport> {
        let mut offset = *offsets.first().ok_or_else(|| Error::BackendTransfer {
            segment: 0,
            reason: "no store offset given".into(),
        })?;
        let mut report = TransferReport::default();

        for (index, segment) in sg.segments().iter().enumerate() {
            if let Err(reason) = self.copy_segment(host, segment.addr, segment.len, offset, dir) {
                match self.policy {
                    FailurePolicy::Abort => {
                        return Err(Error::BackendTransfer {
                            segment: index,
                            reason,
                        });
                    }
                    FailurePolicy::BestEffort => {
                        warn!("Backend segment {} failed, continuing: {}", index, reason);
                        report.failed.push(index);
                    }
                }
            } else {
                report.bytes += segment.len;
            }
            report.segments += 1;

            offset = if self.mode.is_sequential() {
                offset + segment.len
            } else {
                offsets.get(index + 1).copied().unwrap_or(offset)
            };
        }

        Ok(report)
    }

    fn copy_segment(
        &mut self,
        host: &mut dyn HostMemory,
        addr: u64,
        len: u64,
        offset: u64,
        dir: Direction,
    ) -> std::result::Result<(), String> {
        let range = self.store_range(offset, len).ok_or_else(|| {
            format!(
                "store range {}+{} outside {}B store",
                offset,
                len,
                self.size()
            )
        })?;
        let store = &mut self.store[range];
        let copied = match dir {
            Direction::ToDevice => host.read(addr, store),
            Direction::FromDevice => host.write(addr, store),
        };
        copied.map_err(|e| e.to_string())
    }

    /// Zero `len` bytes of the store at `offset`.
    pub fn zero(&mut self, offset: u64, len: u64) -> Result<()> {
        let range = self
            .store_range(offset, len)
            .ok_or_else(|| Error::BackendTransfer {
                segment: 0,
                reason: format!("zero range {}+{} outside store", offset, len),
            })?;
        self.store[range].fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FlatHostMemory;

    fn backend(mode: DeviceMode, policy: FailurePolicy) -> DramBackend {
        DramBackend::new(64, mode, policy)
    }

    #[test]
    fn test_sequential_write_then_read() {
        let mut be = backend(DeviceMode::Zoned, FailurePolicy::Abort);
        let mut host = FlatHostMemory::new(0, 32);
        host.as_mut_slice()[..12].copy_from_slice(b"hello, zones");

        let mut sg = ScatterList::new();
        sg.push(0, 5);
        sg.push(5, 7);
        let report = be.rw(&mut host, &sg, &[16], Direction::ToDevice).unwrap();
        assert_eq!(report.bytes, 12);
        assert_eq!(report.segments, 2);
        assert_eq!(&be.as_slice()[16..28], b"hello, zones");

        let mut out = FlatHostMemory::new(0, 32);
        let sg = ScatterList::contiguous(8, 12, 4);
        be.rw(&mut out, &sg, &[16], Direction::FromDevice).unwrap();
        assert_eq!(&out.as_slice()[8..20], b"hello, zones");
    }

    #[test]
    fn test_open_channel_offsets_per_segment() {
        let mut be = backend(DeviceMode::OpenChannel, FailurePolicy::Abort);
        let mut host = FlatHostMemory::new(0, 8);
        host.as_mut_slice().copy_from_slice(b"aaaabbbb");

        let sg = ScatterList::contiguous(0, 8, 4);
        be.rw(&mut host, &sg, &[40, 8], Direction::ToDevice).unwrap();
        assert_eq!(&be.as_slice()[40..44], b"aaaa");
        assert_eq!(&be.as_slice()[8..12], b"bbbb");
    }

    #[test]
    fn test_abort_on_failed_segment() {
        let mut be = backend(DeviceMode::Zoned, FailurePolicy::Abort);
        let mut host = FlatHostMemory::new(0, 8);
        let mut sg = ScatterList::new();
        sg.push(0, 4);
        sg.push(100, 4);
        sg.push(4, 4);

        let err = be.rw(&mut host, &sg, &[0], Direction::ToDevice).unwrap_err();
        assert!(matches!(err, Error::BackendTransfer { segment: 1, .. }));
    }

    #[test]
    fn test_best_effort_continues() {
        let mut be = backend(DeviceMode::Zoned, FailurePolicy::BestEffort);
        let mut host = FlatHostMemory::new(0, 12);
        host.as_mut_slice().copy_from_slice(b"xxxxyyyyzzzz");
        let mut sg = ScatterList::new();
        sg.push(0, 4);
        sg.push(100, 4);
        sg.push(8, 4);

        let report = be.rw(&mut host, &sg, &[0], Direction::ToDevice).unwrap();
        assert_eq!(report.failed, vec![1]);
        assert_eq!(report.bytes, 8);
        // The failed segment still advanced the store offset
        assert_eq!(&be.as_slice()[0..4], b"xxxx");
        assert_eq!(&be.as_slice()[4..8], &[0; 4]);
        assert_eq!(&be.as_slice()[8..12], b"zzzz");
    }

    #[test]
    fn test_store_overrun_fails() {
        let mut be = backend(DeviceMode::Zoned, FailurePolicy::Abort);
        let mut host = FlatHostMemory::new(0, 16);
        let sg = ScatterList::contiguous(0, 16, 16);
        assert!(be.rw(&mut host, &sg, &[56], Direction::ToDevice).is_err());
        assert!(be.rw(&mut host, &sg, &[], Direction::ToDevice).is_err());
    }

    #[test]
    fn test_zero_range() {
        let mut be = backend(DeviceMode::Zoned, FailurePolicy::Abort);
        let mut host = FlatHostMemory::new(0, 64);
        host.as_mut_slice().fill(0xff);
        let sg = ScatterList::contiguous(0, 64, 64);
        be.rw(&mut host, &sg, &[0], Direction::ToDevice).unwrap();

        be.zero(8, 16).unwrap();
        assert!(be.as_slice()[8..24].iter().all(|&b| b == 0));
        assert_eq!(be.as_slice()[24], 0xff);
        assert!(be.zero(60, 8).is_err());
    }
}
