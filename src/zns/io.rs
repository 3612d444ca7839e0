//! Write, append and read admission
//!
//! ```text
//!   write / append                         read
//!   ─────────────                          ────
//!   bounds (namespace)                     bounds (namespace)
//!   zone capacity boundary                 zone readable?
//!   zone writable?                         end <= zone end, or cross-zone walk
//!   append limit / wp match
//!   make room + reserve (auto-open)
//!        │
//!        ├── data transfer (caller) ───────┐
//!        ▼                                 │
//!   commit: implicit-open or fill, advance wp
//! ```
//!
//! Preparing a write never moves the write pointer. The caller moves the
//! data and then commits, so a failed transfer leaves the zone where it was.

use tracing::debug;

use super::namespace::Namespace;
use super::transition::ZoneEvent;
use super::zone::{Zone, ZoneState};
use crate::error::{Error, Result};

/// A write that passed admission and holds its reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedWrite {
    /// Zone the write lands in
    pub zone: u32,

    /// First LBA actually written (the write pointer for appends)
    pub start: u64,

    /// Blocks to write
    pub nlb: u64,

    /// Implicitly open zone closed to make room, if any
    pub evicted: Option<u32>,
}

/// Outcome of committing a prepared write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCommit {
    /// LBA the data was written at
    pub slba: u64,

    /// State of the zone after the write
    pub state: ZoneState,
}

/// Write admission: Full, ReadOnly and Offline zones reject writes.
fn check_writable(zone: &Zone) -> Result<()> {
    match zone.state {
        ZoneState::Full => Err(Error::ZoneFull { zone: zone.index }),
        ZoneState::ReadOnly => Err(Error::ZoneReadOnly { zone: zone.index }),
        ZoneState::Offline => Err(Error::ZoneOffline { zone: zone.index }),
        _ => Ok(()),
    }
}

/// Read admission: everything but Offline is readable.
fn check_readable(zone: &Zone) -> Result<()> {
    match zone.state {
        ZoneState::Offline => Err(Error::ZoneOffline { zone: zone.index }),
        _ => Ok(()),
    }
}

impl Namespace {
    /// Admit a write (or zone append when `append`) of `nlb` blocks at `slba`.
    ///
    /// On success the zone is open (or about to fill) and its resources are
    /// reserved; the write pointer is untouched until
    /// [`Namespace::commit_write`].
    pub fn prepare_write(&mut self, slba: u64, nlb: u64, append: bool) -> Result<PreparedWrite> {
        let geometry = self.geometry();
        geometry.check_bounds(slba, nlb)?;
        let index = geometry.zone_index(slba);
        let max_append = geometry.max_append_bytes();
        let bytes = geometry.blocks_to_bytes(nlb);

        let zone = self.zone_at(index)?;
        let boundary = zone.write_boundary();
        if slba + nlb > boundary {
            return Err(Error::ZoneBoundary {
                zone: index,
                slba,
                nlb,
            });
        }
        check_writable(zone)?;

        let start = if append {
            if slba != zone.start_lba {
                return Err(Error::InvalidField(format!(
                    "zone append slba {} is not the start of zone {}",
                    slba, index
                )));
            }
            if bytes > max_append {
                return Err(Error::InvalidField(format!(
                    "zone append of {}B exceeds zasl limit {}B",
                    bytes, max_append
                )));
            }
            // Appended data lands at the write pointer and must fit too
            if zone.write_pointer + nlb > boundary {
                return Err(Error::ZoneBoundary {
                    zone: index,
                    slba,
                    nlb,
                });
            }
            zone.write_pointer
        } else {
            if slba != zone.write_pointer {
                return Err(Error::ZoneInvalidWrite {
                    zone: index,
                    slba,
                    write_pointer: zone.write_pointer,
                });
            }
            slba
        };

        let evicted = self.auto_open(index)?;

        Ok(PreparedWrite {
            zone: index,
            start,
            nlb,
            evicted,
        })
    }

    /// Make sure an empty or closed zone can be opened by the coming write.
    fn auto_open(&mut self, index: u32) -> Result<Option<u32>> {
        let state = self.zone_at(index)?.state;
        if !matches!(state, ZoneState::Empty | ZoneState::Closed) {
            return Ok(None);
        }
        let evicted = self.auto_transition();
        self.check(index, ZoneEvent::ImplicitOpen)?;
        Ok(evicted)
    }

    /// Commit an admitted write: move the zone to implicitly open (or full
    /// when the write reaches the capacity boundary) and advance the write
    /// pointer.
    pub fn commit_write(&mut self, write: &PreparedWrite) -> Result<WriteCommit> {
        let zone = self.zone_at(write.zone)?;
        let new_wp = zone.write_pointer + write.nlb;
        let event = if new_wp < zone.write_boundary() {
            ZoneEvent::ImplicitOpen
        } else {
            ZoneEvent::Fill
        };

        self.apply(write.zone, event)?;
        let slba = self.advance_write_pointer(write.zone, write.nlb);
        let state = self.zone_at(write.zone)?.state;

        debug!(
            "Zone {}: wrote {} blocks at {}, wp now {}",
            write.zone, write.nlb, slba, new_wp
        );

        Ok(WriteCommit { slba, state })
    }

    /// Admit a read of `nlb` blocks at `slba`.
    ///
    /// Reads may run past the zone end only when cross-zone reads are
    /// enabled, and then every zone touched must be readable.
    pub fn check_read(&self, slba: u64, nlb: u64) -> Result<()> {
        let geometry = self.geometry();
        geometry.check_bounds(slba, nlb)?;

        let end = slba + nlb;
        let mut index = geometry.zone_index(slba);
        check_readable(self.zone_at(index)?)?;

        let read_boundary = |i: u32| geometry.zone_start(i) + geometry.zone_size;
        if end <= read_boundary(index) {
            return Ok(());
        }
        if !geometry.cross_zone_read {
            return Err(Error::ZoneBoundary {
                zone: index,
                slba,
                nlb,
            });
        }

        while end > read_boundary(index) {
            index += 1;
            check_readable(self.zone_at(index)?)?;
        }
        Ok(())
    }
}
