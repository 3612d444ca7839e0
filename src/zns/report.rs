//! Zone Management Receive: zone reports
//!
//! Report layout (all integers little-endian):
//!
//! ```text
//!   ┌──────────────────────────────┐ 0
//!   │ nr_zones: u64 | reserved[56] │
//!   ├──────────────────────────────┤ 64
//!   │ descriptor 0  (64 B)         │
//!   │ [extension 0  (zdes B)]      │  extended reports only
//!   ├──────────────────────────────┤
//!   │ descriptor 1 ...             │
//!   └──────────────────────────────┘ byte budget (zero padded)
//!
//!   descriptor: zt u8 | zs<<4 u8 | za u8 | zai u8 | rsvd[4]
//!               zcap u64 | zslba u64 | wp u64 | rsvd[32]
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::namespace::Namespace;
use super::zone::{Zone, ZoneState};
use crate::error::{Error, Result};

/// Size of the report header
pub const REPORT_HEADER_SIZE: usize = 64;

/// Size of one zone descriptor
pub const ZONE_DESCRIPTOR_SIZE: usize = 64;

/// Zone state filter of a report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFilter {
    #[default]
    All,
    Empty,
    ImplicitlyOpen,
    ExplicitlyOpen,
    Closed,
    Full,
    ReadOnly,
    Offline,
}

impl ReportFilter {
    /// Decode the report-state field of the command.
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => ReportFilter::All,
            1 => ReportFilter::Empty,
            2 => ReportFilter::ImplicitlyOpen,
            3 => ReportFilter::ExplicitlyOpen,
            4 => ReportFilter::Closed,
            5 => ReportFilter::Full,
            6 => ReportFilter::ReadOnly,
            7 => ReportFilter::Offline,
            _ => {
                return Err(Error::InvalidField(format!(
                    "unknown zone report filter {}",
                    code
                )))
            }
        })
    }

    pub fn matches(&self, state: ZoneState) -> bool {
        match self {
            ReportFilter::All => true,
            ReportFilter::Empty => state == ZoneState::Empty,
            ReportFilter::ImplicitlyOpen => state == ZoneState::ImplicitlyOpen,
            ReportFilter::ExplicitlyOpen => state == ZoneState::ExplicitlyOpen,
            ReportFilter::Closed => state == ZoneState::Closed,
            ReportFilter::Full => state == ZoneState::Full,
            ReportFilter::ReadOnly => state == ZoneState::ReadOnly,
            ReportFilter::Offline => state == ZoneState::Offline,
        }
    }
}

/// A zone management receive command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMgmtRecv {
    /// Report zones starting with the zone containing this LBA
    pub slba: u64,

    pub filter: ReportFilter,

    /// Append each zone's descriptor extension
    pub extended: bool,

    /// Count only the zones that fit in the buffer
    pub partial: bool,

    /// Host buffer size in bytes
    pub byte_budget: u32,
}

/// Zone descriptor as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub zone_type: u8,
    pub state: ZoneState,
    pub attributes: u8,
    pub capacity: u64,
    pub start_lba: u64,
    /// `u64::MAX` when the write pointer is not valid
    pub write_pointer: u64,
}

impl From<&Zone> for ZoneDescriptor {
    fn from(zone: &Zone) -> Self {
        Self {
            zone_type: zone.zone_type.code(),
            state: zone.state,
            attributes: zone.attributes,
            capacity: zone.capacity,
            start_lba: zone.start_lba,
            write_pointer: zone.reported_wp(),
        }
    }
}

impl ZoneDescriptor {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.zone_type);
        buf.put_u8(self.state.code() << 4);
        buf.put_u8(self.attributes);
        buf.put_u8(0);
        buf.put_bytes(0, 4);
        buf.put_u64_le(self.capacity);
        buf.put_u64_le(self.start_lba);
        buf.put_u64_le(self.write_pointer);
        buf.put_bytes(0, 32);
    }
}

/// One report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub descriptor: ZoneDescriptor,
    /// Extension bytes, zero filled when the zone has none (extended only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Vec<u8>>,
}

/// A generated zone report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneReport {
    /// Matching zones from the starting zone on (bounded by the buffer for
    /// partial reports)
    pub nr_zones: u64,
    pub entries: Vec<ReportEntry>,
    /// Buffer size the report was generated for
    pub byte_budget: u32,
}

impl ZoneReport {
    /// Encode into a buffer of exactly `byte_budget` bytes.
    pub fn to_bytes(&self) -> Bytes {
        let budget = self.byte_budget as usize;
        let mut buf = BytesMut::with_capacity(budget);

        buf.put_u64_le(self.nr_zones);
        buf.put_bytes(0, REPORT_HEADER_SIZE - 8);
        for entry in &self.entries {
            entry.descriptor.encode(&mut buf);
            if let Some(ext) = &entry.extension {
                buf.put_slice(ext);
            }
        }
        buf.put_bytes(0, budget.saturating_sub(buf.len()));
        buf.truncate(budget);
        buf.freeze()
    }
}

impl Namespace {
    /// Generate a zone report.
    pub fn zone_report(&self, req: &ZoneMgmtRecv) -> Result<ZoneReport> {
        let geometry = self.geometry();
        let nsze = geometry.nsze();
        if req.slba >= nsze {
            return Err(Error::LbaRange {
                slba: req.slba,
                nlb: 0,
                nsze,
            });
        }
        if req.extended && !geometry.has_extensions() {
            return Err(Error::InvalidField(
                "extended report requested without descriptor extensions".into(),
            ));
        }
        if (req.byte_budget as usize) < REPORT_HEADER_SIZE {
            return Err(Error::InvalidField(format!(
                "report buffer of {}B cannot hold the header",
                req.byte_budget
            )));
        }
        geometry.check_mdts(u64::from(req.byte_budget))?;

        let ext_size = if req.extended {
            geometry.zd_extension_size as usize
        } else {
            0
        };
        let entry_size = ZONE_DESCRIPTOR_SIZE + ext_size;
        let max_zones = (req.byte_budget as usize - REPORT_HEADER_SIZE) / entry_size;

        let first = geometry.zone_index(req.slba) as usize;
        let matching = self.zones()[first..]
            .iter()
            .filter(|z| req.filter.matches(z.state));

        let nr_zones = if req.partial {
            matching.clone().take(max_zones).count()
        } else {
            matching.clone().count()
        };

        let entries: Vec<ReportEntry> = matching
            .take(max_zones)
            .map(|zone| ReportEntry {
                descriptor: ZoneDescriptor::from(zone),
                extension: req.extended.then(|| {
                    if zone.has_extension() {
                        self.extension(zone.index).to_vec()
                    } else {
                        vec![0; ext_size]
                    }
                }),
            })
            .collect();

        debug!(
            "Zone report from lba {}: {} matching, {} returned",
            req.slba,
            nr_zones,
            entries.len()
        );

        Ok(ZoneReport {
            nr_zones: nr_zones as u64,
            entries,
            byte_budget: req.byte_budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zns::mgmt::ZoneMgmtSend;
    use crate::zns::test_support::{namespace, test_config};
    use crate::zns::transition::ZoneEvent;
    use crate::zns::zone::WP_INVALID;

    fn request(slba: u64, filter: ReportFilter, budget: u32) -> ZoneMgmtRecv {
        ZoneMgmtRecv {
            slba,
            filter,
            extended: false,
            partial: false,
            byte_budget: budget,
        }
    }

    #[test]
    fn test_report_all_zones() {
        let ns = namespace(4, 8, 0, 0);
        let report = ns.zone_report(&request(0, ReportFilter::All, 4096)).unwrap();

        assert_eq!(report.nr_zones, 4);
        assert_eq!(report.entries.len(), 4);
        let d = report.entries[2].descriptor;
        assert_eq!(d.start_lba, 16);
        assert_eq!(d.state, ZoneState::Empty);
        assert_eq!(d.write_pointer, WP_INVALID);
        assert_eq!(d.capacity, 8);
    }

    #[test]
    fn test_report_filter_and_start() {
        let mut ns = namespace(4, 8, 0, 0);
        ns.apply(0, ZoneEvent::Finish).unwrap();
        ns.apply(3, ZoneEvent::Finish).unwrap();

        let report = ns.zone_report(&request(0, ReportFilter::Full, 4096)).unwrap();
        assert_eq!(report.nr_zones, 2);

        // Starts from the zone containing slba
        let report = ns.zone_report(&request(9, ReportFilter::Full, 4096)).unwrap();
        assert_eq!(report.nr_zones, 1);
        assert_eq!(report.entries[0].descriptor.start_lba, 24);
        assert_eq!(report.entries[0].descriptor.write_pointer, 32);
    }

    #[test]
    fn test_report_truncation_and_partial() {
        let ns = namespace(4, 8, 0, 0);

        // Room for two descriptors
        let mut req = request(0, ReportFilter::All, 64 + 2 * 64);
        let report = ns.zone_report(&req).unwrap();
        assert_eq!(report.nr_zones, 4);
        assert_eq!(report.entries.len(), 2);

        req.partial = true;
        let report = ns.zone_report(&req).unwrap();
        assert_eq!(report.nr_zones, 2);
        assert_eq!(report.entries.len(), 2);
    }

    #[test]
    fn test_report_header_only_budget() {
        let ns = namespace(4, 8, 0, 0);
        let report = ns.zone_report(&request(0, ReportFilter::All, 64)).unwrap();
        assert_eq!(report.nr_zones, 4);
        assert!(report.entries.is_empty());
        assert_eq!(report.to_bytes().len(), 64);
    }

    #[test]
    fn test_report_validation() {
        let ns = namespace(4, 8, 0, 0);
        assert!(matches!(
            ns.zone_report(&request(0, ReportFilter::All, 63)),
            Err(Error::InvalidField(_))
        ));
        assert!(matches!(
            ns.zone_report(&request(32, ReportFilter::All, 4096)),
            Err(Error::LbaRange { .. })
        ));
        assert!(matches!(
            ns.zone_report(&request(0, ReportFilter::All, (4096 << 10) + 1)),
            Err(Error::InvalidField(_))
        ));

        let mut req = request(0, ReportFilter::All, 4096);
        req.extended = true;
        assert!(matches!(ns.zone_report(&req), Err(Error::InvalidField(_))));

        assert!(ReportFilter::from_code(8).is_err());
        assert_eq!(ReportFilter::from_code(5).unwrap(), ReportFilter::Full);
    }

    #[test]
    fn test_extended_report() {
        let mut config = test_config(4, 8);
        config.zd_extension_size = 64;
        let mut ns = Namespace::from_config(&config).unwrap();
        ns.zone_mgmt_send(&ZoneMgmtSend::set_extension(8, vec![0x5a; 64]), |_| {})
            .unwrap();

        let mut req = request(0, ReportFilter::All, 64 + 2 * 128);
        req.extended = true;
        let report = ns.zone_report(&req).unwrap();

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].extension, Some(vec![0; 64]));
        assert_eq!(report.entries[1].extension, Some(vec![0x5a; 64]));
        assert_eq!(report.entries[1].descriptor.attributes, 0x80);

        let bytes = report.to_bytes();
        assert_eq!(bytes.len(), 64 + 2 * 128);
        assert_eq!(&bytes[64 + 128 + 64..64 + 256], &[0x5a; 64][..]);
    }

    #[test]
    fn test_report_wire_layout() {
        let mut ns = namespace(4, 8, 0, 0);
        let prepared = ns.prepare_write(8, 3, false).unwrap();
        ns.commit_write(&prepared).unwrap();

        let report = ns.zone_report(&request(8, ReportFilter::All, 128)).unwrap();
        let bytes = report.to_bytes();

        assert_eq!(&bytes[0..8], &3u64.to_le_bytes());
        assert!(bytes[8..64].iter().all(|&b| b == 0));

        let d = &bytes[64..128];
        assert_eq!(d[0], 0x2);
        assert_eq!(d[1], 0x2 << 4);
        assert_eq!(&d[8..16], &8u64.to_le_bytes());
        assert_eq!(&d[16..24], &8u64.to_le_bytes());
        assert_eq!(&d[24..32], &11u64.to_le_bytes());
    }
}
