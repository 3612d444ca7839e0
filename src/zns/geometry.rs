//! Zone geometry derivation and identify data
//!
//! Geometry is derived once from [`ZnsConfig`] at namespace creation and is
//! immutable afterwards. All sizes here are in logical blocks unless a name
//! says otherwise.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ZnsConfig, PAGE_SIZE};
use crate::error::{Error, Result};

/// Size of the zoned identify namespace data structure
pub const IDENTIFY_SIZE: usize = 4096;

/// Offset of the first LBA format extension entry in the identify data
const LBAFE_OFFSET: usize = 2816;

/// Zone descriptor extension sizes are expressed in units of 64 bytes
pub const ZDES_UNIT: u32 = 64;

/// Immutable per-namespace zone geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneGeometry {
    /// Zone size in blocks
    pub zone_size: u64,

    /// Writable blocks per zone
    pub zone_capacity: u64,

    /// Number of zones in the namespace
    pub num_zones: u32,

    /// Logical block size in bytes
    pub lba_size: u32,

    /// Maximum active zones (0 = unbounded)
    pub max_active_zones: u32,

    /// Maximum open zones (0 = unbounded)
    pub max_open_zones: u32,

    /// Descriptor extension size in bytes (0 = disabled)
    pub zd_extension_size: u32,

    /// Reads may span zone boundaries
    pub cross_zone_read: bool,

    /// Maximum data transfer size exponent (0 = unlimited)
    pub mdts: u8,

    /// Zone append size limit exponent
    pub zasl: u8,

    zone_size_log2: Option<u32>,
}

impl ZoneGeometry {
    /// Derive and validate geometry from a device configuration.
    pub fn new(config: &ZnsConfig) -> Result<Self> {
        config.validate()?;

        let lba_size = u64::from(config.lba_size);
        let zone_size_bytes = config.zone_size;
        let zone_cap_bytes = config.effective_zone_capacity();

        if zone_cap_bytes > zone_size_bytes {
            return Err(Error::Config(format!(
                "zone capacity {}B > zone size {}B",
                zone_cap_bytes, zone_size_bytes
            )));
        }
        if zone_size_bytes < lba_size {
            return Err(Error::Config(format!(
                "zone size {}B too small, must be >= {}B",
                zone_size_bytes, lba_size
            )));
        }
        if zone_cap_bytes < lba_size {
            return Err(Error::Config(format!(
                "zone capacity {}B too small, must be >= {}B",
                zone_cap_bytes, lba_size
            )));
        }

        let zone_size = zone_size_bytes / lba_size;
        let zone_capacity = zone_cap_bytes / lba_size;
        let num_zones = config.namespace_size / lba_size / zone_size;
        if num_zones == 0 {
            return Err(Error::Config(format!(
                "namespace of {}B cannot hold a single {}B zone",
                config.namespace_size, zone_size_bytes
            )));
        }
        let num_zones = u32::try_from(num_zones)
            .map_err(|_| Error::Config(format!("too many zones: {}", num_zones)))?;

        if config.max_open_zones > num_zones {
            return Err(Error::Config(format!(
                "max_open_zones value {} exceeds the number of zones {}",
                config.max_open_zones, num_zones
            )));
        }
        if config.max_active_zones > num_zones {
            return Err(Error::Config(format!(
                "max_active_zones value {} exceeds the number of zones {}",
                config.max_active_zones, num_zones
            )));
        }

        if config.zd_extension_size != 0 {
            if config.zd_extension_size % ZDES_UNIT != 0 {
                return Err(Error::Config(
                    "zone descriptor extension size must be a multiple of 64B".into(),
                ));
            }
            if config.zd_extension_size / ZDES_UNIT > 0xff {
                return Err(Error::Config(
                    "zone descriptor extension size is too large".into(),
                ));
            }
        }

        let zone_size_log2 = zone_size.is_power_of_two().then(|| zone_size.ilog2());

        let geometry = Self {
            zone_size,
            zone_capacity,
            num_zones,
            lba_size: config.lba_size,
            max_active_zones: config.max_active_zones,
            max_open_zones: config.max_open_zones,
            zd_extension_size: config.zd_extension_size,
            cross_zone_read: config.cross_zone_read,
            mdts: config.mdts,
            zasl: config.zasl(),
            zone_size_log2,
        };

        info!(
            "Zone geometry: {} zones of {} blocks (capacity {}), lba_size={}B, max_active={}, max_open={}",
            geometry.num_zones,
            geometry.zone_size,
            geometry.zone_capacity,
            geometry.lba_size,
            geometry.max_active_zones,
            geometry.max_open_zones
        );

        Ok(geometry)
    }

    /// Namespace size in blocks.
    pub fn nsze(&self) -> u64 {
        u64::from(self.num_zones) * self.zone_size
    }

    /// Index of the zone containing `lba`.
    ///
    /// The caller must have range-checked `lba` against [`Self::nsze`].
    pub fn zone_index(&self, lba: u64) -> u32 {
        let idx = match self.zone_size_log2 {
            Some(shift) => lba >> shift,
            None => lba / self.zone_size,
        };
        idx as u32
    }

    /// Start LBA of zone `index`.
    pub fn zone_start(&self, index: u32) -> u64 {
        u64::from(index) * self.zone_size
    }

    /// Byte length of `nlb` blocks.
    pub fn blocks_to_bytes(&self, nlb: u64) -> u64 {
        nlb * u64::from(self.lba_size)
    }

    /// Byte offset of `lba` in the backend store.
    pub fn lba_to_offset(&self, lba: u64) -> u64 {
        self.blocks_to_bytes(lba)
    }

    /// Largest transfer in bytes, or `None` when unlimited.
    pub fn max_transfer_bytes(&self) -> Option<u64> {
        (self.mdts != 0).then(|| PAGE_SIZE << self.mdts)
    }

    /// Largest zone append in bytes.
    pub fn max_append_bytes(&self) -> u64 {
        PAGE_SIZE << self.zasl
    }

    /// Whether zone descriptor extensions are enabled.
    pub fn has_extensions(&self) -> bool {
        self.zd_extension_size != 0
    }

    /// Check a transfer size against the mdts limit.
    pub fn check_mdts(&self, bytes: u64) -> Result<()> {
        match self.max_transfer_bytes() {
            Some(limit) if bytes > limit => Err(Error::InvalidField(format!(
                "transfer of {}B exceeds mdts limit {}B",
                bytes, limit
            ))),
            _ => Ok(()),
        }
    }

    /// Check that `[slba, slba + nlb)` lies within the namespace.
    pub fn check_bounds(&self, slba: u64, nlb: u64) -> Result<()> {
        let nsze = self.nsze();
        match slba.checked_add(nlb) {
            Some(end) if end <= nsze => Ok(()),
            _ => Err(Error::LbaRange { slba, nlb, nsze }),
        }
    }

    /// Identify data for the zoned command set.
    pub fn identify(&self) -> ZonedIdentify {
        ZonedIdentify {
            mar: self.max_active_zones.wrapping_sub(1),
            mor: self.max_open_zones.wrapping_sub(1),
            zoc: 0,
            ozcs: u16::from(self.cross_zone_read),
            zsze: self.zone_size,
            zdes: (self.zd_extension_size / ZDES_UNIT) as u8,
            nsze: self.nsze(),
        }
    }
}

/// Zoned namespace identify fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonedIdentify {
    /// Maximum active resources, zero-based (all-ones = no limit)
    pub mar: u32,

    /// Maximum open resources, zero-based (all-ones = no limit)
    pub mor: u32,

    /// Zone operation characteristics
    pub zoc: u16,

    /// Optional zoned command support (bit 0: cross-zone read)
    pub ozcs: u16,

    /// Zone size in blocks
    pub zsze: u64,

    /// Zone descriptor extension size in 64B units
    pub zdes: u8,

    /// Namespace size; capacity and utilization report the same value
    pub nsze: u64,
}

impl ZonedIdentify {
    /// Encode as the 4096-byte identify namespace (zoned) structure.
    ///
    /// Only LBA format 0 is populated.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(IDENTIFY_SIZE);
        buf.put_u16_le(self.zoc);
        buf.put_u16_le(self.ozcs);
        buf.put_u32_le(self.mar);
        buf.put_u32_le(self.mor);
        buf.put_bytes(0, LBAFE_OFFSET - buf.len());
        buf.put_u64_le(self.zsze);
        buf.put_u8(self.zdes);
        buf.put_bytes(0, IDENTIFY_SIZE - buf.len());
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ZnsConfig {
        ZnsConfig {
            namespace_size: 64 * 4096,
            zone_size: 8 * 4096,
            ..Default::default()
        }
    }

    #[test]
    fn test_geometry_derivation() {
        let mut config = small_config();
        config.zone_capacity = 6 * 4096;

        let geo = ZoneGeometry::new(&config).unwrap();
        assert_eq!(geo.zone_size, 8);
        assert_eq!(geo.zone_capacity, 6);
        assert_eq!(geo.num_zones, 8);
        assert_eq!(geo.nsze(), 64);
        assert_eq!(geo.zone_index(17), 2);
        assert_eq!(geo.zone_start(2), 16);
    }

    #[test]
    fn test_geometry_non_power_of_two_zone() {
        let config = ZnsConfig {
            namespace_size: 60 * 4096,
            zone_size: 6 * 4096,
            ..Default::default()
        };
        let geo = ZoneGeometry::new(&config).unwrap();
        assert_eq!(geo.num_zones, 10);
        assert_eq!(geo.zone_index(11), 1);
        assert_eq!(geo.zone_index(12), 2);
    }

    #[test]
    fn test_geometry_rejects_bad_capacity() {
        let mut config = small_config();
        config.zone_capacity = 16 * 4096;
        assert!(matches!(ZoneGeometry::new(&config), Err(Error::Config(_))));

        let mut config = small_config();
        config.zone_size = 1024;
        assert!(ZoneGeometry::new(&config).is_err());

        let mut config = small_config();
        config.zone_capacity = 1024;
        assert!(ZoneGeometry::new(&config).is_err());
    }

    #[test]
    fn test_geometry_rejects_limits_above_zone_count() {
        let mut config = small_config();
        config.max_open_zones = 9;
        assert!(ZoneGeometry::new(&config).is_err());

        let mut config = small_config();
        config.max_active_zones = 9;
        assert!(ZoneGeometry::new(&config).is_err());

        let mut config = small_config();
        config.max_active_zones = 8;
        config.max_open_zones = 8;
        assert!(ZoneGeometry::new(&config).is_ok());
    }

    #[test]
    fn test_geometry_extension_size() {
        let mut config = small_config();
        config.zd_extension_size = 100;
        assert!(ZoneGeometry::new(&config).is_err());

        config.zd_extension_size = 256 * 64;
        assert!(ZoneGeometry::new(&config).is_err());

        config.zd_extension_size = 255 * 64;
        let geo = ZoneGeometry::new(&config).unwrap();
        assert_eq!(geo.identify().zdes, 255);
    }

    #[test]
    fn test_geometry_bounds_and_mdts() {
        let geo = ZoneGeometry::new(&small_config()).unwrap();
        assert!(geo.check_bounds(60, 4).is_ok());
        assert!(matches!(
            geo.check_bounds(60, 5),
            Err(Error::LbaRange { nsze: 64, .. })
        ));
        assert!(geo.check_bounds(u64::MAX, 2).is_err());

        assert_eq!(geo.max_transfer_bytes(), Some(4096 << 10));
        assert!(geo.check_mdts(4096 << 10).is_ok());
        assert!(geo.check_mdts((4096 << 10) + 1).is_err());
    }

    #[test]
    fn test_identify_unbounded_limits() {
        let geo = ZoneGeometry::new(&small_config()).unwrap();
        let id = geo.identify();
        assert_eq!(id.mar, u32::MAX);
        assert_eq!(id.mor, u32::MAX);
        assert_eq!(id.ozcs, 0);
        assert_eq!(id.zsze, 8);
        assert_eq!(id.nsze, 64);
    }

    #[test]
    fn test_identify_encoding() {
        let mut config = small_config();
        config.max_active_zones = 4;
        config.max_open_zones = 2;
        config.cross_zone_read = true;
        config.zd_extension_size = 128;

        let bytes = ZoneGeometry::new(&config).unwrap().identify().to_bytes();
        assert_eq!(bytes.len(), IDENTIFY_SIZE);
        assert_eq!(&bytes[2..4], &[1, 0]);
        assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(&bytes[LBAFE_OFFSET..LBAFE_OFFSET + 8], &8u64.to_le_bytes());
        assert_eq!(bytes[LBAFE_OFFSET + 8], 2);
    }
}
