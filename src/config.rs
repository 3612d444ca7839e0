//! Device configuration
//!
//! [`ZnsConfig`] is the single source of tunables for a modelled device. It
//! can be built in code (`ZnsConfig::default()` plus field overrides) or
//! loaded from a YAML / JSON file. Sizes are given in bytes, the way a
//! device is described on the command line; the geometry initializer
//! converts them to logical blocks.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::{DeviceMode, FailurePolicy};
use crate::error::{Error, Result};

// =============================================================================
// Constants
// =============================================================================

/// Controller memory page size. Transfer limits are powers of two of it.
pub const PAGE_SIZE: u64 = 4096;

/// Default zone size (128 MiB)
pub const DEFAULT_ZONE_SIZE: u64 = 128 * 1024 * 1024;

/// Default zone append size limit (128 KiB)
pub const DEFAULT_ZASL_BYTES: u64 = 128 * 1024;

/// Default namespace size (1 GiB)
pub const DEFAULT_NAMESPACE_SIZE: u64 = 1024 * 1024 * 1024;

/// Default logical block size
pub const DEFAULT_LBA_SIZE: u32 = 4096;

/// Default maximum data transfer size, as a power of two of [`PAGE_SIZE`]
pub const DEFAULT_MDTS: u8 = 10;

/// Default erase latency (2 ms)
pub const DEFAULT_ERASE_LATENCY_NS: u64 = 2_000_000;

// =============================================================================
// Timing
// =============================================================================

/// NAND array shape and per-operation delays for the timing model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Number of NAND channels
    pub num_channels: u32,

    /// Dies (flash chips) per channel
    pub dies_per_channel: u32,

    /// Blocks tracked per die
    pub blocks_per_die: u32,

    /// Page read delay in nanoseconds
    pub read_latency_ns: u64,

    /// Page program delay in nanoseconds
    pub write_latency_ns: u64,

    /// Block erase delay in nanoseconds
    pub erase_latency_ns: u64,

    /// Logical blocks that share one timing page
    pub lbas_per_page: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            num_channels: 8,
            dies_per_channel: 4,
            blocks_per_die: 32,
            read_latency_ns: 40_000,
            write_latency_ns: 200_000,
            erase_latency_ns: DEFAULT_ERASE_LATENCY_NS,
            lbas_per_page: 4096,
        }
    }
}

impl TimingConfig {
    /// Validate the timing configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_channels == 0 || self.dies_per_channel == 0 {
            return Err(Error::Config(
                "timing model needs at least one channel and one die".into(),
            ));
        }
        if self.blocks_per_die == 0 {
            return Err(Error::Config("blocks_per_die must be > 0".into()));
        }
        if self.lbas_per_page == 0 {
            return Err(Error::Config("lbas_per_page must be > 0".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for a zoned namespace device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZnsConfig {
    /// Namespace size in bytes
    pub namespace_size: u64,

    /// Logical block size in bytes
    pub lba_size: u32,

    /// Zone size in bytes
    pub zone_size: u64,

    /// Zone capacity in bytes (0 = same as zone size)
    pub zone_capacity: u64,

    /// Maximum active zones (0 = unbounded)
    pub max_active_zones: u32,

    /// Maximum open zones (0 = unbounded)
    pub max_open_zones: u32,

    /// Zone descriptor extension size in bytes (0 = disabled)
    pub zd_extension_size: u32,

    /// Allow reads that cross zone boundaries
    pub cross_zone_read: bool,

    /// Zone append size limit in bytes (0 = inherit mdts)
    pub zasl_bytes: u64,

    /// Maximum data transfer size as a power of two of the page size
    /// (0 = unlimited)
    pub mdts: u8,

    /// How the backend store is addressed
    pub mode: DeviceMode,

    /// What a failed segment copy does to the rest of the transfer
    pub backend_failure_policy: FailurePolicy,

    /// NAND timing model
    pub timing: TimingConfig,
}

impl Default for ZnsConfig {
    fn default() -> Self {
        Self {
            namespace_size: DEFAULT_NAMESPACE_SIZE,
            lba_size: DEFAULT_LBA_SIZE,
            zone_size: DEFAULT_ZONE_SIZE,
            zone_capacity: 0,
            max_active_zones: 0,
            max_open_zones: 0,
            zd_extension_size: 0,
            cross_zone_read: false,
            zasl_bytes: DEFAULT_ZASL_BYTES,
            mdts: DEFAULT_MDTS,
            mode: DeviceMode::Zoned,
            backend_failure_policy: FailurePolicy::Abort,
            timing: TimingConfig::default(),
        }
    }
}

impl ZnsConfig {
    /// Create a config with custom zone size.
    pub fn with_zone_size(zone_size: u64) -> Self {
        Self {
            zone_size,
            ..Default::default()
        }
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective zone capacity in bytes.
    pub fn effective_zone_capacity(&self) -> u64 {
        if self.zone_capacity == 0 {
            self.zone_size
        } else {
            self.zone_capacity
        }
    }

    /// Zone append size limit as a power of two of the page size.
    pub fn zasl(&self) -> u8 {
        if self.zasl_bytes == 0 {
            self.mdts
        } else {
            (self.zasl_bytes / PAGE_SIZE).ilog2() as u8
        }
    }

    /// Validate the host-side parameters.
    ///
    /// Zone geometry itself is validated by
    /// [`ZoneGeometry::new`](crate::zns::ZoneGeometry::new).
    pub fn validate(&self) -> Result<()> {
        if self.lba_size < 512 || !self.lba_size.is_power_of_two() {
            return Err(Error::Config(format!(
                "lba_size {} must be a power of 2 and >= 512",
                self.lba_size
            )));
        }
        if self.zasl_bytes != 0 && self.zasl_bytes < PAGE_SIZE {
            return Err(Error::Config(format!(
                "zone append size limit too small ({}B), must be >= {}B",
                self.zasl_bytes, PAGE_SIZE
            )));
        }
        if self.mdts >= 32 || self.zasl() >= 32 {
            return Err(Error::Config("transfer size limit exponent too large".into()));
        }
        self.timing.validate()
    }
}
