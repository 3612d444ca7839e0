//! Zone descriptors and states

use serde::{Deserialize, Serialize};

/// Zone attribute: zone descriptor extension data is valid.
pub const ZA_ZD_EXT_VALID: u8 = 1 << 7;

/// Write pointer value reported for zones whose pointer is not valid.
pub const WP_INVALID: u64 = u64::MAX;

/// Zone type. The device only exposes sequential-write-required zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ZoneType {
    #[default]
    SequentialWriteRequired,
}

impl ZoneType {
    /// Zone type code as reported in the zone descriptor.
    pub fn code(&self) -> u8 {
        match self {
            ZoneType::SequentialWriteRequired => 0x2,
        }
    }
}

/// State of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ZoneState {
    /// No data written, holds no resources
    #[default]
    Empty,

    /// Opened by a write
    ImplicitlyOpen,

    /// Opened by a management command
    ExplicitlyOpen,

    /// Partially written, holds an active resource only
    Closed,

    /// Write pointer at the capacity boundary
    Full,

    /// Readable, never writable again
    ReadOnly,

    /// Neither readable nor writable
    Offline,
}

impl std::fmt::Display for ZoneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneState::Empty => write!(f, "Empty"),
            ZoneState::ImplicitlyOpen => write!(f, "ImplicitlyOpen"),
            ZoneState::ExplicitlyOpen => write!(f, "ExplicitlyOpen"),
            ZoneState::Closed => write!(f, "Closed"),
            ZoneState::Full => write!(f, "Full"),
            ZoneState::ReadOnly => write!(f, "ReadOnly"),
            ZoneState::Offline => write!(f, "Offline"),
        }
    }
}

impl ZoneState {
    /// Zone state code (the descriptor stores it in the upper nibble).
    pub fn code(&self) -> u8 {
        match self {
            ZoneState::Empty => 0x1,
            ZoneState::ImplicitlyOpen => 0x2,
            ZoneState::ExplicitlyOpen => 0x3,
            ZoneState::Closed => 0x4,
            ZoneState::ReadOnly => 0xd,
            ZoneState::Full => 0xe,
            ZoneState::Offline => 0xf,
        }
    }

    /// Zone counts against the open limit.
    pub fn is_open(&self) -> bool {
        matches!(self, ZoneState::ImplicitlyOpen | ZoneState::ExplicitlyOpen)
    }

    /// Zone counts against the active limit.
    pub fn is_active(&self) -> bool {
        self.is_open() || *self == ZoneState::Closed
    }
}

/// One zone of the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone index
    pub index: u32,

    /// Zone type
    pub zone_type: ZoneType,

    /// Current state
    pub state: ZoneState,

    /// Zone attributes
    pub attributes: u8,

    /// Writable blocks from the zone start
    pub capacity: u64,

    /// Zone start LBA
    pub start_lba: u64,

    /// Next LBA to be written
    pub write_pointer: u64,
}

impl Zone {
    /// Create an empty zone.
    pub fn new(index: u32, start_lba: u64, capacity: u64) -> Self {
        Self {
            index,
            zone_type: ZoneType::SequentialWriteRequired,
            state: ZoneState::Empty,
            attributes: 0,
            capacity,
            start_lba,
            write_pointer: start_lba,
        }
    }

    /// First LBA past the writable range.
    pub fn write_boundary(&self) -> u64 {
        self.start_lba + self.capacity
    }

    /// Blocks still writable.
    pub fn remaining(&self) -> u64 {
        self.write_boundary().saturating_sub(self.write_pointer)
    }

    /// Whether the write pointer carries meaning in the current state.
    pub fn wp_is_valid(&self) -> bool {
        match self.state {
            ZoneState::Empty | ZoneState::Offline => false,
            ZoneState::ReadOnly => self.write_pointer > self.start_lba,
            _ => true,
        }
    }

    /// Write pointer as reported to the host.
    pub fn reported_wp(&self) -> u64 {
        if self.wp_is_valid() {
            self.write_pointer
        } else {
            WP_INVALID
        }
    }

    /// Whether a valid descriptor extension is attached.
    pub fn has_extension(&self) -> bool {
        self.attributes & ZA_ZD_EXT_VALID != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_state_display() {
        assert_eq!(ZoneState::Empty.to_string(), "Empty");
        assert_eq!(ZoneState::ImplicitlyOpen.to_string(), "ImplicitlyOpen");
        assert_eq!(ZoneState::Full.to_string(), "Full");
    }

    #[test]
    fn test_zone_state_codes() {
        assert_eq!(ZoneState::Empty.code(), 1);
        assert_eq!(ZoneState::Closed.code(), 4);
        assert_eq!(ZoneState::ReadOnly.code(), 0xd);
        assert_eq!(ZoneState::Full.code(), 0xe);
        assert_eq!(ZoneState::Offline.code(), 0xf);
    }

    #[test]
    fn test_zone_state_resources() {
        assert!(ZoneState::ImplicitlyOpen.is_open());
        assert!(ZoneState::ExplicitlyOpen.is_active());
        assert!(ZoneState::Closed.is_active());
        assert!(!ZoneState::Closed.is_open());
        assert!(!ZoneState::Full.is_active());
        assert!(!ZoneState::Empty.is_active());
    }

    #[test]
    fn test_zone_creation() {
        let zone = Zone::new(3, 300, 80);
        assert_eq!(zone.index, 3);
        assert_eq!(zone.write_pointer, 300);
        assert_eq!(zone.write_boundary(), 380);
        assert_eq!(zone.remaining(), 80);
        assert_eq!(zone.state, ZoneState::Empty);
    }

    #[test]
    fn test_zone_reported_wp() {
        let mut zone = Zone::new(0, 0, 8);
        assert_eq!(zone.reported_wp(), WP_INVALID);

        zone.state = ZoneState::ImplicitlyOpen;
        zone.write_pointer = 3;
        assert_eq!(zone.reported_wp(), 3);

        zone.state = ZoneState::ReadOnly;
        assert_eq!(zone.reported_wp(), 3);

        zone.state = ZoneState::Offline;
        assert_eq!(zone.reported_wp(), WP_INVALID);
    }
}
