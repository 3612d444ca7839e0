//! Error types for the ZNS device model

use thiserror::Error;

use crate::zns::{ZoneEvent, ZoneState};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// NVMe completion status values surfaced to the protocol layer.
///
/// Values are bit-compatible with the NVMe base and ZNS command sets, so a
/// protocol layer can post them as-is.
pub mod status {
    pub const SUCCESS: u16 = 0x0000;
    pub const INVALID_FIELD: u16 = 0x0002;
    pub const INTERNAL: u16 = 0x0006;
    pub const LBA_RANGE: u16 = 0x0080;
    pub const ZONE_BOUNDARY_ERROR: u16 = 0x01b8;
    pub const ZONE_FULL: u16 = 0x01b9;
    pub const ZONE_READ_ONLY: u16 = 0x01ba;
    pub const ZONE_OFFLINE: u16 = 0x01bb;
    pub const ZONE_INVALID_WRITE: u16 = 0x01bc;
    pub const ZONE_TOO_MANY_ACTIVE: u16 = 0x01bd;
    pub const ZONE_TOO_MANY_OPEN: u16 = 0x01be;
    pub const ZONE_INVALID_TRANSITION: u16 = 0x01bf;

    /// Do Not Retry
    pub const DNR: u16 = 0x4000;
}

/// Errors that can occur in the ZNS device model
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration parse error
    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (fatal at initialization)
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Zone Errors
    // =========================================================================
    /// Request crosses the zone write or read boundary
    #[error("Zone boundary error: LBA range {slba}+{nlb} crosses the boundary of zone {zone}")]
    ZoneBoundary { zone: u32, slba: u64, nlb: u64 },

    /// Action is not defined for the zone's current state
    #[error("Invalid zone state transition: {event} on zone {zone} in state {state}")]
    InvalidStateTransition {
        zone: u32,
        state: ZoneState,
        event: ZoneEvent,
    },

    /// Zone is full
    #[error("Zone {zone} is full")]
    ZoneFull { zone: u32 },

    /// Zone is offline
    #[error("Zone {zone} is offline")]
    ZoneOffline { zone: u32 },

    /// Zone is read-only
    #[error("Zone {zone} is read-only")]
    ZoneReadOnly { zone: u32 },

    /// Write does not land at the zone's write pointer
    #[error("Invalid write to zone {zone}: slba {slba} is not the write pointer {write_pointer}")]
    ZoneInvalidWrite {
        zone: u32,
        slba: u64,
        write_pointer: u64,
    },

    /// Malformed command field
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Active zone limit reached
    #[error("Too many active zones (limit {limit})")]
    TooManyActiveZones { limit: u32 },

    /// Open zone limit reached
    #[error("Too many open zones (limit {limit})")]
    TooManyOpenZones { limit: u32 },

    /// LBA range beyond namespace capacity
    #[error("LBA out of range: {slba}+{nlb} exceeds namespace size {nsze}")]
    LbaRange { slba: u64, nlb: u64, nsze: u64 },

    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// Backend byte transfer failed
    #[error("Backend transfer failed at segment {segment}: {reason}")]
    BackendTransfer { segment: usize, reason: String },

    /// Malformed trace record
    #[error("Trace line {line}: {reason}")]
    Trace { line: usize, reason: String },

    /// Metrics registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// NVMe status code for this error, without the DNR bit.
    pub fn status(&self) -> u16 {
        match self {
            Error::ZoneBoundary { .. } => status::ZONE_BOUNDARY_ERROR,
            Error::InvalidStateTransition { .. } => status::ZONE_INVALID_TRANSITION,
            Error::ZoneFull { .. } => status::ZONE_FULL,
            Error::ZoneOffline { .. } => status::ZONE_OFFLINE,
            Error::ZoneReadOnly { .. } => status::ZONE_READ_ONLY,
            Error::ZoneInvalidWrite { .. } => status::ZONE_INVALID_WRITE,
            Error::InvalidField(_) => status::INVALID_FIELD,
            Error::TooManyActiveZones { .. } => status::ZONE_TOO_MANY_ACTIVE,
            Error::TooManyOpenZones { .. } => status::ZONE_TOO_MANY_OPEN,
            Error::LbaRange { .. } => status::LBA_RANGE,
            _ => status::INTERNAL,
        }
    }

    /// Status code as posted in the completion queue entry.
    ///
    /// Every zone error is permanent until some external state changes, so
    /// all of them carry the Do Not Retry bit.
    pub fn status_code(&self) -> u16 {
        self.status() | status::DNR
    }

    /// Whether this error was raised by the device model (as opposed to
    /// host-side configuration or I/O).
    pub fn is_device_status(&self) -> bool {
        self.status() != status::INTERNAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_carry_dnr() {
        let err = Error::ZoneFull { zone: 3 };
        assert_eq!(err.status(), status::ZONE_FULL);
        assert_eq!(err.status_code(), 0x41b9);

        let err = Error::LbaRange {
            slba: 10,
            nlb: 1,
            nsze: 8,
        };
        assert_eq!(err.status_code(), 0x4080);
    }

    #[test]
    fn test_host_errors_map_to_internal() {
        let err = Error::Config("bad".into());
        assert_eq!(err.status(), status::INTERNAL);
        assert!(!err.is_device_status());
        assert!(Error::InvalidField("x".into()).is_device_status());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::InvalidStateTransition {
            zone: 2,
            state: ZoneState::Full,
            event: ZoneEvent::Close,
        };
        let msg = err.to_string();
        assert!(msg.contains("zone 2"));
        assert!(msg.contains("Full"));
        assert!(msg.contains("Close"));
    }
}
