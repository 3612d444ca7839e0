//! Backend transfer engine
//!
//! Moves command data between host memory (through a [`HostMemory`]
//! implementation supplied by the caller) and the in-memory store that
//! holds the namespace's logical space.

pub mod dram;
pub mod sg;

use serde::{Deserialize, Serialize};

pub use dram::{DramBackend, TransferReport};
pub use sg::{Direction, FlatHostMemory, HostMemory, ScatterList, SgSegment};

/// How the store offset moves between scatter-gather segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    /// Zoned namespace device
    #[default]
    Zoned,
    /// Black-box SSD
    BlackBox,
    /// No FTL
    NoSsd,
    /// Open-channel SSD: every segment carries its own store offset
    OpenChannel,
}

impl DeviceMode {
    /// Whether consecutive segments land back to back in the store.
    pub fn is_sequential(&self) -> bool {
        !matches!(self, DeviceMode::OpenChannel)
    }
}

/// What a failed segment copy does to the rest of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the command at the first failed segment
    #[default]
    Abort,
    /// Log the failure and keep copying the remaining segments
    BestEffort,
}
