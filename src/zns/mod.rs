//! Zoned namespace model
//!
//! ```text
//!                      ┌───────────────────────────────┐
//!   write / append ───▶│ io: admission, auto-open,     │
//!   read           ───▶│     commit                    │
//!                      ├───────────────────────────────┤
//!   mgmt send      ───▶│ mgmt: single / bulk actions   │──▶ Namespace::apply
//!   mgmt receive   ───▶│ report: descriptors           │        │
//!                      └───────────────────────────────┘        ▼
//!                                                  transition table ─▶ aor check
//!                                                        │
//!                                      zones[] + queues + counters + wp
//! ```

pub mod aor;
pub mod geometry;
pub mod io;
pub mod mgmt;
pub mod namespace;
pub mod queue;
pub mod report;
pub mod transition;
pub mod zone;

#[cfg(test)]
mod proptest;

pub use aor::{ResourceAccountant, ResourceCounters, ResourceDelta};
pub use geometry::{ZoneGeometry, ZonedIdentify, IDENTIFY_SIZE};
pub use io::{PreparedWrite, WriteCommit};
pub use mgmt::{MgmtOutcome, OpStatus, ProcessingMask, ZoneAction, ZoneMgmtSend, ZoneTarget};
pub use namespace::{Applied, Namespace};
pub use queue::{QueueKind, ZoneQueues};
pub use report::{ReportEntry, ReportFilter, ZoneDescriptor, ZoneMgmtRecv, ZoneReport};
pub use transition::{transition, Transition, ZoneEvent};
pub use zone::{Zone, ZoneState, ZoneType, WP_INVALID, ZA_ZD_EXT_VALID};
