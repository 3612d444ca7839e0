//! ZNS SSD device model
//!
//! A zoned-namespace SSD modelled behind an NVMe-style command interface:
//! per-zone state machines with active/open resource limits, sequential
//! write and append admission, zone management and reporting, a NAND
//! timing model that estimates command latency, and a DRAM store that
//! holds the logical space.
//!
//! # Architecture
//!
//! ```text
//!   Command ──▶ ZnsController ──▶ zns::Namespace   (state, wp, aor, queues)
//!                    │         ──▶ nand::NandModel  (latency)
//!                    │         ──▶ backend::DramBackend (bytes)
//!                    └────────▶ stats::ZnsStats ──▶ metrics::ZnsMetrics
//! ```
//!
//! # Modules
//!
//! - [`zns`] - Zone state machine, resource accounting, I/O admission,
//!   management and reports
//! - [`nand`] - NAND timing model and clocks
//! - [`backend`] - Scatter-gather transfer engine and DRAM store
//! - [`controller`] - Command dispatch and completion status
//! - [`config`] - Device configuration
//! - [`stats`] - Command counters
//! - [`metrics`] - Prometheus export
//! - [`trace`] - JSON-lines command trace replay
//! - [`error`] - Error types and NVMe status codes

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod nand;
pub mod stats;
pub mod trace;
pub mod zns;

// Re-export commonly used types
pub use config::{TimingConfig, ZnsConfig};
pub use controller::{Command, Completion, IoRequest, ZnsController, ZnsDevice};
pub use error::{Error, Result};
pub use metrics::ZnsMetrics;
pub use stats::{ZnsStats, ZnsStatsSnapshot};
pub use trace::{parse_trace, TraceOp, TraceRecord, TraceRunner};
pub use zns::{Namespace, ZoneAction, ZoneGeometry, ZoneState};
