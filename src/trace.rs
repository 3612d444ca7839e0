//! Command trace replay
//!
//! A trace is a JSON-lines file, one command per line:
//!
//! ```text
//! {"op": "write", "slba": 0, "nlb": 8, "fill": 171}
//! {"op": "append", "slba": 32768, "nlb": 2}
//! {"op": "zone_mgmt_send", "action": "reset"}              # all zones
//! {"op": "zone_mgmt_recv", "slba": 0, "byte_budget": 4096}
//! {"op": "advance", "ns": 1000000}
//! ```
//!
//! Replay runs on a manual clock so latencies are reproducible. Blank lines
//! and lines starting with `#` are skipped.

use std::io::BufRead;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{FlatHostMemory, ScatterList};
use crate::config::{ZnsConfig, PAGE_SIZE};
use crate::controller::{IoRequest, ZnsController};
use crate::error::{status, Error, Result};
use crate::nand::{Clock, ManualClock};
use crate::zns::{ReportFilter, ZoneAction, ZoneMgmtRecv, ZoneMgmtSend, ZoneReport, ZoneTarget};

/// One traced command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceOp {
    Read {
        slba: u64,
        nlb: u32,
        #[serde(default)]
        stime: u64,
        /// Byte every block read back is expected to contain
        #[serde(default)]
        expect_fill: Option<u8>,
    },
    Write {
        slba: u64,
        nlb: u32,
        #[serde(default)]
        stime: u64,
        #[serde(default)]
        fill: u8,
    },
    Append {
        slba: u64,
        nlb: u32,
        #[serde(default)]
        stime: u64,
        #[serde(default)]
        fill: u8,
    },
    WriteZeroes {
        slba: u64,
        nlb: u32,
        #[serde(default)]
        stime: u64,
    },
    ZoneMgmtSend {
        action: ZoneAction,
        /// Zone start LBA; absent selects all zones
        #[serde(default)]
        slba: Option<u64>,
        /// Fill byte of the descriptor extension payload
        #[serde(default)]
        extension_fill: Option<u8>,
    },
    ZoneMgmtRecv {
        slba: u64,
        #[serde(default)]
        filter: ReportFilter,
        #[serde(default)]
        extended: bool,
        #[serde(default)]
        partial: bool,
        byte_budget: u32,
    },
    MarkReadOnly {
        zone: u32,
    },
    /// Move the replay clock forward
    Advance {
        ns: u64,
    },
    Shutdown,
}

impl TraceOp {
    pub fn name(&self) -> &'static str {
        match self {
            TraceOp::Read { .. } => "read",
            TraceOp::Write { .. } => "write",
            TraceOp::Append { .. } => "append",
            TraceOp::WriteZeroes { .. } => "write_zeroes",
            TraceOp::ZoneMgmtSend { .. } => "zone_mgmt_send",
            TraceOp::ZoneMgmtRecv { .. } => "zone_mgmt_recv",
            TraceOp::MarkReadOnly { .. } => "mark_read_only",
            TraceOp::Advance { .. } => "advance",
            TraceOp::Shutdown => "shutdown",
        }
    }
}

/// Parse a JSON-lines trace.
pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceOp>> {
    let mut ops = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let op = serde_json::from_str(trimmed).map_err(|e| Error::Trace {
            line: index + 1,
            reason: e.to_string(),
        })?;
        ops.push(op);
    }
    Ok(ops)
}

/// Outcome of one replayed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub op: String,
    /// NVMe status including DNR; 0 on success
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_slba: Option<u64>,
    pub latency_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_matches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ZoneReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceRecord {
    fn new(op: &TraceOp) -> Self {
        Self {
            op: op.name().to_string(),
            status: status::SUCCESS,
            result_slba: None,
            latency_ns: 0,
            data_matches: None,
            report: None,
            error: None,
        }
    }
}

/// Replays trace commands against one controller.
pub struct TraceRunner {
    controller: ZnsController,
    clock: Arc<ManualClock>,
}

impl TraceRunner {
    pub fn new(config: &ZnsConfig) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(0));
        let controller = ZnsController::with_clock(config, clock.clone())?;
        Ok(Self { controller, clock })
    }

    pub fn controller(&self) -> &ZnsController {
        &self.controller
    }

    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    fn io(&self, slba: u64, nlb: u32, stime: u64) -> (IoRequest, FlatHostMemory) {
        let bytes = self.controller.geometry().blocks_to_bytes(u64::from(nlb));
        let request = IoRequest {
            slba,
            nlb,
            stime,
            sg: ScatterList::contiguous(0, bytes, PAGE_SIZE),
        };
        (request, FlatHostMemory::new(0, bytes as usize))
    }

    /// Replay one command.
    pub fn run(&mut self, op: &TraceOp) -> TraceRecord {
        let mut record = TraceRecord::new(op);
        if let Err(e) = self.dispatch(op, &mut record) {
            record.status = e.status_code();
            record.error = Some(e.to_string());
        }
        debug!("Replayed {}: status {:#x}", record.op, record.status);
        record
    }

    /// Replay every command in order.
    pub fn run_all(&mut self, ops: &[TraceOp]) -> Vec<TraceRecord> {
        ops.iter().map(|op| self.run(op)).collect()
    }

    fn dispatch(&mut self, op: &TraceOp, record: &mut TraceRecord) -> Result<()> {
        match *op {
            TraceOp::Read {
                slba,
                nlb,
                stime,
                expect_fill,
            } => {
                let (req, mut host) = self.io(slba, nlb, stime);
                let done = self.controller.read(&req, &mut host)?;
                record.latency_ns = done.latency_ns;
                record.data_matches =
                    expect_fill.map(|fill| host.as_slice().iter().all(|&b| b == fill));
            }
            TraceOp::Write {
                slba,
                nlb,
                stime,
                fill,
            } => {
                let (req, mut host) = self.io(slba, nlb, stime);
                host.as_mut_slice().fill(fill);
                let done = self.controller.write(&req, &mut host)?;
                record.latency_ns = done.latency_ns;
            }
            TraceOp::Append {
                slba,
                nlb,
                stime,
                fill,
            } => {
                let (req, mut host) = self.io(slba, nlb, stime);
                host.as_mut_slice().fill(fill);
                let done = self.controller.append(&req, &mut host)?;
                record.result_slba = Some(done.slba);
                record.latency_ns = done.latency_ns;
            }
            TraceOp::WriteZeroes { slba, nlb, stime } => {
                let done = self.controller.write_zeroes(slba, nlb, stime)?;
                record.latency_ns = done.latency_ns;
            }
            TraceOp::ZoneMgmtSend {
                action,
                slba,
                extension_fill,
            } => {
                let target = slba.map_or(ZoneTarget::All, ZoneTarget::Zone);
                let mut cmd = ZoneMgmtSend::new(action, target);
                if let Some(fill) = extension_fill {
                    let size = self.controller.geometry().zd_extension_size as usize;
                    cmd.extension = Some(Bytes::from(vec![fill; size]));
                }
                let done = self.controller.zone_mgmt_send(&cmd)?;
                record.latency_ns = done.latency_ns;
            }
            TraceOp::ZoneMgmtRecv {
                slba,
                filter,
                extended,
                partial,
                byte_budget,
            } => {
                let req = ZoneMgmtRecv {
                    slba,
                    filter,
                    extended,
                    partial,
                    byte_budget,
                };
                record.report = Some(self.controller.zone_mgmt_recv(&req)?);
            }
            TraceOp::MarkReadOnly { zone } => self.controller.mark_read_only(zone)?,
            TraceOp::Advance { ns } => self.clock.advance(ns),
            TraceOp::Shutdown => self.controller.shutdown()?,
        }
        Ok(())
    }
}
