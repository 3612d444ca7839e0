//! ZNS device controller
//!
//! Entry points for the protocol layer. Each command runs to completion
//! under `&mut self`; [`ZnsDevice`] wraps a controller in a mutex so commands
//! from several submitters are serialized one at a time.
//!
//! ```text
//!   read          mdts ─▶ admission ─▶ store → host ─▶ NAND read timing
//!   write/append  mdts ─▶ admission ─▶ host → store ─▶ commit ─▶ NAND write timing
//!   write zeroes         admission ─▶ zero store  ─▶ commit ─▶ NAND write timing
//!   mgmt send     zone actions ─▶ NAND erase timing for resets
//!   mgmt receive  report ─▶ host
//! ```

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::backend::{Direction, DramBackend, HostMemory, ScatterList};
use crate::config::ZnsConfig;
use crate::error::{status, Error, Result};
use crate::nand::{Clock, NandModel, NandOp, SystemClock};
use crate::stats::{WriteKind, ZnsStats, ZnsStatsSnapshot};
use crate::zns::{
    Namespace, ZoneAction, ZoneGeometry, ZoneMgmtRecv, ZoneMgmtSend, ZoneReport, ZonedIdentify,
};

// =============================================================================
// Requests and Completions
// =============================================================================

/// A read, write or append command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoRequest {
    /// Starting LBA (the zone start for appends)
    pub slba: u64,

    /// Number of logical blocks (at least one)
    pub nlb: u32,

    /// Submission time in nanoseconds; 0 means "now"
    pub stime: u64,

    /// Host memory holding (or receiving) the data
    pub sg: ScatterList,
}

/// Successful read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoCompletion {
    /// First LBA the data occupies; for appends, the LBA assigned
    pub slba: u64,

    /// Modelled media latency in nanoseconds
    pub latency_ns: u64,
}

/// Successful zone management send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MgmtCompletion {
    /// Zones the action was applied to
    pub processed: u32,

    /// Zones reset (erased)
    pub resets: u32,

    /// Slowest erase charged, in nanoseconds
    pub latency_ns: u64,
}

/// Any device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read(IoRequest),
    Write(IoRequest),
    Append(IoRequest),
    WriteZeroes { slba: u64, nlb: u32, stime: u64 },
    ZoneMgmtSend(ZoneMgmtSend),
    /// The report is copied into host memory through `sg`
    ZoneMgmtRecv { req: ZoneMgmtRecv, sg: ScatterList },
}

/// Status-level completion posted back to the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// NVMe status including the DNR bit; 0 on success
    pub status: u16,

    /// Assigned LBA of a zone append
    pub result_slba: Option<u64>,

    pub latency_ns: u64,
}

impl Completion {
    fn success(result_slba: Option<u64>, latency_ns: u64) -> Self {
        Self {
            status: status::SUCCESS,
            result_slba,
            latency_ns,
        }
    }

    fn failure(err: &Error) -> Self {
        Self {
            status: err.status_code(),
            result_slba: None,
            latency_ns: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == status::SUCCESS
    }
}

// =============================================================================
// Controller
// =============================================================================

/// One zoned namespace with its media model and backing store.
pub struct ZnsController {
    geometry: ZoneGeometry,
    namespace: Namespace,
    nand: NandModel,
    backend: DramBackend,
    clock: Arc<dyn Clock>,
    stats: Arc<ZnsStats>,
}

impl std::fmt::Debug for ZnsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZnsController")
            .field("geometry", &self.geometry)
            .field("counters", &self.namespace.counters())
            .finish()
    }
}

impl ZnsController {
    /// Build a controller on the wall clock.
    pub fn new(config: &ZnsConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a controller on a caller-supplied clock.
    pub fn with_clock(config: &ZnsConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let geometry = ZoneGeometry::new(config)?;
        let store_size = usize::try_from(geometry.blocks_to_bytes(geometry.nsze()))
            .map_err(|_| Error::Config("namespace too large for this host".into()))?;

        let controller = Self {
            namespace: Namespace::new(geometry.clone()),
            nand: NandModel::new(&config.timing),
            backend: DramBackend::new(store_size, config.mode, config.backend_failure_policy),
            clock,
            stats: Arc::new(ZnsStats::default()),
            geometry,
        };

        info!(
            "ZNS controller ready: {} zones, {} channels x {} dies",
            controller.geometry.num_zones,
            config.timing.num_channels,
            config.timing.dies_per_channel
        );
        Ok(controller)
    }

    pub fn geometry(&self) -> &ZoneGeometry {
        &self.geometry
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn nand(&self) -> &NandModel {
        &self.nand
    }

    pub fn backend(&self) -> &DramBackend {
        &self.backend
    }

    pub fn stats(&self) -> Arc<ZnsStats> {
        self.stats.clone()
    }

    pub fn stats_snapshot(&self) -> ZnsStatsSnapshot {
        self.stats.snapshot(&self.namespace)
    }

    /// Zoned identify namespace data.
    pub fn identify(&self) -> ZonedIdentify {
        self.geometry.identify()
    }

    fn resolve_stime(&self, stime: u64) -> u64 {
        if stime == 0 {
            self.clock.now_ns()
        } else {
            stime
        }
    }

    fn record<T>(&self, op: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.stats.record_error();
            if e.is_device_status() {
                debug!("{} failed: {}", op, e);
            } else {
                warn!("{} failed: {}", op, e);
            }
        }
        result
    }

    /// Store offsets for a transfer starting at `offset`. Open-channel
    /// stores take one offset per segment.
    fn segment_offsets(&self, offset: u64, sg: &ScatterList) -> Vec<u64> {
        if self.backend.mode().is_sequential() {
            return vec![offset];
        }
        sg.segments()
            .iter()
            .scan(offset, |next, seg| {
                let this = *next;
                *next += seg.len;
                Some(this)
            })
            .collect()
    }

    fn check_data_len(sg: &ScatterList, bytes: u64) -> Result<()> {
        if sg.total_len() != bytes {
            return Err(Error::InvalidField(format!(
                "data buffer of {}B does not match transfer of {}B",
                sg.total_len(),
                bytes
            )));
        }
        Ok(())
    }

    fn check_nlb(nlb: u32) -> Result<u64> {
        if nlb == 0 {
            return Err(Error::InvalidField("zero-length transfer".into()));
        }
        Ok(u64::from(nlb))
    }

    // =========================================================================
    // I/O Commands
    // =========================================================================

    /// Read `req.nlb` blocks into host memory.
    #[instrument(skip(self, req, host), fields(slba = req.slba, nlb = req.nlb))]
    pub fn read(&mut self, req: &IoRequest, host: &mut dyn HostMemory) -> Result<IoCompletion> {
        let result = self.do_read(req, host);
        self.record("read", result)
    }

    fn do_read(&mut self, req: &IoRequest, host: &mut dyn HostMemory) -> Result<IoCompletion> {
        let nlb = Self::check_nlb(req.nlb)?;
        let bytes = self.geometry.blocks_to_bytes(nlb);
        self.geometry.check_mdts(bytes)?;
        self.namespace.check_read(req.slba, nlb)?;
        Self::check_data_len(&req.sg, bytes)?;

        let offsets = self.segment_offsets(self.geometry.lba_to_offset(req.slba), &req.sg);
        self.backend
            .rw(host, &req.sg, &offsets, Direction::FromDevice)?;

        let stime = self.resolve_stime(req.stime);
        let geometry = &self.geometry;
        let latency_ns =
            self.nand
                .request_latency(NandOp::Read, req.slba, nlb, stime, |lba| geometry.zone_index(lba));

        self.stats.record_read(bytes, latency_ns);
        Ok(IoCompletion {
            slba: req.slba,
            latency_ns,
        })
    }

    /// Write `req.nlb` blocks at the zone's write pointer.
    #[instrument(skip(self, req, host), fields(slba = req.slba, nlb = req.nlb))]
    pub fn write(&mut self, req: &IoRequest, host: &mut dyn HostMemory) -> Result<IoCompletion> {
        let result = self.do_write(
            req.slba,
            req.nlb,
            req.stime,
            WriteKind::Write,
            Some((&req.sg, host)),
        );
        self.record("write", result)
    }

    /// Append `req.nlb` blocks to the zone starting at `req.slba`. The
    /// completion carries the LBA the data landed at.
    #[instrument(skip(self, req, host), fields(slba = req.slba, nlb = req.nlb))]
    pub fn append(&mut self, req: &IoRequest, host: &mut dyn HostMemory) -> Result<IoCompletion> {
        let result = self.do_write(
            req.slba,
            req.nlb,
            req.stime,
            WriteKind::Append,
            Some((&req.sg, host)),
        );
        self.record("zone append", result)
    }

    /// Write zeroes: a write without a data buffer.
    #[instrument(skip(self))]
    pub fn write_zeroes(&mut self, slba: u64, nlb: u32, stime: u64) -> Result<IoCompletion> {
        let result = self.do_write(slba, nlb, stime, WriteKind::Zeroes, None);
        self.record("write zeroes", result)
    }

    fn do_write(
        &mut self,
        slba: u64,
        nlb: u32,
        stime: u64,
        kind: WriteKind,
        data: Option<(&ScatterList, &mut dyn HostMemory)>,
    ) -> Result<IoCompletion> {
        let nlb = Self::check_nlb(nlb)?;
        let bytes = self.geometry.blocks_to_bytes(nlb);
        if kind != WriteKind::Zeroes {
            self.geometry.check_mdts(bytes)?;
        }
        if let Some((sg, _)) = &data {
            Self::check_data_len(sg, bytes)?;
        }

        let prepared = self
            .namespace
            .prepare_write(slba, nlb, kind == WriteKind::Append)?;
        if prepared.evicted.is_some() {
            self.stats.record_auto_close();
        }

        let offset = self.geometry.lba_to_offset(prepared.start);
        match data {
            Some((sg, host)) => {
                let offsets = self.segment_offsets(offset, sg);
                self.backend.rw(host, sg, &offsets, Direction::ToDevice)?;
            }
            None => self.backend.zero(offset, bytes)?,
        }

        let commit = self.namespace.commit_write(&prepared)?;

        let stime = self.resolve_stime(stime);
        let geometry = &self.geometry;
        let latency_ns = self.nand.request_latency(
            NandOp::Write,
            prepared.start,
            nlb,
            stime,
            |lba| geometry.zone_index(lba),
        );

        self.stats.record_write(kind, bytes, latency_ns);
        Ok(IoCompletion {
            slba: commit.slba,
            latency_ns,
        })
    }

    // =========================================================================
    // Zone Management
    // =========================================================================

    /// Execute a zone management send command. Resets charge an erase of
    /// the zone's block on every die.
    #[instrument(skip(self, cmd), fields(action = %cmd.action))]
    pub fn zone_mgmt_send(&mut self, cmd: &ZoneMgmtSend) -> Result<MgmtCompletion> {
        let now = self.clock.now_ns();
        let mut latency_ns = 0;
        let nand = &mut self.nand;
        let result = self.namespace.zone_mgmt_send(cmd, |zone| {
            latency_ns = latency_ns.max(nand.erase_zone(zone, now));
        });

        let result = result.map(|outcome| {
            self.stats
                .record_mgmt(u64::from(outcome.deferred), latency_ns);
            MgmtCompletion {
                processed: outcome.processed,
                resets: outcome.deferred,
                latency_ns,
            }
        });
        self.record("zone management send", result)
    }

    /// Generate a zone report.
    #[instrument(skip(self, req), fields(slba = req.slba))]
    pub fn zone_mgmt_recv(&mut self, req: &ZoneMgmtRecv) -> Result<ZoneReport> {
        let result = self.namespace.zone_report(req);
        if result.is_ok() {
            self.stats.record_report();
        }
        self.record("zone management receive", result)
    }

    /// Media event: zone `index` can no longer be written.
    pub fn mark_read_only(&mut self, index: u32) -> Result<()> {
        self.namespace.mark_read_only(index).map(|_| ())
    }

    /// Release open zones before the device goes away.
    pub fn shutdown(&mut self) -> Result<()> {
        self.namespace.shutdown()?;
        info!("ZNS controller shut down");
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Run any command and fold the outcome into a status completion.
    pub fn execute(&mut self, cmd: &Command, host: &mut dyn HostMemory) -> Completion {
        let result = match cmd {
            Command::Read(req) => self.read(req, host).map(|c| Completion::success(None, c.latency_ns)),
            Command::Write(req) => self
                .write(req, host)
                .map(|c| Completion::success(None, c.latency_ns)),
            Command::Append(req) => self
                .append(req, host)
                .map(|c| Completion::success(Some(c.slba), c.latency_ns)),
            Command::WriteZeroes { slba, nlb, stime } => self
                .write_zeroes(*slba, *nlb, *stime)
                .map(|c| Completion::success(None, c.latency_ns)),
            Command::ZoneMgmtSend(send) => self
                .zone_mgmt_send(send)
                .map(|c| Completion::success(None, c.latency_ns)),
            Command::ZoneMgmtRecv { req, sg } => self
                .zone_mgmt_recv(req)
                .and_then(|report| copy_to_host(host, sg, &report.to_bytes()))
                .map(|_| Completion::success(None, 0)),
        };

        result.unwrap_or_else(|e| Completion::failure(&e))
    }
}

/// Copy `data` into host memory along `sg`, stopping when either runs out.
fn copy_to_host(host: &mut dyn HostMemory, sg: &ScatterList, data: &Bytes) -> Result<()> {
    let mut remaining = &data[..];
    for segment in sg.segments() {
        if remaining.is_empty() {
            break;
        }
        let take = remaining.len().min(segment.len as usize);
        host.write(segment.addr, &remaining[..take])?;
        remaining = &remaining[take..];
    }
    Ok(())
}

// =============================================================================
// Shared Device Handle
// =============================================================================

/// Cloneable handle that serializes commands onto one controller.
#[derive(Debug, Clone)]
pub struct ZnsDevice {
    inner: Arc<Mutex<ZnsController>>,
}

impl ZnsDevice {
    pub fn new(controller: ZnsController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Run one command to completion.
    pub fn execute(&self, cmd: &Command, host: &mut dyn HostMemory) -> Completion {
        self.inner.lock().execute(cmd, host)
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with<R>(&self, f: impl FnOnce(&mut ZnsController) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn stats_snapshot(&self) -> ZnsStatsSnapshot {
        self.inner.lock().stats_snapshot()
    }

    /// Convenience for bulk reset, used when recycling a device.
    pub fn reset_all(&self) -> Result<MgmtCompletion> {
        self.inner.lock().zone_mgmt_send(&ZoneMgmtSend::new(
            ZoneAction::Reset,
            crate::zns::ZoneTarget::All,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FlatHostMemory;
    use crate::config::TimingConfig;
    use crate::nand::ManualClock;
    use crate::zns::{ReportFilter, ZoneState, ZoneTarget};

    const BLOCK: u64 = 4096;

    fn config() -> ZnsConfig {
        ZnsConfig {
            namespace_size: 4 * 8 * BLOCK,
            zone_size: 8 * BLOCK,
            timing: TimingConfig {
                num_channels: 2,
                dies_per_channel: 1,
                blocks_per_die: 4,
                read_latency_ns: 40,
                write_latency_ns: 200,
                erase_latency_ns: 2000,
                lbas_per_page: 1,
            },
            ..Default::default()
        }
    }

    fn controller() -> (ZnsController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctrl = ZnsController::with_clock(&config(), clock.clone()).unwrap();
        (ctrl, clock)
    }

    fn io(slba: u64, nlb: u32) -> IoRequest {
        IoRequest {
            slba,
            nlb,
            stime: 0,
            sg: ScatterList::contiguous(0, u64::from(nlb) * BLOCK, BLOCK),
        }
    }

    fn host_with(fill: u8, blocks: usize) -> FlatHostMemory {
        let mut host = FlatHostMemory::new(0, blocks * BLOCK as usize);
        host.as_mut_slice().fill(fill);
        host
    }

    #[test]
    fn test_write_then_read_back() {
        let (mut ctrl, _) = controller();
        let mut host = host_with(0xaa, 2);

        let done = ctrl.write(&io(0, 2), &mut host).unwrap();
        assert_eq!(done.slba, 0);
        // Two single-block pages on two idle channels
        assert_eq!(done.latency_ns, 200);

        let mut out = host_with(0, 2);
        ctrl.read(&io(0, 2), &mut out).unwrap();
        assert!(out.as_slice().iter().all(|&b| b == 0xaa));
    }

    #[test]
    fn test_append_lands_at_write_pointer() {
        let (mut ctrl, _) = controller();
        let mut host = host_with(1, 1);
        ctrl.write(&io(8, 1), &mut host).unwrap();

        let mut host = host_with(2, 2);
        let done = ctrl.append(&io(8, 2), &mut host).unwrap();
        assert_eq!(done.slba, 9);
        assert_eq!(ctrl.backend().as_slice()[9 * BLOCK as usize], 2);
        assert_eq!(ctrl.namespace().zone(1).unwrap().write_pointer, 11);
    }

    #[test]
    fn test_failed_transfer_leaves_write_pointer() {
        let (mut ctrl, _) = controller();
        // Host window too small for the buffer the command describes
        let mut host = FlatHostMemory::new(0, BLOCK as usize);

        let err = ctrl.write(&io(0, 2), &mut host).unwrap_err();
        assert!(matches!(err, Error::BackendTransfer { .. }));
        let zone = ctrl.namespace().zone(0).unwrap();
        assert_eq!(zone.write_pointer, 0);
        assert_eq!(zone.state, ZoneState::Empty);
        assert_eq!(ctrl.stats_snapshot().errors_total, 1);
    }

    #[test]
    fn test_short_buffer_rejected_before_eviction() {
        let mut cfg = config();
        cfg.max_open_zones = 1;
        let mut ctrl = ZnsController::with_clock(&cfg, Arc::new(ManualClock::new(0))).unwrap();
        ctrl.write(&io(0, 1), &mut host_with(1, 1)).unwrap();

        // Two blocks described by a one-block scatter list
        let req = IoRequest {
            sg: ScatterList::contiguous(0, BLOCK, BLOCK),
            ..io(8, 2)
        };
        let err = ctrl.write(&req, &mut host_with(2, 2)).unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));

        assert_eq!(
            ctrl.namespace().zone(0).unwrap().state,
            ZoneState::ImplicitlyOpen
        );
        assert_eq!(ctrl.namespace().zone(1).unwrap().state, ZoneState::Empty);
        assert_eq!(ctrl.stats_snapshot().auto_closes_total, 0);
    }

    #[test]
    fn test_write_zeroes_skips_mdts() {
        let mut cfg = config();
        cfg.mdts = 1;
        let mut ctrl = ZnsController::with_clock(&cfg, Arc::new(ManualClock::new(0))).unwrap();
        let mut host = host_with(0, 8);

        assert!(matches!(
            ctrl.write(&io(0, 3), &mut host),
            Err(Error::InvalidField(_))
        ));
        let done = ctrl.write_zeroes(0, 8, 0).unwrap();
        assert_eq!(done.slba, 0);
        assert_eq!(ctrl.namespace().zone(0).unwrap().state, ZoneState::Full);
    }

    #[test]
    fn test_zero_length_rejected() {
        let (mut ctrl, _) = controller();
        let mut host = host_with(0, 1);
        assert!(matches!(
            ctrl.read(&io(0, 0), &mut host),
            Err(Error::InvalidField(_))
        ));
    }

    #[test]
    fn test_reset_charges_erase() {
        let (mut ctrl, _) = controller();
        let mut host = host_with(0, 1);
        ctrl.write(&io(0, 1), &mut host).unwrap();

        let done = ctrl
            .zone_mgmt_send(&ZoneMgmtSend::new(ZoneAction::Reset, ZoneTarget::Zone(0)))
            .unwrap();
        assert_eq!(done.resets, 1);
        // The die that took the write is busy until 1200, then erases
        assert_eq!(done.latency_ns, 2200);

        let done = ctrl
            .zone_mgmt_send(&ZoneMgmtSend::new(ZoneAction::Close, ZoneTarget::All))
            .unwrap();
        assert_eq!(done.latency_ns, 0);
        assert_eq!(done.processed, 0);
    }

    #[test]
    fn test_execute_maps_status() {
        let (mut ctrl, _) = controller();
        let mut host = host_with(0, 2);

        let done = ctrl.execute(&Command::Write(io(3, 1)), &mut host);
        assert_eq!(done.status, status::ZONE_INVALID_WRITE | status::DNR);

        let done = ctrl.execute(&Command::Append(io(0, 1)), &mut host);
        assert!(done.is_success());
        assert_eq!(done.result_slba, Some(0));

        let done = ctrl.execute(
            &Command::ZoneMgmtSend(ZoneMgmtSend::new(ZoneAction::Close, ZoneTarget::Zone(8))),
            &mut host,
        );
        assert_eq!(done.status, status::ZONE_INVALID_TRANSITION | status::DNR);
    }

    #[test]
    fn test_execute_report_into_host() {
        let (mut ctrl, _) = controller();
        let mut host = host_with(0xff, 1);
        let req = ZoneMgmtRecv {
            slba: 0,
            filter: ReportFilter::All,
            extended: false,
            partial: false,
            byte_budget: 128,
        };

        let done = ctrl.execute(
            &Command::ZoneMgmtRecv {
                req,
                sg: ScatterList::contiguous(0, 128, 64),
            },
            &mut host,
        );
        assert!(done.is_success());
        assert_eq!(&host.as_slice()[0..8], &4u64.to_le_bytes());
        assert_eq!(host.as_slice()[64], 0x2);
        assert_eq!(host.as_slice()[128], 0xff);
    }

    #[test]
    fn test_explicit_stime_is_used() {
        let (mut ctrl, clock) = controller();
        let mut host = host_with(0, 1);
        clock.set(50_000);

        let mut req = io(0, 1);
        req.stime = 10_000;
        let done = ctrl.write(&req, &mut host).unwrap();
        assert_eq!(done.latency_ns, 200);
        assert_eq!(ctrl.nand().die_available_at(0, 0), Some(10_200));
    }

    #[test]
    fn test_open_channel_offsets() {
        let mut cfg = config();
        cfg.mode = crate::backend::DeviceMode::OpenChannel;
        let mut ctrl = ZnsController::with_clock(&cfg, Arc::new(ManualClock::new(0))).unwrap();
        let mut host = FlatHostMemory::new(0, 2 * BLOCK as usize);
        host.as_mut_slice()[BLOCK as usize..].fill(7);

        ctrl.write(&io(0, 2), &mut host).unwrap();
        assert_eq!(ctrl.backend().as_slice()[BLOCK as usize], 7);
        assert_eq!(ctrl.backend().as_slice()[0], 0);
    }

    #[test]
    fn test_device_handle_serializes_submitters() {
        let (ctrl, _) = controller();
        let device = ZnsDevice::new(ctrl);

        let handles: Vec<_> = (0..4u64)
            .map(|zone| {
                let device = device.clone();
                std::thread::spawn(move || {
                    let mut host = host_with(zone as u8, 1);
                    for i in 0..8 {
                        let done = device.execute(&Command::Write(io(zone * 8 + i, 1)), &mut host);
                        assert!(done.is_success());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = device.stats_snapshot();
        assert_eq!(snapshot.writes_total, 32);
        assert_eq!(snapshot.zones.full, 4);

        let done = device.reset_all().unwrap();
        assert_eq!(done.resets, 4);
        device.with(|ctrl| assert_eq!(ctrl.namespace().count_in_state(ZoneState::Empty), 4));
    }
}
