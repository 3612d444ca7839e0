//! Device statistics
//!
//! Lock-free counters updated by the controller on every command and read
//! back as a serializable snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::zns::{Namespace, ZoneState};

/// Counters for one device.
#[derive(Debug, Default)]
pub struct ZnsStats {
    /// Reads completed successfully
    pub reads_total: AtomicU64,

    /// Writes completed successfully (regular writes only)
    pub writes_total: AtomicU64,

    /// Zone appends completed successfully
    pub appends_total: AtomicU64,

    /// Write zeroes completed successfully
    pub write_zeroes_total: AtomicU64,

    /// Bytes moved to the host
    pub bytes_read: AtomicU64,

    /// Bytes accepted from the host (including zeroes)
    pub bytes_written: AtomicU64,

    /// Zone management send commands completed
    pub mgmt_send_total: AtomicU64,

    /// Zone reports generated
    pub reports_total: AtomicU64,

    /// Zones reset (erases charged)
    pub resets_total: AtomicU64,

    /// Implicitly open zones closed to make room
    pub auto_closes_total: AtomicU64,

    /// Commands completed with an error status
    pub errors_total: AtomicU64,

    /// Largest modelled latency seen, in nanoseconds
    pub max_latency_ns: AtomicU64,
}

impl ZnsStats {
    /// Record a successful read.
    pub fn record_read(&self, bytes: u64, latency_ns: u64) {
        self.reads_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    /// Record a successful write of any kind.
    pub fn record_write(&self, kind: WriteKind, bytes: u64, latency_ns: u64) {
        let counter = match kind {
            WriteKind::Write => &self.writes_total,
            WriteKind::Append => &self.appends_total,
            WriteKind::Zeroes => &self.write_zeroes_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    /// Record a completed management send.
    pub fn record_mgmt(&self, resets: u64, latency_ns: u64) {
        self.mgmt_send_total.fetch_add(1, Ordering::Relaxed);
        self.resets_total.fetch_add(resets, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    pub fn record_report(&self) {
        self.reports_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auto_close(&self) {
        self.auto_closes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, latency_ns: u64) {
        self.max_latency_ns.fetch_max(latency_ns, Ordering::Relaxed);
    }

    /// Get a snapshot of the counters together with the zone state census
    /// of `namespace`.
    pub fn snapshot(&self, namespace: &Namespace) -> ZnsStatsSnapshot {
        let counters = namespace.counters();
        ZnsStatsSnapshot {
            reads_total: self.reads_total.load(Ordering::Relaxed),
            writes_total: self.writes_total.load(Ordering::Relaxed),
            appends_total: self.appends_total.load(Ordering::Relaxed),
            write_zeroes_total: self.write_zeroes_total.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            mgmt_send_total: self.mgmt_send_total.load(Ordering::Relaxed),
            reports_total: self.reports_total.load(Ordering::Relaxed),
            resets_total: self.resets_total.load(Ordering::Relaxed),
            auto_closes_total: self.auto_closes_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            max_latency_ns: self.max_latency_ns.load(Ordering::Relaxed),
            active_zones: counters.active,
            open_zones: counters.open,
            zones: ZoneCensus::of(namespace),
        }
    }
}

/// Which write command a statistic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Write,
    Append,
    Zeroes,
}

/// Number of zones per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCensus {
    pub empty: u64,
    pub implicitly_open: u64,
    pub explicitly_open: u64,
    pub closed: u64,
    pub full: u64,
    pub read_only: u64,
    pub offline: u64,
}

impl ZoneCensus {
    pub fn of(namespace: &Namespace) -> Self {
        let count = |state| namespace.count_in_state(state) as u64;
        Self {
            empty: count(ZoneState::Empty),
            implicitly_open: count(ZoneState::ImplicitlyOpen),
            explicitly_open: count(ZoneState::ExplicitlyOpen),
            closed: count(ZoneState::Closed),
            full: count(ZoneState::Full),
            read_only: count(ZoneState::ReadOnly),
            offline: count(ZoneState::Offline),
        }
    }

    /// `(state label, count)` pairs in state-code order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> {
        [
            ("empty", self.empty),
            ("implicitly_open", self.implicitly_open),
            ("explicitly_open", self.explicitly_open),
            ("closed", self.closed),
            ("read_only", self.read_only),
            ("full", self.full),
            ("offline", self.offline),
        ]
        .into_iter()
    }
}

/// Snapshot of device statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZnsStatsSnapshot {
    pub reads_total: u64,
    pub writes_total: u64,
    pub appends_total: u64,
    pub write_zeroes_total: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub mgmt_send_total: u64,
    pub reports_total: u64,
    pub resets_total: u64,
    pub auto_closes_total: u64,
    pub errors_total: u64,
    pub max_latency_ns: u64,
    pub active_zones: u32,
    pub open_zones: u32,
    pub zones: ZoneCensus,
}
