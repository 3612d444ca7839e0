//! Prometheus export of device statistics
//!
//! Metrics live in a private registry so several devices (or tests) can
//! coexist in one process. [`ZnsMetrics::observe`] copies a statistics
//! snapshot into the gauges; [`ZnsMetrics::encode_text`] renders the text
//! exposition format.

use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};
use crate::stats::ZnsStatsSnapshot;

/// Gauges mirroring [`ZnsStatsSnapshot`].
#[derive(Clone)]
pub struct ZnsMetrics {
    registry: Registry,
    commands: IntGaugeVec,
    bytes: IntGaugeVec,
    resets: IntGauge,
    auto_closes: IntGauge,
    errors: IntGauge,
    max_latency: IntGauge,
    resources: IntGaugeVec,
    zones: IntGaugeVec,
}

impl std::fmt::Debug for ZnsMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZnsMetrics").finish_non_exhaustive()
    }
}

impl ZnsMetrics {
    /// Create the gauges and register them under the `zns_` prefix.
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("zns".into()), None)?;

        let commands = IntGaugeVec::new(
            Opts::new("commands_total", "Commands completed successfully"),
            &["kind"],
        )?;
        let bytes = IntGaugeVec::new(
            Opts::new("bytes_total", "Bytes transferred"),
            &["direction"],
        )?;
        let resets = IntGauge::new("zone_resets_total", "Zones reset")?;
        let auto_closes = IntGauge::new(
            "auto_closes_total",
            "Implicitly open zones closed to make room",
        )?;
        let errors = IntGauge::new("errors_total", "Commands failed")?;
        let max_latency = IntGauge::new(
            "max_latency_nanoseconds",
            "Largest modelled command latency",
        )?;
        let resources = IntGaugeVec::new(
            Opts::new("resources", "Zones holding active or open resources"),
            &["resource"],
        )?;
        let zones = IntGaugeVec::new(Opts::new("zones", "Zones per state"), &["state"])?;

        registry.register(Box::new(commands.clone()))?;
        registry.register(Box::new(bytes.clone()))?;
        registry.register(Box::new(resets.clone()))?;
        registry.register(Box::new(auto_closes.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(max_latency.clone()))?;
        registry.register(Box::new(resources.clone()))?;
        registry.register(Box::new(zones.clone()))?;

        Ok(Self {
            registry,
            commands,
            bytes,
            resets,
            auto_closes,
            errors,
            max_latency,
            resources,
            zones,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Copy `snapshot` into the gauges.
    pub fn observe(&self, snapshot: &ZnsStatsSnapshot) {
        let commands = [
            ("read", snapshot.reads_total),
            ("write", snapshot.writes_total),
            ("append", snapshot.appends_total),
            ("write_zeroes", snapshot.write_zeroes_total),
            ("mgmt_send", snapshot.mgmt_send_total),
            ("mgmt_recv", snapshot.reports_total),
        ];
        for (kind, count) in commands {
            self.commands.with_label_values(&[kind]).set(gauge(count));
        }

        self.bytes
            .with_label_values(&["read"])
            .set(gauge(snapshot.bytes_read));
        self.bytes
            .with_label_values(&["write"])
            .set(gauge(snapshot.bytes_written));

        self.resets.set(gauge(snapshot.resets_total));
        self.auto_closes.set(gauge(snapshot.auto_closes_total));
        self.errors.set(gauge(snapshot.errors_total));
        self.max_latency.set(gauge(snapshot.max_latency_ns));

        self.resources
            .with_label_values(&["active"])
            .set(i64::from(snapshot.active_zones));
        self.resources
            .with_label_values(&["open"])
            .set(i64::from(snapshot.open_zones));

        for (state, count) in snapshot.zones.iter() {
            self.zones.with_label_values(&[state]).set(gauge(count));
        }
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| Error::Internal(format!("metrics output is not UTF-8: {}", e)))
    }
}

fn gauge(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
