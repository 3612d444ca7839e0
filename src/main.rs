//! ZNS device model CLI
//!
//! Replays a JSON-lines command trace against a modelled device and prints
//! one JSON completion record per command.
//!
//! ```text
//! zns-sim --config device.yaml --trace commands.jsonl --metrics
//! cat commands.jsonl | zns-sim --trace -
//! ```

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zns_sim::error::{Error, Result};
use zns_sim::trace::{parse_trace, TraceRunner};
use zns_sim::zns::report::{REPORT_HEADER_SIZE, ZONE_DESCRIPTOR_SIZE};
use zns_sim::zns::{ReportFilter, ZoneMgmtRecv};
use zns_sim::{ZnsConfig, ZnsMetrics};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ZNS SSD device model - replay command traces
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device configuration file (YAML)
    #[arg(long, env = "ZNS_CONFIG")]
    config: Option<PathBuf>,

    /// Command trace (JSON lines), "-" for stdin
    #[arg(long, env = "ZNS_TRACE", default_value = "-")]
    trace: String,

    /// Print Prometheus metrics after the replay
    #[arg(long)]
    metrics: bool,

    /// Print a full zone report after the replay
    #[arg(long)]
    report: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = match &args.config {
        Some(path) => ZnsConfig::from_yaml_file(path)?,
        None => ZnsConfig::default(),
    };
    info!("Starting ZNS device model");
    info!("  Namespace size: {} bytes", config.namespace_size);
    info!("  Zone size: {} bytes", config.zone_size);
    info!(
        "  Zone limits: {} active, {} open",
        config.max_active_zones, config.max_open_zones
    );

    let ops = if args.trace == "-" {
        parse_trace(io::stdin().lock())?
    } else {
        parse_trace(BufReader::new(File::open(&args.trace)?))?
    };
    info!("Loaded {} trace commands", ops.len());

    let mut runner = TraceRunner::new(&config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut failed = 0usize;
    for op in &ops {
        let record = runner.run(op);
        if record.error.is_some() {
            failed += 1;
        }
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
    }
    if failed > 0 {
        warn!("{} of {} commands failed", failed, ops.len());
    }

    if args.report {
        let geometry = runner.controller().geometry();
        let budget = u32::try_from(
            REPORT_HEADER_SIZE + geometry.num_zones as usize * ZONE_DESCRIPTOR_SIZE,
        )
        .map_err(|_| Error::Config("zone report does not fit a single buffer".into()))?;
        let report = runner.controller().namespace().zone_report(&ZoneMgmtRecv {
            slba: 0,
            filter: ReportFilter::All,
            extended: false,
            partial: false,
            byte_budget: budget,
        })?;
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;
    }

    if args.metrics {
        let metrics = ZnsMetrics::new()?;
        metrics.observe(&runner.controller().stats_snapshot());
        write!(out, "{}", metrics.encode_text()?)?;
    }

    info!("Replay complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so stdout carries only completion records
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}
