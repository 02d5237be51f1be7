//! # ivbench Writer Binary
//!
//! Host-side peer of the shared-memory benchmark. Maps the backing file,
//! performs the initialisation handshake, runs the requested suites and
//! emits one JSON record per iteration on stdout (logs go to stderr).
//!
//! # Usage
//!
//! ```bash
//! # Both suites with defaults
//! ivbench_writer
//!
//! # 500 latency iterations only
//! ivbench_writer --latency 500
//!
//! # Bandwidth sweep against a freshly created smoke-test region
//! ivbench_writer --create --region /tmp/ivbench --bandwidth 5
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};

use ivb::config::{BenchConfig, ConfigLoader};
use ivb::record::IterationRecord;
use ivbench_region::{Region, RegionError, RegionMap};
use ivbench_writer::{suite, Publisher};

/// ivbench writer - publishes benchmark payloads and records measurements
#[derive(Parser, Debug)]
#[command(name = "ivbench_writer")]
#[command(version)]
#[command(about = "Shared-memory benchmark writer peer")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run the latency suite, optionally overriding the iteration count.
    #[arg(short = 'l', long, value_name = "COUNT", num_args = 0..=1)]
    latency: Option<Option<u32>>,

    /// Run the bandwidth suite, optionally overriding iterations per size.
    #[arg(short = 'b', long, value_name = "COUNT", num_args = 0..=1)]
    bandwidth: Option<Option<u32>>,

    /// Iteration count override for both suites.
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Backing file override.
    #[arg(long, value_name = "PATH")]
    region: Option<PathBuf>,

    /// Create the backing file instead of requiring it to exist
    /// (host-side smoke testing without the VM setup).
    #[arg(long)]
    create: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    ivb::init_tracing(args.verbose, args.json);

    if let Err(e) = run(args) {
        error!("writer failed: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::default(),
    };
    if let Some(region) = args.region {
        config.region.path = region;
    }
    if let Some(count) = args.count {
        config.latency.iterations = count;
        config.bandwidth.iterations = count;
    }
    if let Some(Some(count)) = args.latency {
        config.latency.iterations = count;
    }
    if let Some(Some(count)) = args.bandwidth {
        config.bandwidth.iterations = count;
    }
    config.validate()?;

    // Neither flag means both suites, matching the reader's default budget.
    let run_latency = args.latency.is_some() || args.bandwidth.is_none();
    let run_bandwidth = args.bandwidth.is_some() || args.latency.is_none();

    info!("ivbench writer v{} starting", env!("CARGO_PKG_VERSION"));

    let map = if args.create {
        RegionMap::create(&config.region.path, config.region.size)?
    } else {
        match RegionMap::open(&config.region.path, config.region.size) {
            Ok(map) => map,
            Err(e @ RegionError::BackingNotFound { .. }) => {
                error!("{e}; run the VM setup first, or pass --create for a local smoke test");
                process::exit(1);
            }
            Err(e) => return Err(e.into()),
        }
    };
    let region = Region::over(map)?;

    let mut publisher = Publisher::new(region, config.protocol.clone());
    publisher.initialise();

    let mut emit = |record: &IterationRecord| match serde_json::to_string(record) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("failed to serialize record {}: {e}", record.iteration),
    };

    if run_latency {
        suite::run_latency(&mut publisher, &config.latency, &mut emit)?;
    }
    if run_bandwidth {
        suite::run_bandwidth(&mut publisher, &config.bandwidth, &mut emit)?;
    }

    publisher.shutdown();
    info!("tests completed");
    Ok(())
}
