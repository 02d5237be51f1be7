//! # ivbench Reader Binary
//!
//! Guest-side peer of the shared-memory benchmark. Maps the PCI BAR
//! resource node (falling back to the shared file for host-side smoke
//! testing), waits for the writer's handshake and serves messages.
//!
//! # Usage
//!
//! ```bash
//! # Inside the guest, expecting the default suites
//! ivbench_reader
//!
//! # Explicit message budget and config file
//! ivbench_reader --config ivbench.toml --count 130
//!
//! # Host-side smoke test against the shared file
//! ivbench_reader --region /dev/shm/ivbench -v
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};

use ivb::config::{BenchConfig, ConfigLoader};
use ivbench_reader::Server;
use ivbench_region::{Region, RegionMap};

/// ivbench reader - consumes benchmark payloads and reports timings
#[derive(Parser, Debug)]
#[command(name = "ivbench_reader")]
#[command(version)]
#[command(about = "Shared-memory benchmark reader peer")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Message budget override (default: sum of configured suite counts).
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Backing file override.
    #[arg(long, value_name = "PATH")]
    region: Option<PathBuf>,

    /// PCI resource node override.
    #[arg(long, value_name = "PATH")]
    pci_resource: Option<PathBuf>,

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
        error!("reader failed: {e}");
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
    if let Some(pci) = args.pci_resource {
        config.region.pci_resource = pci;
    }
    config.validate()?;

    let budget = args.count.unwrap_or_else(|| config.expected_message_budget());
    info!(
        "ivbench reader v{} starting, expecting up to {budget} messages",
        env!("CARGO_PKG_VERSION")
    );

    let map = RegionMap::open_preferring_pci(
        &config.region.pci_resource,
        &config.region.path,
        config.region.size,
    )?;
    let region = Region::over(map)?;

    let mut server = Server::new(region, config.protocol.clone());
    let served = server.run(budget)?;

    info!("served {served} messages, exiting");
    Ok(())
}
