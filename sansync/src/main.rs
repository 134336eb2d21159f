//! # SanSync CLI
//!
//! Hosts the shared memory segment (the producer side) or talks to a hosted
//! segment as a client: sends commands, reads and publishes state, and
//! inspects the layout header.

use clap::{Parser, Subcommand};
use sansync_common::prelude::*;
use sansync_shared_memory::{Lifecycle, SegmentClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Host poll interval while waiting for the shutdown signal
const HOST_TICK: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "sansync")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Shared memory command/state channel host and client")]
#[command(long_about = None)]
struct Args {
    /// Path to configuration file (sansync.toml).
    /// Falls back to $SANSYNC_CONFIG, then to built-in defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Segment name, overrides config and $SHARED_MEMORY_NAME
    #[arg(short, long)]
    name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the segment and drain commands until Ctrl-C
    Host,
    /// Write a command into a hosted segment
    Send {
        /// Command text
        command: String,
    },
    /// Print the current state snapshot
    State,
    /// Replace the state snapshot
    PublishState {
        /// State text; empty clears the snapshot
        state: String,
    },
    /// Print the layout and publish the header descriptor
    Info,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("sansync failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level)?;
    let config = config?;

    match args.command {
        Command::Host => host(config),
        Command::Send { command } => {
            let mut client = SegmentClient::open(&config.segment.name)?;
            client.write_command(command.as_bytes())?;
            info!("Sent {} bytes to {}", command.len(), client.name());
            Ok(())
        }
        Command::State => {
            let mut client = SegmentClient::open(&config.segment.name)?;
            match client.read_state()? {
                Some(state) => println!("{}", String::from_utf8_lossy(&state)),
                None => info!("No state published in {}", client.name()),
            }
            Ok(())
        }
        Command::PublishState { state } => {
            let mut client = SegmentClient::open(&config.segment.name)?;
            client.publish_state(state.as_bytes())?;
            info!("Published {} bytes of state to {}", state.len(), client.name());
            Ok(())
        }
        Command::Info => info_command(&config),
    }
}

/// Resolve configuration: --config, else $SANSYNC_CONFIG, then --name on top.
fn load_config(args: &Args) -> Result<SanSyncConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = SanSyncConfig::load(path)?;
            config.apply_env_overrides();
            config
        }
        None => SanSyncConfig::from_env()?,
    };

    if let Some(name) = &args.name {
        config.segment.name = name.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Run the producer side until a shutdown signal arrives.
fn host(config: SanSyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "{} v{} hosting segment {}",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION"),
        config.segment.name
    );

    let lifecycle = Lifecycle::with_observer(
        config.segment,
        Arc::new(|command: &[u8]| {
            info!("Command: {}", String::from_utf8_lossy(command));
        }),
    );

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handler_flag.store(false, Ordering::SeqCst);
    })?;

    lifecycle.initialize()?;
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(HOST_TICK);
    }

    let stats = lifecycle.drain_stats();
    info!(
        "Drained {} commands over {} polls",
        stats.drained(),
        stats.polls()
    );
    lifecycle.cleanup();
    info!("Shutdown complete");
    Ok(())
}

fn info_command(config: &SanSyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("segment  {}", config.segment.name);
    println!("header   offset {:>5}  size {:>5}", 0, HEADER_SIZE);
    println!("command  offset {:>5}  size {:>5}", COMMAND_OFFSET, COMMAND_CAPACITY);
    println!("state    offset {:>5}  size {:>5}", STATE_OFFSET, STATE_CAPACITY);
    println!("total    {} bytes", SEGMENT_SIZE);

    let mut client = SegmentClient::open(&config.segment.name)?;
    client.publish_header()?;
    if let Some(header) = client.read_header()? {
        println!("{}", serde_json::to_string_pretty(&header)?);
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let directive: Directive = if args.verbose {
        Level::DEBUG.into()
    } else {
        log_level.as_directive().parse()?
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
