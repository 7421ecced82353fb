//! Spindle CLI
//!
//! Runs a storage node and works with its segment files.
//!
//! # Commands
//!
//! - `serve` - Run a node, optionally replicating to other nodes
//! - `send` - Push events into a running node
//! - `verify` - Check segment files for corrupt events
//! - `inspect` - List the events stored in a segment

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Spindle event storage node and tools.
#[derive(Parser)]
#[command(name = "spindle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a storage node
    Serve {
        /// Address producers connect to
        #[arg(short, long, default_value = "127.0.0.1:7070")]
        bind: SocketAddr,

        /// Directory for segment files
        #[arg(short, long, default_value = "spindle-data")]
        data_dir: PathBuf,

        /// Replica to stream committed events to (repeatable)
        #[arg(short, long = "replica")]
        replicas: Vec<SocketAddr>,

        /// Commit records kept for lagging replicas
        #[arg(long, default_value = "1024")]
        ring_capacity: usize,

        /// Skip syncing each event to disk before it is published
        #[arg(long)]
        no_sync: bool,

        /// Bytes moved per socket/file copy step
        #[arg(long, default_value = "65536")]
        transfer_chunk: usize,
    },

    /// Send events to a node
    Send {
        /// Node ingest address
        #[arg(long, default_value = "127.0.0.1:7070")]
        to: SocketAddr,

        /// Channel tag
        #[arg(short, long)]
        tag: u64,

        /// Event magic
        #[arg(short, long, default_value = "0")]
        magic: i32,

        /// Payload to send (repeatable); reads stdin lines if omitted
        #[arg(short, long = "payload")]
        payloads: Vec<String>,
    },

    /// Verify segment files
    Verify {
        /// Segment files or data directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Segments use 128-bit (UUID) tags
        #[arg(short, long)]
        wide: bool,
    },

    /// List the events in a segment
    Inspect {
        /// Segment file
        segment: PathBuf,

        /// Maximum number of events to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print payloads as text
        #[arg(short, long)]
        payloads: bool,

        /// Segment uses 128-bit (UUID) tags
        #[arg(short, long)]
        wide: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            data_dir,
            replicas,
            ring_capacity,
            no_sync,
            transfer_chunk,
        } => {
            let options = commands::serve::ServeOptions {
                bind,
                data_dir,
                replicas,
                ring_capacity,
                sync_on_append: !no_sync,
                transfer_chunk,
            };
            commands::serve::run(options)?;
        }
        Commands::Send {
            to,
            tag,
            magic,
            payloads,
        } => {
            commands::send::run(to, tag, magic, payloads)?;
        }
        Commands::Verify { paths, wide } => {
            commands::verify::run(&paths, wide)?;
        }
        Commands::Inspect {
            segment,
            limit,
            payloads,
            wide,
        } => {
            commands::inspect::run(&segment, limit, payloads, wide)?;
        }
    }

    Ok(())
}
