//! Provenance CLI - inspect and verify signed audit logs, derive trace identifiers.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{canonicalize, list, trace_id, verify};

#[derive(Parser)]
#[command(name = "provenance")]
#[command(about = "Provenance audit log verification and identity CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the hash chain and signatures of a signed audit log
    Verify {
        /// Path to the NDJSON audit log
        log: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries of a signed audit log
    List {
        /// Path to the NDJSON audit log
        log: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Stop after N entries (default: unlimited)
        #[arg(long)]
        max_entries: Option<usize>,
    },
    /// Show canonical bytes for input JSON
    Canonicalize {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
    },
    /// Derive trace and scene identifiers
    TraceId {
        /// Policy hash (64 lowercase hex)
        #[arg(long)]
        policy_hash: String,
        /// Pipeline version
        #[arg(long)]
        pipeline_version: String,
        /// Input as PATH[:HASH[:SIZE]] (repeatable)
        #[arg(long = "input")]
        inputs: Vec<String>,
        /// Parameter as KEY=VALUE (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Verify { log, json } => verify::run(log, json),
        Commands::List {
            log,
            json,
            max_entries,
        } => list::run(log, json, max_entries),
        Commands::Canonicalize { input } => canonicalize::run(input),
        Commands::TraceId {
            policy_hash,
            pipeline_version,
            inputs,
            params,
            json,
        } => trace_id::run(policy_hash, pipeline_version, inputs, params, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
