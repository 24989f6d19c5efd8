//! Search worker speaking the JSON-lines protocol on stdin/stdout.
//! Logs go to stderr so stdout carries protocol messages only.

use anyhow::{Context, Result};
use chess_console::worker::{serve_json_lines, EngineRegistry};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Move-search worker wrapping a UCI engine", long_about = None)]
struct Args {
    /// UCI engine executable
    #[arg(short, long, env = "CHESS_ENGINE")]
    engine: Option<PathBuf>,

    /// Extra argument passed to the engine (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Forward raw engine output as ENGINE_MSG
    #[arg(long)]
    engine_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let registry = EngineRegistry::with_process(args.engine, args.engine_args);

    serve_json_lines(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        registry,
        args.engine_log,
    )
    .await
    .context("worker stream failed")
}
