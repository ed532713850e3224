mod args;
mod error;
mod humanize;
mod orchestrator;
mod report;

use std::io;
use std::process::ExitCode;

use args::Args;
use clap::Parser;
use got_core::{DownloadEngine, EngineConfig};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let mut engine = match DownloadEngine::new(EngineConfig::default()) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match orchestrator::run(&args, &mut engine, &mut io::stdout()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr and stay quiet unless `RUST_LOG` asks for more, so
/// they do not tear the progress line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
