use std::io::Write;

use got_core::resolver::{normalize_url, resolve_destination};
use got_core::{DownloadConfig, Engine};
use tracing::debug;

use crate::args::Args;
use crate::error::CliError;
use crate::report;

/// Builds the download configuration from parsed arguments.
///
/// Fails before anything touches the engine when the URL is missing.
pub fn configure(args: &Args) -> Result<DownloadConfig, CliError> {
    let raw = match args.url.as_deref() {
        Some(url) if !url.is_empty() => url,
        _ => return Err(CliError::EmptyUrl),
    };
    let url = normalize_url(raw);
    let destination = resolve_destination(args.out.as_deref(), &url);

    Ok(DownloadConfig::new(url, destination)
        .with_chunk_size(args.size.as_u64())
        .with_concurrency(args.concurrency)
        .with_sha256(args.sha256.clone()))
}

/// Runs one download end to end and returns the configuration it used.
///
/// `start` blocks until the engine is done. Progress lines go straight to
/// stdout from the engine's ticker; the completion marker goes to `out`.
pub fn run<E: Engine>(
    args: &Args,
    engine: &mut E,
    out: &mut impl Write,
) -> Result<DownloadConfig, CliError> {
    let config = configure(args)?;
    debug!(?config, "configured download");

    engine.init(config.clone()).map_err(CliError::Init)?;
    engine.set_progress_fn(Box::new(report::print_status));

    if let Err(err) = engine.start() {
        // Leave the last progress line intact above the error.
        let _ = writeln!(out);
        return Err(CliError::Transfer(err));
    }

    writeln!(out, " | Done!")?;
    out.flush()?;
    Ok(config)
}
