use clap::Parser;

use crate::humanize::ByteSize;

/// Got - the fast http downloader.
///
/// Splits the file into byte ranges and downloads them in parallel.
#[derive(Parser, Debug)]
#[command(name = "got", version, about, long_about = None)]
#[command(after_help = "Example:\n  got --out path/file.zip http://example.com/file.zip")]
pub struct Args {
    /// URL to download; https:// is assumed when no scheme is given.
    pub url: Option<String>,

    /// Downloaded file destination. Defaults to the URL's file name.
    #[arg(short, long)]
    pub out: Option<String>,

    /// Maximum chunk size in bytes, e.g. 1048576 or 4MB. 0 lets the engine decide.
    #[arg(short, long, default_value = "0")]
    pub size: ByteSize,

    /// Maximum chunks to download at the same time.
    #[arg(
        short,
        long,
        default_value_t = got_core::config::DEFAULT_CONCURRENCY,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub concurrency: u32,

    /// Expected SHA-256 of the downloaded file, checked once it completes.
    #[arg(long)]
    pub sha256: Option<String>,
}
