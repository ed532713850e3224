use std::io::{self, Write};
use std::time::Duration;

use got_core::{DownloadConfig, Progress};

use crate::humanize::ByteSize;

/// The numbers shown on one progress line, read from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine {
    pub total: u64,
    pub chunk_size: u64,
    pub concurrency: u32,
    pub received: u64,
    pub elapsed_secs: u64,
    pub avg_speed: u64,
    pub speed: u64,
}

impl StatusLine {
    pub fn capture(progress: &Progress, config: &DownloadConfig) -> Self {
        let total = progress.total_size();
        // A single unranged stream is one chunk spanning the whole resource.
        let chunk_size = match progress.chunk_size() {
            0 => total,
            size => size,
        };
        Self {
            total,
            chunk_size,
            concurrency: config.concurrency,
            received: progress.received(),
            elapsed_secs: round_secs(progress.elapsed()),
            avg_speed: progress.avg_speed(),
            speed: progress.speed(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "\rTotal: {} | Chunk: {} | Concurrency: {} | Received: {} | Time: {}s | Avg: {}/s | Speed: {}/s",
            size_or_unknown(self.total),
            size_or_unknown(self.chunk_size),
            self.concurrency,
            ByteSize(self.received),
            self.elapsed_secs,
            ByteSize(self.avg_speed),
            ByteSize(self.speed),
        )
    }
}

/// Progress callback: redraws the status line in place on stdout.
pub fn print_status(progress: &Progress, config: &DownloadConfig) {
    let line = StatusLine::capture(progress, config).render();
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(line.as_bytes());
    let _ = stdout.flush();
}

fn size_or_unknown(bytes: u64) -> String {
    if bytes == 0 {
        "?".to_string()
    } else {
        ByteSize(bytes).to_string()
    }
}

fn round_secs(elapsed: Duration) -> u64 {
    (elapsed.as_millis() as u64 + 500) / 1000
}
