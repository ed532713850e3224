use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Live transfer totals shared between chunk workers and the reporter.
///
/// Every field is an atomic so readers never take a lock. Only the engine
/// writes; `received` only ever grows. The instantaneous speed window is
/// refreshed by [`Progress::sample`] on the ticker thread, right before the
/// progress callback runs.
#[derive(Debug, Default)]
pub struct Progress {
    total_size: AtomicU64,
    chunk_size: AtomicU64,
    received: AtomicU64,
    started_at: OnceLock<Instant>,
    frozen: AtomicBool,
    frozen_nanos: AtomicU64,
    last_sample_bytes: AtomicU64,
    last_sample_nanos: AtomicU64,
    window_bytes: AtomicU64,
    window_nanos: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource size in bytes, `0` while unknown.
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Acquire)
    }

    /// Chunk size the engine settled on, `0` for a single unranged stream.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size.load(Ordering::Acquire)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn elapsed(&self) -> Duration {
        if self.frozen.load(Ordering::Acquire) {
            return Duration::from_nanos(self.frozen_nanos.load(Ordering::Acquire));
        }
        self.started_at
            .get()
            .map(Instant::elapsed)
            .unwrap_or_default()
    }

    /// Bytes per second over the whole transfer.
    pub fn avg_speed(&self) -> u64 {
        per_second(self.received(), self.elapsed())
    }

    /// Bytes per second over the most recent sampling window.
    pub fn speed(&self) -> u64 {
        per_second(
            self.window_bytes.load(Ordering::Acquire),
            Duration::from_nanos(self.window_nanos.load(Ordering::Acquire)),
        )
    }

    pub(crate) fn set_total_size(&self, total: u64) {
        self.total_size.store(total, Ordering::Release);
    }

    pub(crate) fn set_chunk_size(&self, chunk_size: u64) {
        self.chunk_size.store(chunk_size, Ordering::Release);
    }

    pub(crate) fn add_received(&self, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn mark_started(&self) {
        let _ = self.started_at.set(Instant::now());
    }

    pub(crate) fn sample(&self) {
        let now = duration_nanos(self.elapsed());
        let received = self.received();
        let last_bytes = self.last_sample_bytes.swap(received, Ordering::AcqRel);
        let last_nanos = self.last_sample_nanos.swap(now, Ordering::AcqRel);
        self.window_bytes
            .store(received.saturating_sub(last_bytes), Ordering::Release);
        self.window_nanos
            .store(now.saturating_sub(last_nanos), Ordering::Release);
    }

    pub(crate) fn freeze(&self) {
        if self.frozen.load(Ordering::Acquire) {
            return;
        }
        let elapsed = duration_nanos(self.elapsed());
        self.frozen_nanos.store(elapsed, Ordering::Release);
        self.frozen.store(true, Ordering::Release);
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn per_second(bytes: u64, window: Duration) -> u64 {
    let secs = window.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    (bytes as f64 / secs) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_progress_reads_zero() {
        let progress = Progress::new();
        assert_eq!(progress.total_size(), 0);
        assert_eq!(progress.received(), 0);
        assert_eq!(progress.elapsed(), Duration::ZERO);
        assert_eq!(progress.avg_speed(), 0);
        assert_eq!(progress.speed(), 0);
    }

    #[test]
    fn concurrent_writers_lose_no_bytes() {
        let progress = Arc::new(Progress::new());
        progress.mark_started();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let progress = Arc::clone(&progress);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        progress.add_received(3);
                    }
                })
            })
            .collect();

        let mut last = 0;
        while handles.iter().any(|handle| !handle.is_finished()) {
            let now = progress.received();
            assert!(now >= last, "received went backwards: {} < {}", now, last);
            last = now;
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.received(), 8 * 10_000 * 3);
    }

    #[test]
    fn sample_measures_the_last_window() {
        let progress = Progress::new();
        progress.mark_started();
        progress.add_received(1000);
        thread::sleep(Duration::from_millis(20));
        progress.sample();
        let first = progress.speed();
        assert!(first > 0);

        thread::sleep(Duration::from_millis(20));
        progress.sample();
        assert_eq!(progress.speed(), 0, "no bytes arrived in the second window");
        assert!(progress.avg_speed() > 0);
    }

    #[test]
    fn freeze_stops_the_clock() {
        let progress = Progress::new();
        progress.mark_started();
        thread::sleep(Duration::from_millis(5));
        progress.freeze();
        let frozen = progress.elapsed();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(progress.elapsed(), frozen);
        assert!(progress.is_finished());
    }
}
