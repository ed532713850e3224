use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::CoreResult;

/// Runs a task on its own thread at a fixed cadence until stopped.
pub struct Ticker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(interval: Duration, mut task: F) -> CoreResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("got-ticker".to_string())
            .spawn(move || loop {
                let Some(deadline) = Instant::now().checked_add(interval) else {
                    // Too far out to ever fire; wait to be stopped.
                    while !stop_clone.load(Ordering::SeqCst) {
                        thread::park();
                    }
                    return;
                };
                loop {
                    if stop_clone.load(Ordering::SeqCst) {
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
                task();
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Wakes the ticker thread and waits for it to exit. A tick already in
    /// progress runs to completion first.
    ///
    /// Returns `false` when the thread had panicked.
    pub fn stop(&mut self) -> bool {
        self.stop.store(true, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => {
                handle.thread().unpark();
                handle.join().is_ok()
            }
            None => true,
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let mut ticker = Ticker::spawn(Duration::from_millis(5), move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(60));
        assert!(ticker.stop());
        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 2, "expected several ticks, got {}", ticks);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), ticks);
    }

    #[test]
    fn stop_does_not_wait_for_the_interval() {
        let mut ticker = Ticker::spawn(Duration::from_secs(60), || {}).unwrap();
        let started = Instant::now();
        assert!(ticker.stop());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn unbounded_interval_parks_instead_of_panicking() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let mut ticker = Ticker::spawn(Duration::MAX, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(ticker.stop(), "ticker thread panicked");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
