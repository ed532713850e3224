use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands chunk indices to worker threads, each index exactly once.
#[derive(Debug)]
pub struct Scheduler {
    pub max_active: usize,
    total: usize,
    next: AtomicUsize,
}

impl Scheduler {
    pub fn new(max_active: usize, total: usize) -> Self {
        Self {
            max_active: max_active.max(1),
            total,
            next: AtomicUsize::new(0),
        }
    }

    /// Number of workers worth spawning: never more than there are chunks.
    pub fn worker_count(&self) -> usize {
        self.max_active.min(self.total)
    }

    pub fn next_chunk(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        if index < self.total {
            Some(index)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn workers_are_capped_by_chunks() {
        assert_eq!(Scheduler::new(10, 3).worker_count(), 3);
        assert_eq!(Scheduler::new(2, 30).worker_count(), 2);
        assert_eq!(Scheduler::new(0, 30).worker_count(), 1);
    }

    #[test]
    fn every_chunk_is_handed_out_once() {
        let scheduler = Arc::new(Scheduler::new(4, 1000));
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    while let Some(index) = scheduler.next_chunk() {
                        assert!(seen.lock().unwrap().insert(index));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), 1000);
        assert_eq!(scheduler.next_chunk(), None);
    }
}
