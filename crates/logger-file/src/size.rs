//! Running byte count of the live file

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free total of bytes written since the last rotation
#[derive(Debug, Default)]
pub struct SizeCounter {
    bytes: AtomicU64,
}

impl SizeCounter {
    /// Start counting from `initial` (the on-disk size at open time)
    pub const fn new(initial: u64) -> Self {
        Self {
            bytes: AtomicU64::new(initial),
        }
    }

    /// Record `n` more bytes, returning the new total
    pub fn add(&self, n: u64) -> u64 {
        self.bytes.fetch_add(n, Ordering::AcqRel) + n
    }

    /// Current total
    pub fn get(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }

    /// Reset after a rotation
    pub fn reset(&self) {
        self.bytes.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_adds() {
        let counter = Arc::new(SizeCounter::new(10));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.add(3);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get(), 10 + 8 * 1000 * 3);

        counter.reset();
        assert_eq!(counter.get(), 0);
    }
}
