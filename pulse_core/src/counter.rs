use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic accumulator that can be drained atomically.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.increment(1);
    }

    pub fn increment(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Current value without clearing it.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Returns the value accumulated since the previous reset and zeroes it.
    ///
    /// The swap makes read and clear a single step, so an increment racing a
    /// flush lands either in this reading or in the next one.
    pub fn read_and_reset(&self) -> u64 {
        self.value.swap(0, Ordering::AcqRel)
    }
}
