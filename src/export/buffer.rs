//! Bounded accumulator for records awaiting a flush.

use crate::cluster::Record;

/// Number of buffered records that triggers a flush.
pub const FLUSH_THRESHOLD: usize = 1000;

/// Pending records between flushes.
///
/// Never holds more than `threshold` records: callers must [`take`](Self::take)
/// as soon as [`push`](Self::push) reports the buffer is full.
#[derive(Debug)]
pub struct PageBuffer {
    records: Vec<Record>,
    threshold: usize,
}

impl PageBuffer {
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            records: Vec::with_capacity(threshold),
            threshold,
        }
    }

    /// Add a record; returns true when the buffer has reached the threshold.
    pub fn push(&mut self, record: Record) -> bool {
        debug_assert!(self.records.len() < self.threshold, "buffer overfilled");
        self.records.push(record);
        self.records.len() >= self.threshold
    }

    /// Drain the buffer, keeping its allocation for the next batch.
    pub fn take(&mut self) -> Vec<Record> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.threshold))
    }

}

impl Default for PageBuffer {
    fn default() -> Self {
        Self::new(FLUSH_THRESHOLD)
    }
}
