//! # Rolling Sample Buffer
//!
//! Fixed-capacity window of the most recent samples, oldest evicted first.

use std::collections::VecDeque;

use super::PhysicalSample;

/// Default window size shown by consumers
pub const DEFAULT_CAPACITY: usize = 1024;

/// Bounded, arrival-ordered sample window
///
/// `len() <= capacity()` holds after every call. Appends are applied as one
/// mutation, so a reader never sees the window above capacity.
#[derive(Debug, Clone)]
pub struct RollingSampleBuffer {
    samples: VecDeque<PhysicalSample>,
    capacity: usize,
}

impl RollingSampleBuffer {
    /// Create an empty buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a batch in arrival order, evicting the oldest samples as needed
    ///
    /// If the batch alone exceeds the capacity only its newest `capacity`
    /// samples are kept.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of samples from `batch` now in the window
    ///
    /// # Examples
    ///
    /// ```
    /// use wattmeter_monitor::samples::{PhysicalSample, RollingSampleBuffer};
    ///
    /// let s = |v: f64| PhysicalSample::new(v, 0.0);
    /// let mut buffer = RollingSampleBuffer::new(4);
    /// buffer.append(&[s(1.0), s(2.0)]);
    /// buffer.append(&[s(3.0), s(4.0), s(5.0)]);
    /// assert_eq!(buffer.snapshot(), vec![s(2.0), s(3.0), s(4.0), s(5.0)]);
    /// ```
    pub fn append(&mut self, batch: &[PhysicalSample]) -> usize {
        let keep = batch.len().min(self.capacity);
        let fresh = &batch[batch.len() - keep..];

        let overflow = (self.samples.len() + keep).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(fresh.iter().copied());

        keep
    }

    /// Copy of the window, oldest to newest
    pub fn snapshot(&self) -> Vec<PhysicalSample> {
        self.samples.iter().copied().collect()
    }

    /// Iterate over the window, oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &PhysicalSample> {
        self.samples.iter()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&PhysicalSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample, keeping the capacity
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for RollingSampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
