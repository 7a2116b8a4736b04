//! Fixed-window moving averages
//!
//! Ring buffer of the last `N` samples with an incrementally updated sum, so a
//! push costs O(1) whatever the window. The sum is rebuilt from the buffer
//! every [`RESUM_INTERVAL`] pushes to keep rounding drift bounded.

use std::ops::{Add, Div, Sub};

use nalgebra::{Vector2, Vector3};

use crate::wrench::Wrench;

/// Pushes between full re-summations of the window
pub const RESUM_INTERVAL: usize = 1024;

/// Value that can be averaged
pub trait Sample:
    Copy + Add<Output = Self> + Sub<Output = Self> + Div<f64, Output = Self>
{
    fn zero() -> Self;
}

impl Sample for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Sample for Vector2<f64> {
    fn zero() -> Self {
        Vector2::zeros()
    }
}

impl Sample for Vector3<f64> {
    fn zero() -> Self {
        Vector3::zeros()
    }
}

impl Sample for Wrench {
    fn zero() -> Self {
        Wrench::zeros()
    }
}

/// Moving average over the last `capacity` samples
#[derive(Debug, Clone)]
pub struct MovingAverage<T> {
    /// Samples, oldest at `head` once full
    buffer: Vec<T>,
    /// Window length
    capacity: usize,
    /// Next slot to overwrite once full
    head: usize,
    /// Running sum of `buffer`
    sum: T,
    /// Pushes since the last re-summation
    since_resum: usize,
}

impl<T: Sample> MovingAverage<T> {
    /// Create an empty window
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "moving average window must be at least 1");
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            sum: T::zero(),
            since_resum: 0,
        }
    }

    /// Add a sample and return the updated mean
    pub fn push(&mut self, sample: T) -> T {
        if self.buffer.len() < self.capacity {
            self.buffer.push(sample);
            self.sum = self.sum + sample;
        } else {
            let evicted = self.buffer[self.head];
            self.buffer[self.head] = sample;
            self.head = (self.head + 1) % self.capacity;
            self.sum = self.sum - evicted + sample;
        }

        self.since_resum += 1;
        if self.since_resum >= RESUM_INTERVAL {
            self.sum = self.buffer.iter().fold(T::zero(), |acc, &s| acc + s);
            self.since_resum = 0;
        }

        self.sum / self.buffer.len() as f64
    }

    /// Mean of the current window, `None` while empty
    pub fn mean(&self) -> Option<T> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.sum / self.buffer.len() as f64)
        }
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<T> {
        if self.buffer.is_empty() {
            None
        } else if self.buffer.len() < self.capacity {
            self.buffer.last().copied()
        } else {
            let idx = (self.head + self.capacity - 1) % self.capacity;
            Some(self.buffer[idx])
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
        self.sum = T::zero();
        self.since_resum = 0;
    }
}
