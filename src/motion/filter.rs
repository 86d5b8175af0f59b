// Moving average over the most recent samples
use std::collections::VecDeque;

use crate::sensor::AccelerationSample;

/// Averages the last `capacity` samples per axis.
///
/// Until the window fills, the average is taken over the samples seen so far.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<AccelerationSample>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample and return the current per-axis average
    pub fn push(&mut self, sample: AccelerationSample) -> AccelerationSample {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.average()
    }

    pub fn average(&self) -> AccelerationSample {
        let n = self.samples.len() as i32;
        if n == 0 {
            return AccelerationSample::default();
        }
        let mut sums = [0i32; 3];
        for sample in &self.samples {
            for (sum, value) in sums.iter_mut().zip(sample.as_array()) {
                *sum += i32::from(value);
            }
        }
        let [x, y, z] = sums.map(|sum| (sum / n) as i16);
        AccelerationSample { x, y, z }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Clear the `bits` low-order bits. Rounds toward negative infinity.
pub fn noise_floor(value: i32, bits: u32) -> i32 {
    value & !((1i32 << bits) - 1)
}
