//! # Link Quality Estimator
//!
//! Smoothed link-quality and RSSI signals for the dynamic power controller.
//!
//! The LQ average is an exponentially weighted moving average kept in
//! fixed point (`SHIFT` fractional bits) so it works on targets without an
//! FPU:
//!
//! ```text
//! avg' = ((K - 1) * avg + (sample << SHIFT)) / K
//! ```
//!
//! Reads shift the fraction away. The division rounds toward the sample so
//! a constant input is reached exactly from either side; plain truncation
//! would leave a rising average one below the input forever.
//!
//! RSSI is averaged over a bounded window that empties every time the mean
//! is read.

/// Moving average weight for link quality
pub const LQ_MOVING_AVG_K: u32 = 8;

/// Fractional bits kept by the LQ average
pub const LQ_FIXED_POINT_SHIFT: u32 = 16;

/// Most RSSI samples held between reads
pub const RSSI_WINDOW: usize = 32;

/// Integer EWMA with `SHIFT` fractional bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverage<const K: u32, const SHIFT: u32> {
    value: u64,
}

impl<const K: u32, const SHIFT: u32> MovingAverage<K, SHIFT> {
    pub fn new(seed: u32) -> Self {
        Self {
            value: (seed as u64) << SHIFT,
        }
    }

    /// Restart the average at `seed`
    pub fn reset(&mut self, seed: u32) {
        self.value = (seed as u64) << SHIFT;
    }

    pub fn add(&mut self, sample: u32) {
        let sample = (sample as u64) << SHIFT;
        let sum = (K as u64 - 1) * self.value + sample;
        self.value = if sample > self.value {
            sum.div_ceil(K as u64)
        } else {
            sum / K as u64
        };
    }

    /// Integer part of the average
    pub fn value(&self) -> u32 {
        (self.value >> SHIFT) as u32
    }
}

/// Sum-and-count mean over at most `N` samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeanAccumulator<const N: usize> {
    sum: i32,
    count: usize,
}

impl<const N: usize> MeanAccumulator<N> {
    pub fn new() -> Self {
        Self { sum: 0, count: 0 }
    }

    /// Add a sample; once `N` samples are held, further ones are ignored
    pub fn add(&mut self, sample: i32) {
        if self.count < N {
            self.sum += sample;
            self.count += 1;
        }
    }

    /// Mean of the held samples, emptying the window
    pub fn mean(&mut self) -> Option<i32> {
        if self.count == 0 {
            return None;
        }
        let mean = self.sum / self.count as i32;
        self.reset();
        Some(mean)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum = 0;
        self.count = 0;
    }
}

/// LQ moving average plus RSSI window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQualityEstimator {
    lq: MovingAverage<LQ_MOVING_AVG_K, LQ_FIXED_POINT_SHIFT>,
    rssi: MeanAccumulator<RSSI_WINDOW>,
}

impl Default for LinkQualityEstimator {
    fn default() -> Self {
        Self::new(100)
    }
}

impl LinkQualityEstimator {
    /// Create an estimator whose LQ average starts at `seed` percent
    pub fn new(seed: u8) -> Self {
        Self {
            lq: MovingAverage::new(seed as u32),
            rssi: MeanAccumulator::new(),
        }
    }

    /// Restart both signals, seeding the LQ average
    pub fn init(&mut self, seed: u8) {
        self.lq.reset(seed as u32);
        self.rssi.reset();
    }

    pub fn add_link_quality(&mut self, lq: u8) {
        self.lq.add(lq as u32);
    }

    pub fn add_rssi(&mut self, rssi_dbm: i8) {
        self.rssi.add(rssi_dbm as i32);
    }

    /// Mean RSSI since the last call, emptying the window
    pub fn mean_rssi(&mut self) -> Option<i8> {
        self.rssi.mean().map(|mean| mean as i8)
    }

    pub fn current_lq_average(&self) -> u8 {
        self.lq.value() as u8
    }

    pub fn rssi_sample_count(&self) -> usize {
        self.rssi.count()
    }
}
