use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// An incremental statistic over a trailing window of observations.
pub trait RollingStatistic: std::fmt::Debug + Send + Sync {
    /// Pushes the next observation. `None` marks a missing value.
    /// Returns `Some(value)` once the window is full and every value in it is present.
    fn update(&mut self, value: Option<f64>) -> Option<f64>;

    /// Clears all history, e.g. at the start of a new contiguous block.
    fn reset(&mut self);
}

// ================================================================================================
// Rolling Standard Deviation
// ================================================================================================

/// Trailing standard deviation over `window_size` observations.
///
/// Mean and sum of squared deviations are maintained with Welford's update on
/// insertion and its inverse on eviction, so each step is amortized O(1).
/// Eviction cancels digits, so the state is rebuilt from the buffer once per
/// `window_size` evictions and whenever `m2` falls far below its peak since
/// the last rebuild (a large value just left the window). `NaN` inputs are
/// treated like missing values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingStdev {
    window_size: usize,
    ddof: usize,
    buffer: VecDeque<Option<f64>>,
    valid: usize,
    mean: f64,
    m2: f64,
    /// Largest `m2` since the last rebuild; bounds the absolute error of `m2`.
    peak_m2: f64,
    evictions: usize,
}

/// `m2` below `peak_m2 * REBUILD_RATIO` has lost too many digits to cancellation.
const REBUILD_RATIO: f64 = 1e-4;

impl StreamingStdev {
    /// `ddof` is the delta degrees of freedom: 1 for the sample, 0 for the
    /// population standard deviation.
    pub fn new(window_size: usize, ddof: usize) -> Self {
        Self {
            window_size,
            ddof,
            buffer: VecDeque::with_capacity(window_size + 1),
            valid: 0,
            mean: 0.0,
            m2: 0.0,
            peak_m2: 0.0,
            evictions: 0,
        }
    }

    fn push(&mut self, x: f64) {
        self.valid += 1;
        let delta = x - self.mean;
        self.mean += delta / self.valid as f64;
        self.m2 += delta * (x - self.mean);
        self.peak_m2 = self.peak_m2.max(self.m2);
    }

    fn evict(&mut self, x: f64) {
        self.evictions += 1;
        if self.valid <= 1 {
            self.clear_state();
            return;
        }
        let old_mean = self.mean;
        self.valid -= 1;
        self.mean = (old_mean * (self.valid + 1) as f64 - x) / self.valid as f64;
        self.m2 -= (x - old_mean) * (x - self.mean);
    }

    fn clear_state(&mut self) {
        self.valid = 0;
        self.mean = 0.0;
        self.m2 = 0.0;
        self.peak_m2 = 0.0;
    }

    /// Recomputes mean and `m2` from the values in the buffer.
    fn rebuild(&mut self) {
        let values: Vec<f64> = self.buffer.iter().flatten().copied().collect();
        self.clear_state();
        self.evictions = 0;
        values.into_iter().for_each(|x| self.push(x));
    }

    fn needs_rebuild(&self) -> bool {
        if !(self.mean.is_finite() && self.m2.is_finite()) {
            // Non-finite inputs still in the window keep the result NaN.
            return self.buffer.iter().flatten().all(|x| x.is_finite());
        }
        self.evictions >= self.window_size || self.m2 < self.peak_m2 * REBUILD_RATIO
    }

    fn value(&self) -> Option<f64> {
        if self.buffer.len() < self.window_size || self.valid < self.window_size {
            return None;
        }
        let variance = self.m2 / self.valid.saturating_sub(self.ddof) as f64;
        Some(variance.sqrt())
    }
}

impl RollingStatistic for StreamingStdev {
    fn update(&mut self, value: Option<f64>) -> Option<f64> {
        let value = value.filter(|x| !x.is_nan());
        self.buffer.push_back(value);
        if let Some(x) = value {
            self.push(x);
        }

        if self.buffer.len() > self.window_size {
            if let Some(Some(x)) = self.buffer.pop_front() {
                self.evict(x);
            }
        }

        if self.needs_rebuild() {
            self.rebuild();
        }

        self.value()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.clear_state();
        self.evictions = 0;
    }
}
