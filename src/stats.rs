//! Per-key running aggregates and the rule for combining them.

use std::fmt::Display;

/// Running statistics for a single key: minimum, maximum, arithmetic mean
/// and number of values seen.
///
/// The mean is maintained incrementally rather than derived from a stored
/// sum, so a record stays O(1) no matter how many values fold into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyStats {
    min: f64,
    max: f64,
    mean: f64,
    count: u64,
}

impl KeyStats {
    /// Stats for a key seen exactly once.
    pub fn new(value: f64) -> Self {
        KeyStats {
            min: value,
            max: value,
            mean: value,
            count: 1,
        }
    }

    /// Folds one more value into the running stats.
    pub fn update(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.mean = (self.mean * self.count as f64 + value) / (self.count + 1) as f64;
        self.count += 1;
    }

    /// Combines two partial aggregates for the same key.
    ///
    /// The means must be weighted by their counts; averaging them directly
    /// would bias the result whenever the partials saw different numbers of
    /// values. The rule is commutative and associative, so partials can be
    /// merged in any order.
    pub fn merge(&mut self, other: &KeyStats) {
        let total = self.count + other.count;
        self.mean = (self.mean * self.count as f64 + other.mean * other.count as f64)
            / total as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = total;
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Display for KeyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}/{:.1}/{:.1}", self.min, self.mean, self.max)
    }
}
