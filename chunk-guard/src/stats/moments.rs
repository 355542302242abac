//! Running moments for numeric columns.

use serde::{Deserialize, Serialize};

/// Count, extremes, mean and variance of a stream of values.
///
/// Uses Welford's update so the variance stays accurate for long streams with
/// a large mean. Values are folded in scan order; the result therefore does
/// not depend on how the stream was cut into batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    /// Number of non-null values
    pub count: u64,
    /// Number of nulls (or values that were not numbers)
    pub null_count: u64,
    /// Smallest value, `None` until a value is seen
    pub min: Option<f64>,
    /// Largest value, `None` until a value is seen
    pub max: Option<f64>,
    /// Running mean
    pub mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
}

impl Default for Moments {
    fn default() -> Self {
        Self::new()
    }
}

impl Moments {
    /// Creates empty moments.
    pub fn new() -> Self {
        Self {
            count: 0,
            null_count: 0,
            min: None,
            max: None,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Folds in one value. NaN counts as null.
    pub fn update(&mut self, value: f64) {
        if value.is_nan() {
            self.null_count += 1;
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Records a null.
    pub fn update_null(&mut self) {
        self.null_count += 1;
    }

    /// Population variance, `None` when no value was seen.
    pub fn population_variance(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            // Ensure non-negative due to floating point precision
            Some((self.m2 / self.count as f64).max(0.0))
        }
    }

    /// Population standard deviation.
    pub fn population_std_dev(&self) -> Option<f64> {
        self.population_variance().map(f64::sqrt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welford_matches_textbook_values() {
        let mut moments = Moments::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            moments.update(v);
        }
        moments.update_null();
        moments.update(f64::NAN);

        assert_eq!(moments.count, 8);
        assert_eq!(moments.null_count, 2);
        assert!((moments.mean - 5.0).abs() < 1e-12);
        assert!((moments.population_std_dev().unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(moments.min, Some(2.0));
        assert_eq!(moments.max, Some(9.0));
    }

    #[test]
    fn test_empty_moments() {
        let moments = Moments::new();
        assert_eq!(moments.population_variance(), None);
        assert_eq!(moments.population_std_dev(), None);
        assert_eq!(moments.min, None);
    }
}
