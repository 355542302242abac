//! KLL (Karnin-Lang-Liberty) sketch for approximate quantiles in bounded memory.
//!
//! The sketch keeps a stack of compactors. Level `L` holds items that each
//! stand for `2^L` original values. When a level fills up it is sorted and
//! every other item is promoted to the next level, halving its size.
//!
//! Compaction alternates between keeping even and odd positions per level, so
//! two sketches fed the same values in the same order are identical. While
//! fewer than `k` values have been seen nothing is compacted and every
//! quantile is exact.

use crate::error::{GuardError, Result};

/// Default accuracy parameter.
pub const DEFAULT_K: usize = 200;

#[derive(Debug, Clone)]
struct Compactor {
    capacity: usize,
    items: Vec<f64>,
    /// Flips on every compaction to pick even or odd survivors
    keep_odd: bool,
}

impl Compactor {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
            keep_odd: false,
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Sorts the level and returns every other item; the level is left empty
    /// except for an odd item out, which stays behind at its current weight.
    fn compact(&mut self) -> Vec<f64> {
        self.items.sort_by(f64::total_cmp);

        let leftover = if self.items.len() % 2 == 1 {
            self.items.pop()
        } else {
            None
        };

        let offset = usize::from(self.keep_odd);
        self.keep_odd = !self.keep_odd;
        let promoted: Vec<f64> = self.items.iter().skip(offset).step_by(2).copied().collect();

        self.items.clear();
        self.items.extend(leftover);
        promoted
    }
}

/// Approximate quantile sketch.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::stats::KllSketch;
///
/// let mut sketch = KllSketch::new(200);
/// for i in 1..=100 {
///     sketch.update(i as f64);
/// }
///
/// // Under k values the answer is exact.
/// assert_eq!(sketch.quantile(0.5).unwrap(), 50.0);
/// assert_eq!(sketch.quantile(1.0).unwrap(), 100.0);
/// ```
#[derive(Debug, Clone)]
pub struct KllSketch {
    k: usize,
    compactors: Vec<Compactor>,
    n: u64,
    min_value: f64,
    max_value: f64,
}

impl Default for KllSketch {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl KllSketch {
    /// Creates a sketch. `k` below 8 is raised to 8.
    ///
    /// Higher `k` means better accuracy and more memory; the relative rank
    /// error is roughly `1.65 / sqrt(k)`.
    pub fn new(k: usize) -> Self {
        let k = k.max(8);
        Self {
            k,
            compactors: vec![Compactor::new(k)],
            n: 0,
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
        }
    }

    fn level_capacity(&self, level: usize) -> usize {
        match level {
            0 => self.k,
            1 => std::cmp::max(8, (self.k * 2) / 3),
            2 => std::cmp::max(8, self.k / 2),
            3 => std::cmp::max(8, self.k / 4),
            _ => 8,
        }
    }

    /// Adds a value. NaN is ignored.
    pub fn update(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.n += 1;
        self.min_value = self.min_value.min(value);
        self.max_value = self.max_value.max(value);
        self.compactors[0].items.push(value);
        self.cascade_compact();
    }

    fn cascade_compact(&mut self) {
        let mut level = 0;
        while level < self.compactors.len() && self.compactors[level].is_full() {
            if level + 1 >= self.compactors.len() {
                let capacity = self.level_capacity(level + 1);
                self.compactors.push(Compactor::new(capacity));
            }
            let promoted = self.compactors[level].compact();
            self.compactors[level + 1].items.extend(promoted);
            level += 1;
        }
    }

    /// The value at rank `ceil(phi * n)` (1-based) of the weighted items.
    ///
    /// `phi = 0` and `phi = 1` return the exact minimum and maximum.
    pub fn quantile(&self, phi: f64) -> Result<f64> {
        if self.n == 0 {
            return Err(GuardError::Internal(
                "cannot compute a quantile on an empty sketch".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&phi) {
            return Err(GuardError::Internal(format!(
                "quantile phi must be in [0, 1], got {phi}"
            )));
        }
        if phi == 0.0 {
            return Ok(self.min_value);
        }
        if phi == 1.0 {
            return Ok(self.max_value);
        }

        let mut weighted: Vec<(f64, u64)> = self
            .compactors
            .iter()
            .enumerate()
            .flat_map(|(level, c)| {
                let weight = 1u64 << level.min(62);
                c.items.iter().map(move |v| (*v, weight))
            })
            .collect();
        weighted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total: u64 = weighted
            .iter()
            .fold(0u64, |acc, (_, w)| acc.saturating_add(*w));
        let target = (phi * total as f64).ceil().max(1.0);

        let mut cumulative = 0u64;
        for (value, weight) in weighted {
            cumulative = cumulative.saturating_add(weight);
            if cumulative as f64 >= target {
                return Ok(value);
            }
        }
        Ok(self.max_value)
    }

    /// Number of values seen.
    pub fn count(&self) -> u64 {
        self.n
    }

    /// Returns true if no value has been seen.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Number of items currently retained across all levels.
    pub fn retained(&self) -> usize {
        self.compactors.iter().map(|c| c.items.len()).sum()
    }

    /// Number of compactor levels.
    pub fn num_levels(&self) -> usize {
        self.compactors.len()
    }

    /// Approximate relative rank error.
    pub fn relative_error_bound(&self) -> f64 {
        1.65 / (self.k as f64).sqrt()
    }
}
