//! Sizing policy for [`WeakIdentityMap`](crate::WeakIdentityMap).

use crate::error::{Error, Result};

/// Capacity used when none is given.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Largest bucket count a table will grow to. Must be a power of two.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Load factor used when none is given.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Construction options for a weak identity map.
///
/// # Examples
///
/// ```
/// use weak_identity_table::Config;
///
/// let config = Config::default().initial_capacity(100).load_factor(0.5);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.bucket_count(), 128);
///
/// assert!(Config::default().load_factor(f32::NAN).validate().is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// Size hint for the bucket array. Rounded up to a power of two and capped at
    /// [`MAXIMUM_CAPACITY`].
    pub initial_capacity: usize,
    /// Ratio of live entries to buckets at which the table doubles.
    pub load_factor: f32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor:      DEFAULT_LOAD_FACTOR,
        }
    }
}

impl Config {
    /// Sets the initial capacity hint.
    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Sets the load factor.
    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Checks that the load factor is a positive finite number.
    pub fn validate(&self) -> Result<()> {
        if self.load_factor.is_nan() || self.load_factor <= 0.0 || self.load_factor.is_infinite() {
            return Err(Error::IllegalLoadFactor(self.load_factor));
        }
        Ok(())
    }

    /// The number of buckets a table built from this configuration starts with.
    pub fn bucket_count(&self) -> usize {
        capacity_for(self.initial_capacity)
    }
}

/// The smallest power of two that is at least `hint`, capped at [`MAXIMUM_CAPACITY`].
pub(crate) fn capacity_for(hint: usize) -> usize {
    if hint >= MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else {
        hint.next_power_of_two()
    }
}

/// `floor(capacity * load_factor)`, saturating.
pub(crate) fn threshold_for(capacity: usize, load_factor: f32) -> usize {
    let threshold = capacity as f64 * load_factor as f64;
    if threshold >= usize::MAX as f64 {
        usize::MAX
    } else {
        threshold as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_load_factors() {
        for lf in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = Config::default().load_factor(lf).validate().unwrap_err();
            assert!(matches!(err, Error::IllegalLoadFactor(_)));
        }
        assert!(Config::default().load_factor(4.0).validate().is_ok());
    }

    #[test]
    fn capacity_rounds_up_and_caps() {
        assert_eq!(capacity_for(0), 1);
        assert_eq!(capacity_for(1), 1);
        assert_eq!(capacity_for(17), 32);
        assert_eq!(capacity_for(usize::MAX), MAXIMUM_CAPACITY);
    }

    #[test]
    fn threshold_floors() {
        assert_eq!(threshold_for(16, 0.75), 12);
        assert_eq!(threshold_for(1, 0.75), 0);
        assert_eq!(threshold_for(10, 0.33), 3);
    }
}
