//! Millisecond timestamps read from the [`Sampler`](crate::keys::Sampler) clock.

use embassy_time::Duration;

/// A point in time, counted in sampler ticks (one per millisecond) since power-up.
///
/// The counter is 32 bits wide and wraps after roughly 49 days. Elapsed time is always computed with wrapping
/// subtraction, so comparisons stay correct across the wrap as long as the interval being measured is shorter than
/// half the range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Millis(pub u32);

impl Millis {
    /// The instant the sampler starts counting from.
    pub const ZERO: Self = Self(0);

    /// Returns the timestamp `ms` milliseconds later, wrapping on overflow.
    pub const fn wrapping_add(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }

    /// Time elapsed between `earlier` and `self`.
    pub fn since(self, earlier: Millis) -> Duration {
        Duration::from_millis(u64::from(self.0.wrapping_sub(earlier.0)))
    }

    /// Whether at least `period` has passed between `start` and `self`.
    pub fn has_elapsed(self, start: Millis, period: Duration) -> bool {
        self.since(start) >= period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_measures_across_wraparound() {
        let before = Millis(u32::MAX - 1);
        let after = before.wrapping_add(5);
        assert_eq!(Millis(3), after, "Should wrap; expected left but got right");
        assert_eq!(
            Duration::from_millis(5),
            after.since(before),
            "Should measure elapsed time across the wrap; expected left but got right"
        );
    }

    #[test]
    fn has_elapsed_is_inclusive() {
        let start = Millis(100);
        assert!(!Millis(101).has_elapsed(start, Duration::from_millis(2)));
        assert!(Millis(102).has_elapsed(start, Duration::from_millis(2)));
    }
}
