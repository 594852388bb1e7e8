//! Per-channel rolling average and calibration offset.

use crate::thermometer::Celsius;

/// Number of ingests during which the whole history is force-filled with the
/// incoming value. Deliberately independent of the buffer depth `K`.
pub const BOOTSTRAP_SAMPLES: u8 = 3;

/// Smoothing filter for a single probe.
///
/// Holds the last `K` raw readings, an additive calibration offset, and the
/// cached corrected value `mean(history) + offset`. The history is always
/// fully populated: the first few readings overwrite every slot so the mean
/// is never dragged toward a zeroed initial buffer.
#[derive(Debug, Clone, Copy)]
pub struct ChannelFilter<const K: usize> {
    history: [Celsius; K],
    bootstrap: u8,
    offset: Celsius,
    smoothed: Celsius,
}

impl<const K: usize> ChannelFilter<K> {
    pub const fn new() -> Self {
        assert!(K > 0, "rolling buffer depth must be non-zero");
        Self {
            history: [0.0; K],
            bootstrap: 0,
            offset: 0.0,
            smoothed: 0.0,
        }
    }

    /// Admit one raw reading.
    pub fn ingest(&mut self, value: Celsius) {
        if self.bootstrap < BOOTSTRAP_SAMPLES {
            self.history = [value; K];
            self.bootstrap += 1;
        } else {
            self.history.copy_within(1.., 0);
            self.history[K - 1] = value;
        }
        self.smoothed = self.mean() + self.offset;
    }

    /// Unweighted arithmetic mean over the whole history.
    pub fn mean(&self) -> Celsius {
        self.history.iter().sum::<Celsius>() / K as Celsius
    }

    /// Corrected value: `mean(history) + offset`.
    pub const fn smoothed(&self) -> Celsius {
        self.smoothed
    }

    /// Current calibration offset.
    pub const fn offset(&self) -> Celsius {
        self.offset
    }

    /// Shift the calibration offset by `delta`. Only the calibration
    /// controller calls this.
    pub(crate) fn shift_offset(&mut self, delta: Celsius) {
        self.offset += delta;
        self.smoothed = self.mean() + self.offset;
    }

    /// Discard the accumulated calibration offset.
    pub(crate) fn clear_offset(&mut self) {
        self.offset = 0.0;
        self.smoothed = self.mean();
    }
}

impl<const K: usize> Default for ChannelFilter<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_sets_mean_immediately() {
        let mut f = ChannelFilter::<10>::new();
        f.ingest(21.5);
        assert_eq!(f.mean(), 21.5);
        assert_eq!(f.smoothed(), 21.5);
    }

    #[test]
    fn bootstrap_overwrites_whole_history() {
        let mut f = ChannelFilter::<10>::new();
        f.ingest(10.0);
        f.ingest(30.0);
        // Still bootstrapping: every slot holds the latest value.
        assert_eq!(f.mean(), 30.0);
        f.ingest(50.0);
        assert_eq!(f.mean(), 50.0);
        // Fourth sample enters FIFO mode: nine slots of 50.0, one of 60.0.
        f.ingest(60.0);
        assert_eq!(f.mean(), (9.0 * 50.0 + 60.0) / 10.0);
    }

    #[test]
    fn steady_state_keeps_last_k_in_order() {
        let mut f = ChannelFilter::<4>::new();
        for v in [1.0, 2.0, 3.0] {
            f.ingest(v);
        }
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            f.ingest(v);
        }
        assert_eq!(f.history, [20.0, 30.0, 40.0, 50.0]);
        assert_eq!(f.mean(), 35.0);
    }

    #[test]
    fn bootstrap_counter_saturates() {
        let mut f = ChannelFilter::<4>::new();
        for _ in 0..300 {
            f.ingest(5.0);
        }
        assert_eq!(f.bootstrap, BOOTSTRAP_SAMPLES);
        // Still FIFO: a new value only displaces one slot.
        f.ingest(9.0);
        assert_eq!(f.history, [5.0, 5.0, 5.0, 9.0]);
    }

    #[test]
    fn offset_applies_to_smoothed_only() {
        let mut f = ChannelFilter::<4>::new();
        f.ingest(100.0);
        f.shift_offset(2.5);
        assert_eq!(f.mean(), 100.0);
        assert_eq!(f.smoothed(), 102.5);
        f.clear_offset();
        assert_eq!(f.offset(), 0.0);
        assert_eq!(f.smoothed(), f.mean());
    }
}
