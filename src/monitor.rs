//! Monitor aggregate and acquisition scheduling.

use fugit::{TimerDurationU64, TimerInstantU64};

use crate::{
    calibration::{self, CalibrationEvent},
    filter::ChannelFilter,
    thermometer::Celsius,
};

/// Cooperative tick gate for the acquisition loop.
///
/// `due` is polled from the control loop; it only reports true once the
/// interval has elapsed since the last acquisition, then resets the reference
/// timestamp to `now`. A late poll acquires late and re-anchors on the actual
/// time, so missed ticks are never made up.
#[derive(Debug, Clone, Copy)]
pub struct Sampler<const HZ: u32> {
    interval: TimerDurationU64<HZ>,
    last: Option<TimerInstantU64<HZ>>,
}

impl<const HZ: u32> Sampler<HZ> {
    pub const fn new(interval: TimerDurationU64<HZ>) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a new acquisition is due at `now`. The first poll after
    /// construction is immediately due.
    pub fn due(&mut self, now: TimerInstantU64<HZ>) -> bool {
        match self.last {
            Some(last) if now - last < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Per-tick diagnostics: the cross-channel average, each channel's deviation
/// from it, and each channel's calibration offset.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot<const N: usize> {
    pub average: Celsius,
    pub deviation: [Celsius; N],
    pub offset: [Celsius; N],
}

/// All monitor state: one filter per probe plus the cached cross-channel
/// average. Owned by the control loop and passed by reference into every
/// operation, so the whole pipeline runs without hardware.
#[derive(Debug, Clone, Copy)]
pub struct MonitorState<const N: usize, const K: usize> {
    channels: [ChannelFilter<K>; N],
    average: Celsius,
}

impl<const N: usize, const K: usize> MonitorState<N, K> {
    pub const fn new() -> Self {
        assert!(N > 0, "channel count must be non-zero");
        Self {
            channels: [ChannelFilter::new(); N],
            average: 0.0,
        }
    }

    /// Feed one acquisition batch, one raw sample per channel.
    ///
    /// `None` marks a probe that faulted this tick: its history and corrected
    /// value stay stale while the rest of the batch proceeds. The
    /// cross-channel average is recomputed only after every channel has been
    /// visited, never from a partially updated set.
    pub fn ingest(&mut self, samples: &[Option<Celsius>; N]) {
        for (ch, sample) in self.channels.iter_mut().zip(samples) {
            if let Some(value) = *sample {
                ch.ingest(value);
            }
        }
        self.refresh_average();
    }

    /// Apply a calibration event across all channels.
    pub fn apply(&mut self, event: CalibrationEvent) {
        calibration::apply(event, &mut self.channels);
        self.refresh_average();
    }

    pub const fn average(&self) -> Celsius {
        self.average
    }

    pub const fn channels(&self) -> &[ChannelFilter<K>; N] {
        &self.channels
    }

    pub fn smoothed_values(&self) -> [Celsius; N] {
        let mut out = [0.0; N];
        for (slot, ch) in out.iter_mut().zip(&self.channels) {
            *slot = ch.smoothed();
        }
        out
    }

    pub fn snapshot(&self) -> Snapshot<N> {
        let mut deviation = [0.0; N];
        let mut offset = [0.0; N];
        for (i, ch) in self.channels.iter().enumerate() {
            deviation[i] = self.average - ch.smoothed();
            offset[i] = ch.offset();
        }
        Snapshot {
            average: self.average,
            deviation,
            offset,
        }
    }

    fn refresh_average(&mut self) {
        self.average = self
            .channels
            .iter()
            .map(ChannelFilter::smoothed)
            .sum::<Celsius>()
            / N as Celsius;
    }
}

impl<const N: usize, const K: usize> Default for MonitorState<N, K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Instant = TimerInstantU64<1_000>;
    type Duration = TimerDurationU64<1_000>;

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    #[test]
    fn sampler_gates_on_interval() {
        let mut s = Sampler::new(Duration::millis(250));
        assert!(s.due(at(0)));
        assert!(!s.due(at(100)));
        assert!(!s.due(at(249)));
        assert!(s.due(at(250)));
        assert!(!s.due(at(400)));
        assert!(s.due(at(500)));
    }

    #[test]
    fn sampler_resets_reference_to_now_not_schedule() {
        let mut s = Sampler::new(Duration::millis(250));
        assert!(s.due(at(0)));
        // Late by 150 ms; next tick is measured from the late acquisition.
        assert!(s.due(at(400)));
        assert!(!s.due(at(600)));
        assert!(s.due(at(650)));
    }

    fn primed() -> MonitorState<3, 10> {
        let mut m = MonitorState::new();
        for _ in 0..12 {
            m.ingest(&[Some(100.0), Some(102.0), Some(104.0)]);
        }
        m
    }

    #[test]
    fn batch_ingest_updates_average() {
        let m = primed();
        assert_eq!(m.smoothed_values(), [100.0, 102.0, 104.0]);
        assert_eq!(m.average(), 102.0);
    }

    #[test]
    fn faulted_probe_keeps_stale_value() {
        let mut m = primed();
        m.ingest(&[Some(100.0), None, Some(104.0)]);
        // Channel B retains its previous corrected value.
        assert_eq!(m.smoothed_values(), [100.0, 102.0, 104.0]);
        assert_eq!(m.average(), 102.0);
    }

    #[test]
    fn calibration_scenario_end_to_end() {
        let mut m = primed();

        m.apply(CalibrationEvent::Recalibrate);
        assert_eq!(m.smoothed_values(), [102.0, 102.0, 102.0]);
        assert_eq!(m.average(), 102.0);

        let snap = m.snapshot();
        assert_eq!(snap.average, 102.0);
        assert_eq!(snap.offset, [2.0, 0.0, -2.0]);
        assert_eq!(snap.deviation, [0.0, 0.0, 0.0]);

        m.apply(CalibrationEvent::Reset);
        assert_eq!(m.smoothed_values(), [100.0, 102.0, 104.0]);
        let snap = m.snapshot();
        assert_eq!(snap.offset, [0.0, 0.0, 0.0]);
        assert_eq!(snap.deviation, [2.0, 0.0, -2.0]);
    }

    #[test]
    fn snapshot_deviation_is_average_minus_channel() {
        let m = primed();
        let snap = m.snapshot();
        assert_eq!(snap.deviation, [2.0, 0.0, -2.0]);
    }
}
