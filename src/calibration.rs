//! Cross-channel offset calibration.
//!
//! Two one-shot operations, both driven by button gestures: `Recalibrate`
//! forces every channel's corrected value onto the channels' mutual average
//! at the instant of the event, `Reset` discards all accumulated offsets.

use crate::{filter::ChannelFilter, thermometer::Celsius};

/// A discrete calibration request, decoupled from the input hardware so the
/// controller can be driven by synthetic events in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationEvent {
    Recalibrate,
    Reset,
}

/// Apply one calibration event to the whole channel set.
///
/// `channels` must be non-empty; the channel count is fixed at configuration
/// time and checked at construction, not per event.
pub fn apply<const K: usize>(event: CalibrationEvent, channels: &mut [ChannelFilter<K>]) {
    match event {
        CalibrationEvent::Recalibrate => recalibrate(channels),
        CalibrationEvent::Reset => reset(channels),
    }
}

/// Shift every channel's offset so its corrected value equals the current
/// cross-channel average. The average itself is unchanged up to rounding.
fn recalibrate<const K: usize>(channels: &mut [ChannelFilter<K>]) {
    let target = channels.iter().map(ChannelFilter::smoothed).sum::<Celsius>()
        / channels.len() as Celsius;

    for ch in channels.iter_mut() {
        let delta = target - ch.smoothed();
        ch.shift_offset(delta);
    }
}

fn reset<const K: usize>(channels: &mut [ChannelFilter<K>]) {
    for ch in channels.iter_mut() {
        ch.clear_offset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed_channels() -> [ChannelFilter<10>; 3] {
        let mut channels = [ChannelFilter::new(); 3];
        // Constant probes at 100 / 102 / 104 degrees, past bootstrap.
        for _ in 0..12 {
            for (ch, v) in channels.iter_mut().zip([100.0, 102.0, 104.0]) {
                ch.ingest(v);
            }
        }
        channels
    }

    fn average<const K: usize>(channels: &[ChannelFilter<K>]) -> Celsius {
        channels.iter().map(ChannelFilter::smoothed).sum::<Celsius>() / channels.len() as Celsius
    }

    #[test]
    fn recalibrate_converges_to_mutual_average() {
        let mut channels = primed_channels();
        assert_eq!(average(&channels), 102.0);

        apply(CalibrationEvent::Recalibrate, &mut channels);

        for ch in &channels {
            assert_eq!(ch.smoothed(), 102.0);
        }
        assert_eq!(channels[0].offset(), 2.0);
        assert_eq!(channels[1].offset(), 0.0);
        assert_eq!(channels[2].offset(), -2.0);
    }

    #[test]
    fn recalibrate_preserves_average() {
        let mut channels = primed_channels();
        let before = average(&channels);
        apply(CalibrationEvent::Recalibrate, &mut channels);
        let after = average(&channels);
        assert!((before - after).abs() < 1e-4);
    }

    #[test]
    fn recalibrate_is_idempotent_without_new_samples() {
        let mut channels = primed_channels();
        apply(CalibrationEvent::Recalibrate, &mut channels);
        let smoothed: [Celsius; 3] = [
            channels[0].smoothed(),
            channels[1].smoothed(),
            channels[2].smoothed(),
        ];

        apply(CalibrationEvent::Recalibrate, &mut channels);

        for (ch, prev) in channels.iter().zip(smoothed) {
            assert!((ch.smoothed() - prev).abs() < 1e-4);
        }
    }

    #[test]
    fn reset_reverts_to_raw_means() {
        let mut channels = primed_channels();
        apply(CalibrationEvent::Recalibrate, &mut channels);
        apply(CalibrationEvent::Reset, &mut channels);

        let expected = [100.0, 102.0, 104.0];
        for (ch, want) in channels.iter().zip(expected) {
            assert_eq!(ch.offset(), 0.0);
            assert_eq!(ch.smoothed(), want);
            assert_eq!(ch.smoothed(), ch.mean());
        }
    }
}
