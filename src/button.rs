//! Push-button gesture decoder.
//!
//! Polled from the control loop with the debounced-enough pin level and the
//! current monotonic time; turns raw press/release edges into the two
//! gestures the calibration controller understands.

use fugit::TimerInstantU64;

use crate::calibration::CalibrationEvent;

/// Presses shorter than this are treated as contact bounce.
pub const DEBOUNCE_MS: u64 = 50;
/// Maximum hold time for a short click.
pub const CLICK_MS: u64 = 200;
/// Hold time at which a long press fires.
pub const LONG_PRESS_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// Released after a hold of `DEBOUNCE_MS..=CLICK_MS`.
    ShortPress,
    /// Hold crossed `LONG_PRESS_MS`. Fires once per press, on the crossing,
    /// not on release.
    LongPressStart,
}

impl From<ButtonEvent> for CalibrationEvent {
    fn from(event: ButtonEvent) -> Self {
        match event {
            ButtonEvent::ShortPress => Self::Recalibrate,
            ButtonEvent::LongPressStart => Self::Reset,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State<const HZ: u32> {
    Released,
    Pressed {
        since: TimerInstantU64<HZ>,
        long_fired: bool,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ButtonDecoder<const HZ: u32> {
    state: State<HZ>,
}

impl<const HZ: u32> ButtonDecoder<HZ> {
    pub const fn new() -> Self {
        Self {
            state: State::Released,
        }
    }

    /// Advance the decoder with the current pin sample.
    ///
    /// At most one event per call; polling faster than `DEBOUNCE_MS` keeps
    /// gesture timing accurate.
    pub fn update(&mut self, now: TimerInstantU64<HZ>, pressed: bool) -> Option<ButtonEvent> {
        match self.state {
            State::Released => {
                if pressed {
                    self.state = State::Pressed {
                        since: now,
                        long_fired: false,
                    };
                }
                None
            }
            State::Pressed { since, long_fired } => {
                let held_ms = (now - since).to_millis();

                if pressed {
                    if !long_fired && held_ms >= LONG_PRESS_MS {
                        self.state = State::Pressed {
                            since,
                            long_fired: true,
                        };
                        return Some(ButtonEvent::LongPressStart);
                    }
                    return None;
                }

                self.state = State::Released;
                if !long_fired && (DEBOUNCE_MS..=CLICK_MS).contains(&held_ms) {
                    Some(ButtonEvent::ShortPress)
                } else {
                    None
                }
            }
        }
    }
}

impl<const HZ: u32> Default for ButtonDecoder<HZ> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Instant = TimerInstantU64<1_000>;

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    #[test]
    fn short_click_fires_on_release() {
        let mut b = ButtonDecoder::new();
        assert_eq!(b.update(at(0), true), None);
        assert_eq!(b.update(at(100), true), None);
        assert_eq!(b.update(at(150), false), Some(ButtonEvent::ShortPress));
    }

    #[test]
    fn bounce_is_ignored() {
        let mut b = ButtonDecoder::new();
        assert_eq!(b.update(at(0), true), None);
        assert_eq!(b.update(at(10), false), None);
    }

    #[test]
    fn hold_between_click_and_long_press_is_nothing() {
        let mut b = ButtonDecoder::new();
        assert_eq!(b.update(at(0), true), None);
        assert_eq!(b.update(at(500), false), None);
    }

    #[test]
    fn long_press_fires_once_while_held() {
        let mut b = ButtonDecoder::new();
        assert_eq!(b.update(at(0), true), None);
        assert_eq!(b.update(at(999), true), None);
        assert_eq!(b.update(at(1000), true), Some(ButtonEvent::LongPressStart));
        assert_eq!(b.update(at(1500), true), None);
        assert_eq!(b.update(at(3000), true), None);
        // Release after a long press does not also produce a click.
        assert_eq!(b.update(at(3100), false), None);
    }

    #[test]
    fn next_press_starts_fresh() {
        let mut b = ButtonDecoder::new();
        b.update(at(0), true);
        b.update(at(1000), true);
        b.update(at(1100), false);
        assert_eq!(b.update(at(2000), true), None);
        assert_eq!(b.update(at(2100), false), Some(ButtonEvent::ShortPress));
    }

    #[test]
    fn gestures_map_to_calibration_events() {
        assert_eq!(
            CalibrationEvent::from(ButtonEvent::ShortPress),
            CalibrationEvent::Recalibrate
        );
        assert_eq!(
            CalibrationEvent::from(ButtonEvent::LongPressStart),
            CalibrationEvent::Reset
        );
    }
}
